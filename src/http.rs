// src/http.rs
//! Shared reqwest plumbing for the external providers.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

pub(crate) const USER_AGENT: &str = concat!("sponsor-match/", env!("CARGO_PKG_VERSION"));

/// Client with connect + total timeouts. Builder failure (TLS backend) falls
/// back to the default client rather than aborting start-up.
pub(crate) fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "http client builder failed, using defaults");
            reqwest::Client::new()
        })
}

/// Send `req`, require 2xx, decode JSON into the provider's shield type.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    timeout_secs: u64,
    req: RequestBuilder,
) -> ProviderResult<T> {
    let resp = req
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, timeout_secs, e))?;
    let status = resp.status();
    if !status.is_success() {
        tracing::warn!(provider, status = status.as_u16(), "provider returned non-2xx");
        return Err(ProviderError::Http {
            provider,
            status: status.as_u16(),
        });
    }
    let body = resp
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, timeout_secs, e))?;
    decode(provider, &body)
}

/// Decode a JSON body; failures become `Malformed`.
pub(crate) fn decode<T: DeserializeOwned>(provider: &'static str, body: &str) -> ProviderResult<T> {
    serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        provider,
        message: e.to_string(),
    })
}

/// Lightweight reachability probe: any 2xx counts as healthy.
pub(crate) async fn probe(req: RequestBuilder) -> bool {
    match req.send().await {
        Ok(resp) => resp.status().is_success(),
        Err(e) => {
            tracing::debug!(error = %e, "health probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Shape {
        name: String,
    }

    #[test]
    fn decode_maps_errors_to_malformed() {
        let ok: Shape = decode("p", r#"{"name":"x"}"#).unwrap();
        assert_eq!(ok.name, "x");
        let err = decode::<Shape>("p", "not json").unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { provider: "p", .. }));
    }
}
