// src/error.rs
//! Typed errors for the matching pipeline.
//!
//! Provider-level failures (`ProviderError`) are always recovered by the stage
//! that fanned out to the provider. Only `PipelineError` ever reaches the caller,
//! and its `public_message()` is the only text that leaves the process.

use thiserror::Error;

/// A single external call failed. Never aborts the pipeline on its own.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("{provider}: provider is not configured")]
    NotConfigured { provider: &'static str },

    #[error("{provider}: timed out after {secs}s")]
    Timeout { provider: &'static str, secs: u64 },

    #[error("{provider}: upstream returned HTTP {status}")]
    Http { provider: &'static str, status: u16 },

    #[error("{provider}: transport error: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: malformed payload: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::NotConfigured { provider }
            | Self::Timeout { provider, .. }
            | Self::Http { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Malformed { provider, .. } => provider,
        }
    }

    /// Translate a reqwest failure into the provider taxonomy.
    pub fn from_reqwest(provider: &'static str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider,
                secs: timeout_secs,
            }
        } else if err.is_decode() {
            Self::Malformed {
                provider,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                provider,
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                provider,
                message: err.to_string(),
            }
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failures that propagate out of `discover`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required credential is missing and no usable provider of that kind remains.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every occupation provider was unhealthy or failed.
    #[error("no occupation provider produced a result")]
    NoOccupationProviders,

    /// The cascading search exhausted every relaxation level with zero candidates.
    #[error("no companies found after {levels_attempted} search levels")]
    NoResults { levels_attempted: usize },

    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    /// Generic, non-leaking message for external callers.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NoResults { .. } => "No companies found for this course.",
            Self::NoOccupationProviders | Self::Configuration(_) => {
                "Company matching is temporarily unavailable. Please try again later."
            }
            Self::Store(_) => "Something went wrong while generating matches.",
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_never_carries_internal_detail() {
        let e = PipelineError::Configuration("ONET_API_KEY missing".into());
        assert!(!e.public_message().contains("ONET"));
        let e = PipelineError::Store("connection refused on 10.0.0.7".into());
        assert!(!e.public_message().contains("10.0.0.7"));
    }

    #[test]
    fn provider_name_is_reachable_from_every_variant() {
        let e = ProviderError::Timeout {
            provider: "onet",
            secs: 30,
        };
        assert_eq!(e.provider(), "onet");
        assert!(e.to_string().contains("30s"));
    }
}
