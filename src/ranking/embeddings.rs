// src/ranking/embeddings.rs
//! Embedding-based similarity: provider trait, OpenAI-compatible client with
//! a text → vector TTL cache, cosine similarity and the failure-count circuit
//! breaker the ranker consults before every batch.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

use crate::clock::{SharedClock, TtlCache};
use crate::config::RankingConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Similarity of `anchor` to each candidate, in candidate order, each in [0,1].
    async fn batch_similarity(&self, anchor: &str, candidates: &[String]) -> ProviderResult<Vec<f32>>;
}

/// Cosine similarity; zero-length or mismatched vectors give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/* ----------------------------
OpenAI-compatible embeddings
---------------------------- */

const PROVIDER: &str = "openai_embeddings";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbeddings {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    cache: TtlCache<String, Vec<f32>>,
}

impl OpenAiEmbeddings {
    /// `None` when embeddings are disabled or the key did not resolve.
    pub fn from_config(cfg: &RankingConfig, clock: SharedClock) -> Option<Self> {
        let key = cfg.embedding_api_key.trim();
        if !cfg.embedding_enabled || key.is_empty() || key == "ENV" {
            return None;
        }
        Some(Self {
            http: http::client(cfg.embedding_timeout_secs),
            base_url: cfg.embedding_base_url.trim_end_matches('/').to_string(),
            api_key: key.to_string(),
            model: cfg.embedding_model.clone(),
            timeout_secs: cfg.embedding_timeout_secs,
            cache: TtlCache::new(cfg.embedding_cache_ttl_secs, clock),
        })
    }

    fn cache_key(&self, text: &str) -> String {
        let mut h = Sha256::new();
        h.update(self.model.as_bytes());
        h.update([0u8]);
        h.update(text.as_bytes());
        format!("{:x}", h.finalize())
    }

    /// Embed `texts`, serving what it can from cache and batching the rest.
    async fn embed(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.cache_key(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = keys.iter().map(|k| self.cache.get(k)).collect();

        let missing: Vec<usize> = (0..texts.len()).filter(|i| out[*i].is_none()).collect();
        if !missing.is_empty() {
            let req = EmbeddingRequest {
                model: &self.model,
                input: missing.iter().map(|i| texts[*i]).collect(),
            };
            let resp: EmbeddingResponse = http::send_json(
                PROVIDER,
                self.timeout_secs,
                self.http
                    .post(format!("{}/embeddings", self.base_url))
                    .bearer_auth(&self.api_key)
                    .json(&req),
            )
            .await?;
            if resp.data.len() != missing.len() {
                return Err(ProviderError::Malformed {
                    provider: PROVIDER,
                    message: format!("expected {} embeddings, got {}", missing.len(), resp.data.len()),
                });
            }
            for d in resp.data {
                let Some(&slot) = missing.get(d.index) else {
                    return Err(ProviderError::Malformed {
                        provider: PROVIDER,
                        message: format!("embedding index {} out of range", d.index),
                    });
                };
                self.cache.insert(keys[slot].clone(), d.embedding.clone());
                out[slot] = Some(d.embedding);
            }
        }

        out.into_iter()
            .map(|v| {
                v.ok_or_else(|| ProviderError::Malformed {
                    provider: PROVIDER,
                    message: "missing embedding".into(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn batch_similarity(&self, anchor: &str, candidates: &[String]) -> ProviderResult<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let mut texts: Vec<&str> = Vec::with_capacity(candidates.len() + 1);
        texts.push(anchor);
        texts.extend(candidates.iter().map(String::as_str));
        let vectors = self.embed(&texts).await?;
        let (anchor_vec, rest) = vectors.split_first().ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER,
            message: "empty embedding batch".into(),
        })?;
        Ok(rest
            .iter()
            .map(|v| cosine_similarity(anchor_vec, v).clamp(0.0, 1.0))
            .collect())
    }
}

/* ----------------------------
Circuit breaker
---------------------------- */

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

/// Opens after `threshold` consecutive failures; after `cooldown` one trial
/// call is let through (half-open) and its outcome closes or re-opens it.
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: ChronoDuration,
    clock: SharedClock,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown_secs: u64, clock: SharedClock) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: ChronoDuration::seconds(i64::try_from(cooldown_secs).unwrap_or(i64::MAX / 1_000)),
            clock,
            state: Mutex::new(BreakerState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// May a call go through right now?
    pub fn allow(&self) -> bool {
        let mut s = self.lock();
        match s.opened_at {
            None => true,
            Some(at) if self.clock.now() - at >= self.cooldown => {
                // half-open: one more failure re-opens immediately
                s.opened_at = None;
                s.failures = self.threshold.saturating_sub(1);
                true
            }
            Some(_) => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().opened_at.is_some()
    }

    pub fn record_success(&self) {
        let mut s = self.lock();
        s.failures = 0;
        s.opened_at = None;
    }

    /// Returns the failure count when this failure opened the circuit.
    pub fn record_failure(&self) -> Option<u32> {
        let mut s = self.lock();
        s.failures = s.failures.saturating_add(1);
        if s.opened_at.is_none() && s.failures >= self.threshold {
            s.opened_at = Some(self.clock.now());
            return Some(s.failures);
        }
        None
    }

    pub fn failures(&self) -> u32 {
        self.lock().failures
    }
}
