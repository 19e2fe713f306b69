// src/config/matcher.rs
//! Typed configuration for the whole pipeline, loaded from TOML.
//!
//! Every calibration constant (penalties, boost factor, threshold tiers, radius,
//! minimum result count) lives here with a serde default, so a missing file or a
//! partial file still yields a complete config. Secrets written as `"ENV"` are
//! resolved from the environment at load time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

// --- env defaults & names ---
pub const DEFAULT_MATCHER_CONFIG_PATH: &str = "config/matcher.toml";
pub const ENV_MATCHER_CONFIG_PATH: &str = "MATCHER_CONFIG_PATH";
pub const ENV_MIN_RESULTS: &str = "MATCHER_MIN_RESULTS";
pub const ENV_RADIUS: &str = "MATCHER_RADIUS";
pub const ENV_BOOST_FACTOR: &str = "MATCHER_BOOST_FACTOR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub occupations: OccupationsConfig,
    pub exclusion: ExclusionConfig,
    pub ranking: RankingConfig,
    pub discovery: DiscoveryConfig,
    pub geo: GeoConfig,
}

/* ----------------------------
Occupation providers
---------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupationsConfig {
    pub per_call_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub top_n: usize,
    pub max_skills_per_query: usize,
    pub local: LocalProviderConfig,
    pub onet: RemoteProviderConfig,
    pub esco: RemoteProviderConfig,
}

impl Default for OccupationsConfig {
    fn default() -> Self {
        Self {
            per_call_timeout_secs: 30,
            cache_ttl_secs: 86_400,
            top_n: 10,
            max_skills_per_query: 8,
            local: LocalProviderConfig::default(),
            onet: RemoteProviderConfig {
                enabled: true,
                priority: 1.0,
                base_url: "https://api-v2.onetcenter.org".into(),
                api_key: "ENV".into(),
            },
            esco: RemoteProviderConfig {
                enabled: true,
                priority: 0.8,
                base_url: "https://ec.europa.eu/esco/api".into(),
                // ESCO is an open API; no credential required.
                api_key: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalProviderConfig {
    pub enabled: bool,
    pub priority: f32,
    pub catalog_path: Option<PathBuf>,
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 0.6,
            catalog_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteProviderConfig {
    pub enabled: bool,
    pub priority: f32,
    pub base_url: String,
    /// "ENV" means: read from the provider's env var at load time.
    pub api_key: String,
}

/* ----------------------------
Industry exclusion
---------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    pub hard_terms: Vec<String>,
    pub soft_terms: Vec<String>,
    pub soft_penalty: f32,
    pub hybrid_pass_penalty: f32,
    pub unknown_industry_penalty: f32,
    pub generic_industry_penalty: f32,
    pub generic_industries: Vec<String>,
    pub legit_role_titles: Vec<String>,
    pub recruiting_role_titles: Vec<String>,
    /// SOC major groups that count as business/management for hybrid courses.
    pub business_soc_majors: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            hard_terms: strings(&[
                "insurance",
                "legal",
                "law",
                "law practice",
                "gambling",
                "casino",
                "casinos",
                "betting",
                "tobacco",
                "alcohol",
                "alcoholic beverages",
                "liquor",
            ]),
            soft_terms: strings(&[
                "staffing",
                "recruiting",
                "recruitment",
                "employment services",
                "employment agency",
                "human resources",
                "hr",
                "outsourcing",
                "executive search",
                "temp agency",
            ]),
            soft_penalty: 0.8,
            hybrid_pass_penalty: 0.3,
            unknown_industry_penalty: 0.15,
            generic_industry_penalty: 0.10,
            generic_industries: strings(&[
                "other",
                "services",
                "business services",
                "general",
                "miscellaneous",
                "n/a",
                "unknown",
            ]),
            legit_role_titles: strings(&[
                "engineer",
                "developer",
                "analyst",
                "scientist",
                "designer",
                "technician",
                "programmer",
                "architect",
                "researcher",
                "specialist",
                "consultant",
            ]),
            recruiting_role_titles: strings(&[
                "recruiter",
                "recruiting",
                "talent acquisition",
                "sourcer",
                "sourcing specialist",
                "staffing coordinator",
                "placement",
            ]),
            business_soc_majors: strings(&["11", "13"]),
        }
    }
}

/* ----------------------------
Similarity ranking
---------------------------- */

/// Pools strictly larger than `min_pool` use `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTier {
    pub min_pool: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub boost_factor: f32,
    pub job_count_saturation: usize,
    pub threshold_tiers: Vec<ThresholdTier>,
    pub base_threshold: f32,
    pub high_tier: f32,
    pub medium_tier: f32,
    pub important_terms: Vec<String>,
    pub important_term_bonus: f32,
    pub important_bonus_cap: f32,
    pub keyword_floor: f32,
    pub work_activity_min_importance: f32,
    pub embedding_enabled: bool,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_api_key: String,
    pub embedding_timeout_secs: u64,
    pub embedding_cache_ttl_secs: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            boost_factor: 0.15,
            job_count_saturation: 10,
            threshold_tiers: vec![
                ThresholdTier {
                    min_pool: 20,
                    threshold: 0.50,
                },
                ThresholdTier {
                    min_pool: 10,
                    threshold: 0.45,
                },
                ThresholdTier {
                    min_pool: 5,
                    threshold: 0.40,
                },
            ],
            base_threshold: 0.35,
            high_tier: 0.80,
            medium_tier: 0.65,
            important_terms: strings(&[
                "python",
                "java",
                "javascript",
                "sql",
                "matlab",
                "cad",
                "solidworks",
                "autocad",
                "software",
                "engineering",
                "data",
                "analytics",
                "machine learning",
                "cloud",
                "simulation",
                "hvac",
                "thermal",
                "energy",
                "manufacturing",
                "robotics",
                "embedded",
                "cybersecurity",
                "marketing",
                "finance",
                "accounting",
                "supply chain",
                "healthcare",
                "clinical",
                "biotechnology",
            ]),
            important_term_bonus: 0.05,
            important_bonus_cap: 0.20,
            keyword_floor: 0.15,
            work_activity_min_importance: 0.7,
            embedding_enabled: true,
            embedding_base_url: "https://api.openai.com/v1".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_api_key: "ENV".into(),
            embedding_timeout_secs: 30,
            embedding_cache_ttl_secs: 3_600,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 300,
        }
    }
}

impl RankingConfig {
    /// Adaptive threshold: larger pools use stricter cut-offs.
    pub fn threshold_for_pool(&self, pool: usize) -> f32 {
        self.threshold_tiers
            .iter()
            .filter(|t| pool > t.min_pool)
            .max_by_key(|t| t.min_pool)
            .map(|t| t.threshold)
            .unwrap_or(self.base_threshold)
    }
}

/* ----------------------------
Discovery
---------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub min_results: usize,
    pub radius: f64,
    pub pacing_ms: u64,
    pub timeout_secs: u64,
    pub page_size: usize,
    pub max_keywords: usize,
    pub default_country: String,
    pub excluded_titles: Vec<String>,
    pub apollo: ApolloConfig,
    pub adzuna: AdzunaConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_results: 5,
            radius: 150.0,
            pacing_ms: 200,
            timeout_secs: 30,
            page_size: 25,
            max_keywords: 10,
            default_country: "United States".into(),
            excluded_titles: strings(&["recruiter", "talent acquisition", "intern", "student"]),
            apollo: ApolloConfig::default(),
            adzuna: AdzunaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApolloConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.apollo.io/api/v1".into(),
            api_key: "ENV".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdzunaConfig {
    pub enabled: bool,
    pub base_url: String,
    pub app_id: String,
    pub app_key: String,
    pub country_code: String,
}

impl Default for AdzunaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.adzuna.com/v1/api".into(),
            app_id: "ENV".into(),
            app_key: "ENV".into(),
            country_code: "us".into(),
        }
    }
}

/* ----------------------------
Geo
---------------------------- */

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Lower-cased place name → [lat, lng].
    pub places: HashMap<String, [f64; 2]>,
}

/* ----------------------------
Loading
---------------------------- */

impl MatcherConfig {
    /// Load from MATCHER_CONFIG_PATH or "config/matcher.toml"; a missing file yields defaults.
    pub fn from_toml() -> Result<Self> {
        let path = std::env::var(ENV_MATCHER_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MATCHER_CONFIG_PATH));

        let mut cfg = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading matcher config from {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("parsing matcher config at {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "matcher config not found, using defaults");
            Self::default()
        };

        cfg.apply_env_overrides();
        cfg.resolve_secrets();
        Ok(cfg)
    }

    /// Parse and sanitize, without touching the environment.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let mut cfg: MatcherConfig = toml::from_str(toml_str)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        let ex = &mut self.exclusion;
        for p in [
            &mut ex.soft_penalty,
            &mut ex.hybrid_pass_penalty,
            &mut ex.unknown_industry_penalty,
            &mut ex.generic_industry_penalty,
        ] {
            *p = clamp01(*p);
        }

        let r = &mut self.ranking;
        r.boost_factor = r.boost_factor.max(0.0);
        r.base_threshold = clamp01(r.base_threshold);
        for t in r.threshold_tiers.iter_mut() {
            t.threshold = clamp01(t.threshold);
        }
        if r.medium_tier > r.high_tier {
            // swap to keep tiers ordered
            std::mem::swap(&mut r.medium_tier, &mut r.high_tier);
        }
        r.job_count_saturation = r.job_count_saturation.max(1);

        let d = &mut self.discovery;
        d.min_results = d.min_results.max(1);
        if !d.radius.is_finite() || d.radius <= 0.0 {
            d.radius = DiscoveryConfig::default().radius;
        }

        self.occupations.top_n = self.occupations.top_n.max(1);
        self.geo.places = std::mem::take(&mut self.geo.places)
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
            .collect();
    }

    /// MATCHER_MIN_RESULTS / MATCHER_RADIUS / MATCHER_BOOST_FACTOR override the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(n) = parse_env::<usize>(ENV_MIN_RESULTS) {
            self.discovery.min_results = n.max(1);
        }
        if let Some(r) = parse_env::<f64>(ENV_RADIUS).filter(|r| r.is_finite() && *r > 0.0) {
            self.discovery.radius = r;
        }
        if let Some(b) = parse_env::<f32>(ENV_BOOST_FACTOR).filter(|b| b.is_finite()) {
            self.ranking.boost_factor = b.clamp(0.0, 1.0);
        }
    }

    /// Replace "ENV" placeholders with the matching environment variable (empty if unset).
    pub fn resolve_secrets(&mut self) {
        self.occupations.onet.api_key = resolve_secret(&self.occupations.onet.api_key, "ONET_API_KEY");
        self.occupations.esco.api_key = resolve_secret(&self.occupations.esco.api_key, "ESCO_API_KEY");
        self.ranking.embedding_api_key =
            resolve_secret(&self.ranking.embedding_api_key, "OPENAI_API_KEY");
        self.discovery.apollo.api_key = resolve_secret(&self.discovery.apollo.api_key, "APOLLO_API_KEY");
        self.discovery.adzuna.app_id = resolve_secret(&self.discovery.adzuna.app_id, "ADZUNA_APP_ID");
        self.discovery.adzuna.app_key =
            resolve_secret(&self.discovery.adzuna.app_key, "ADZUNA_APP_KEY");
    }
}

fn resolve_secret(raw: &str, env_name: &str) -> String {
    if raw.trim().eq_ignore_ascii_case("env") {
        std::env::var(env_name).unwrap_or_default().trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn clamp01(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
