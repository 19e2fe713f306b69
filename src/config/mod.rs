// src/config/mod.rs
pub mod matcher;

pub use matcher::{
    AdzunaConfig, ApolloConfig, DiscoveryConfig, ExclusionConfig, GeoConfig, LocalProviderConfig,
    MatcherConfig, OccupationsConfig, RankingConfig, RemoteProviderConfig, ThresholdTier,
    DEFAULT_MATCHER_CONFIG_PATH, ENV_MATCHER_CONFIG_PATH,
};
