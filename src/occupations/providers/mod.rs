// src/occupations/providers/mod.rs
//! Concrete occupation providers and the static registry built at start-up.

pub mod esco;
pub mod local_catalog;
pub mod onet;

use anyhow::Result;
use std::sync::Arc;

pub use esco::EscoProvider;
pub use local_catalog::LocalCatalogProvider;
pub use onet::OnetProvider;

use super::OccupationProvider;
use crate::clock::SharedClock;
use crate::config::OccupationsConfig;

/// Build every provider named in config. Disabled or unconfigured providers
/// are still registered; the coordinator filters them per call.
pub fn build_providers(
    cfg: &OccupationsConfig,
    clock: SharedClock,
) -> Result<Vec<Arc<dyn OccupationProvider>>> {
    let local = match &cfg.local.catalog_path {
        Some(path) => LocalCatalogProvider::from_toml_file(path, cfg.local.priority)?,
        None => LocalCatalogProvider::builtin(cfg.local.priority),
    }
    .with_enabled(cfg.local.enabled)
    .with_top_n(cfg.top_n);

    let onet = OnetProvider::new(&cfg.onet, cfg, Arc::clone(&clock));
    let esco = EscoProvider::new(&cfg.esco, cfg, clock);

    Ok(vec![Arc::new(onet), Arc::new(esco), Arc::new(local)])
}
