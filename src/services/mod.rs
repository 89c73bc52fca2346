//! Business logic services

pub mod aladin;
pub mod bestsellers;
pub mod payload;
pub mod scheduler;

use crate::{
    config::AppConfig,
    error::AppResult,
    repository::PgBestsellerStore,
};

/// Bestseller service wired to PostgreSQL and the Aladin API
pub type PgBestsellerService = bestsellers::BestsellerService<PgBestsellerStore, aladin::AladinClient>;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub store: PgBestsellerStore,
    pub bestsellers: PgBestsellerService,
}

impl Services {
    /// Create all services with the given store
    pub fn new(store: PgBestsellerStore, config: &AppConfig) -> AppResult<Self> {
        let catalog = aladin::AladinClient::new(&config.aladin)?;
        let options = bestsellers::ReconcileOptions::from_config(&config.bestsellers, &config.aladin);

        Ok(Self {
            bestsellers: bestsellers::BestsellerService::new(store.clone(), catalog, options),
            store,
        })
    }
}
