pub mod algorithms;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use models::*;

use anyhow::Result;
use services::recommendation::RecommendationService;
use services::serving::ServingService;
use services::store::InMemoryStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<InMemoryStore>,
    pub recommendation_service: Arc<RecommendationService>,
    pub serving_service: Arc<ServingService>,
}

impl AppState {
    pub fn new(config: Config, store: InMemoryStore) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(store);

        let recommendation_service = Arc::new(RecommendationService::new(
            store.clone(),
            config.clone(),
        )?);

        let serving_service = Arc::new(ServingService::new(recommendation_service.clone()));

        Ok(Self {
            config,
            store,
            recommendation_service,
            serving_service,
        })
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
