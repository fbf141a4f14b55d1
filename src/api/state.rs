use std::sync::Arc;

use tokio::sync::RwLock;

use crate::services::{
    PayloadLimits, ProductStore, RecommendationService, SessionStore, TextGenerator,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ProductStore>,
    pub sessions: Arc<RwLock<SessionStore>>,
    pub recommender: Arc<RecommendationService>,
}

impl AppState {
    /// Creates application state around a loaded catalog and a generator
    pub fn new(
        catalog: ProductStore,
        generator: Arc<dyn TextGenerator>,
        limits: PayloadLimits,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let recommender = RecommendationService::new(catalog.clone(), generator, limits);

        Self {
            catalog,
            sessions: Arc::new(RwLock::new(SessionStore::new())),
            recommender: Arc::new(recommender),
        }
    }

    /// Replaces the session registry, e.g. with one carrying custom limits
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = Arc::new(RwLock::new(sessions));
        self
    }
}
