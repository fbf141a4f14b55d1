use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{BrowsingHistory, Preferences, Recommendation},
    services::{
        catalog::ProductStore,
        providers::TextGenerator,
        request_builder::{PayloadLimits, RequestBuilder},
        response_parser::parse_recommendations,
        session::SessionStore,
    },
};

/// Result of one recommendation round
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecommendationOutcome {
    pub recommendations: Vec<Recommendation>,
    pub count: usize,
    /// Reply entries that were dropped, one message each
    pub warnings: Vec<String>,
}

/// Generates personalized product recommendations
///
/// Filters the catalog by preferences, shapes a bounded payload from the
/// candidates and browsing history, makes exactly one call to the text
/// generator and validates its reply against the catalog. Generator and
/// parse failures surface as a single error; nothing is retried.
pub struct RecommendationService {
    store: Arc<ProductStore>,
    generator: Arc<dyn TextGenerator>,
    limits: PayloadLimits,
}

impl RecommendationService {
    pub fn new(
        store: Arc<ProductStore>,
        generator: Arc<dyn TextGenerator>,
        limits: PayloadLimits,
    ) -> Self {
        Self {
            store,
            generator,
            limits,
        }
    }

    pub async fn recommend(
        &self,
        preferences: &Preferences,
        history: &BrowsingHistory,
    ) -> AppResult<RecommendationOutcome> {
        let payload = RequestBuilder::new(&self.store, self.limits).build(preferences, history);

        if payload.candidates.is_empty() {
            tracing::warn!("Catalog is empty, nothing to recommend");
            return Ok(RecommendationOutcome::default());
        }

        tracing::info!(
            provider = self.generator.name(),
            candidates = payload.candidates.len(),
            viewed = payload.recently_viewed.len(),
            "Requesting recommendations"
        );

        let raw = self.generator.generate(&payload).await.map_err(|e| {
            tracing::error!(error = %e, provider = self.generator.name(), "Generator call failed");
            e
        })?;

        let parsed = parse_recommendations(&raw, &self.store)?;

        Ok(RecommendationOutcome {
            count: parsed.recommendations.len(),
            recommendations: parsed.recommendations,
            warnings: parsed.warnings,
        })
    }

    /// Runs one recommendation round for a stored session.
    ///
    /// The session is marked pending for the duration of the call; a second
    /// request for the same session while one is pending is rejected. The
    /// flag is released however the call ends, including cancellation.
    pub async fn recommend_for_session(
        &self,
        sessions: &Arc<RwLock<SessionStore>>,
        session_id: Uuid,
    ) -> AppResult<RecommendationOutcome> {
        let (preferences, history) = {
            let mut sessions = sessions.write().await;
            let session = sessions.get_mut(&session_id)?;
            session.begin_request()?;
            (session.preferences.clone(), session.history.clone())
        };
        let pending = PendingRequest::new(sessions.clone(), session_id);

        let result = self.recommend(&preferences, &history).await;

        pending.release().await;
        result
    }
}

/// Owns a session's pending flag until released or dropped
struct PendingRequest {
    sessions: Arc<RwLock<SessionStore>>,
    session_id: Uuid,
    released: bool,
}

impl PendingRequest {
    fn new(sessions: Arc<RwLock<SessionStore>>, session_id: Uuid) -> Self {
        Self {
            sessions,
            session_id,
            released: false,
        }
    }

    async fn release(mut self) {
        finish(&mut *self.sessions.write().await, self.session_id);
        self.released = true;
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        tracing::warn!(session_id = %self.session_id, "Recommendation request cancelled");

        if let Ok(mut sessions) = self.sessions.try_write() {
            finish(&mut sessions, self.session_id);
            return;
        }

        // Lock is busy; release once it frees up
        let sessions = self.sessions.clone();
        let session_id = self.session_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    finish(&mut *sessions.write().await, session_id);
                });
            }
            Err(_) => {
                tracing::error!(session_id = %session_id, "No runtime to release pending session");
            }
        }
    }
}

// The session may have been ended while the call was in flight
fn finish(sessions: &mut SessionStore, session_id: Uuid) {
    if let Ok(session) = sessions.get_mut(&session_id) {
        session.finish_request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::product::fixtures::product,
        services::{providers::MockTextGenerator, request_builder::RecommendationPayload},
    };
    use std::time::Duration;

    fn store() -> Arc<ProductStore> {
        Arc::new(
            ProductStore::from_products(vec![
                product("p1", "A", "Acme", 30.0),
                product("p2", "B", "Globex", 120.0),
                product("p3", "A", "Globex", 45.0),
            ])
            .unwrap(),
        )
    }

    fn mock_generator() -> MockTextGenerator {
        let mut generator = MockTextGenerator::new();
        generator.expect_name().return_const("mock");
        generator
    }

    fn service(generator: MockTextGenerator) -> RecommendationService {
        RecommendationService::new(store(), Arc::new(generator), PayloadLimits::default())
    }

    #[tokio::test]
    async fn test_recommend_sends_filtered_candidates() {
        let mut generator = mock_generator();
        generator
            .expect_generate()
            .withf(|payload| payload.candidate_ids().collect::<Vec<_>>() == vec!["p1", "p3"])
            .times(1)
            .returning(|_| {
                Ok(r#"[{"product_id": "p3", "explanation": "cheap", "relevance_score": 0.9}]"#
                    .to_string())
            });

        let prefs = Preferences {
            price_range: "0-50".parse().unwrap(),
            ..Default::default()
        };
        let outcome = service(generator)
            .recommend(&prefs, &BrowsingHistory::new())
            .await
            .unwrap();

        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.recommendations[0].product.id, "p3");
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_becomes_warning() {
        let mut generator = mock_generator();
        generator.expect_generate().times(1).returning(|_| {
            Ok(r#"[{"product_id":"p9","explanation":"x","relevance_score":1.4}]"#.to_string())
        });

        let outcome = service(generator)
            .recommend(&Preferences::default(), &BrowsingHistory::new())
            .await
            .unwrap();

        assert!(outcome.recommendations.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_surfaces_single_error() {
        let mut generator = mock_generator();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(AppError::ExternalService("timeout".to_string())));

        let result = service(generator)
            .recommend(&Preferences::default(), &BrowsingHistory::new())
            .await;

        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_error() {
        let mut generator = mock_generator();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Ok("Sorry, no recommendations today".to_string()));

        let result = service(generator)
            .recommend(&Preferences::default(), &BrowsingHistory::new())
            .await;

        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_empty_catalog_skips_generator() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();

        let service = RecommendationService::new(
            Arc::new(ProductStore::default()),
            Arc::new(generator),
            PayloadLimits::default(),
        );
        let outcome = service
            .recommend(&Preferences::default(), &BrowsingHistory::new())
            .await
            .unwrap();

        assert_eq!(outcome.count, 0);
    }

    #[tokio::test]
    async fn test_session_pending_flag_cleared_after_failure() {
        let mut generator = mock_generator();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(AppError::ExternalService("down".to_string())));

        let sessions = Arc::new(RwLock::new(SessionStore::new()));
        let session_id = sessions.write().await.create().id;

        let result = service(generator)
            .recommend_for_session(&sessions, session_id)
            .await;

        assert!(result.is_err());
        assert!(!sessions.read().await.get(&session_id).unwrap().pending);
    }

    struct SlowGenerator;

    #[async_trait::async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _payload: &RecommendationPayload) -> AppResult<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("[]".to_string())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_session() {
        let service = RecommendationService::new(
            store(),
            Arc::new(SlowGenerator),
            PayloadLimits::default(),
        );
        let sessions = Arc::new(RwLock::new(SessionStore::new()));
        let session_id = sessions.write().await.create().id;

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            service.recommend_for_session(&sessions, session_id),
        )
        .await;

        assert!(result.is_err());
        assert!(!sessions.read().await.get(&session_id).unwrap().pending);
        assert!(sessions
            .write()
            .await
            .get_mut(&session_id)
            .unwrap()
            .begin_request()
            .is_ok());
    }

    #[test]
    fn test_pending_session_rejects_new_request() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        let service = service(generator);

        let mut store = SessionStore::new();
        let session_id = store.create().id;
        store.get_mut(&session_id).unwrap().begin_request().unwrap();
        let sessions = Arc::new(RwLock::new(store));

        let result =
            tokio_test::block_on(service.recommend_for_session(&sessions, session_id));

        assert!(matches!(result, Err(AppError::Conflict(_))));
        // The first request still owns the pending flag
        assert!(tokio_test::block_on(sessions.read()).get(&session_id).unwrap().pending);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let service = service(MockTextGenerator::new());
        let sessions = Arc::new(RwLock::new(SessionStore::new()));

        let result = service
            .recommend_for_session(&sessions, Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
