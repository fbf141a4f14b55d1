use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/products", get(handlers::list_products))
        .route("/products/categories", get(handlers::get_categories))
        .route("/products/subcategories", get(handlers::get_subcategories))
        .route("/products/brands", get(handlers::get_brands))
        .route("/products/tags", get(handlers::get_tags))
        .route("/products/price-range", get(handlers::get_price_range))
        .route("/products/:id", get(handlers::get_product))
        .route("/products/:id/related", get(handlers::related_products))
        // Sessions
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:id",
            get(handlers::get_session).delete(handlers::end_session),
        )
        .route(
            "/sessions/:id/preferences",
            patch(handlers::update_preferences),
        )
        .route(
            "/sessions/:id/history",
            post(handlers::record_view).delete(handlers::clear_history),
        )
        .route("/sessions/:id/history/summary", get(handlers::history_summary))
        // Recommendations
        .route(
            "/sessions/:id/recommendations",
            post(handlers::session_recommendations),
        )
        .route("/recommendations", post(handlers::recommend))
}
