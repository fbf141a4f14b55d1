use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{
        BrowsingHistory, HistorySummary, Preferences, PreferencesUpdate, PriceBounds, Product,
        ProductQuery, Recommendation,
    },
    services::{RecommendationOutcome, SessionContext},
};

use super::AppState;

const DEFAULT_RELATED_LIMIT: usize = 5;

// Request/Response types

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Vec<Product>,
    pub count: usize,
}

impl ProductListResponse {
    fn from_refs(products: Vec<&Product>) -> Self {
        Self {
            success: true,
            count: products.len(),
            products: products.into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub product: Product,
}

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PriceRangeResponse {
    pub success: bool,
    pub price_range: PriceBounds,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: SessionContext,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub success: bool,
    pub preferences: Preferences,
}

#[derive(Debug, Deserialize)]
pub struct RecordViewRequest {
    pub product_id: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    /// False when the view was a repeat and the history did not change
    pub recorded: bool,
    pub browsing_history: BrowsingHistory,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: HistorySummary,
    pub insight: String,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub browsing_history: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
    pub count: usize,
    pub warnings: Vec<String>,
}

impl From<RecommendationOutcome> for RecommendationsResponse {
    fn from(outcome: RecommendationOutcome) -> Self {
        Self {
            success: true,
            recommendations: outcome.recommendations,
            count: outcome.count,
            warnings: outcome.warnings,
        }
    }
}

fn list_response(key: &str, values: Vec<String>) -> Json<Value> {
    Json(json!({ "success": true, key: values }))
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Query the catalog
pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> AppResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    Ok(Json(ProductListResponse::from_refs(state.catalog.query(&query))))
}

/// Get a single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<ProductResponse>> {
    let product = state
        .catalog
        .get(&product_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found", product_id)))?;

    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

/// Products related to a given product
pub async fn related_products(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    query: Result<Query<RelatedQuery>, QueryRejection>,
) -> AppResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_RELATED_LIMIT);
    let related = state.catalog.related(&product_id, limit)?;
    Ok(Json(ProductListResponse::from_refs(related)))
}

pub async fn get_categories(State(state): State<AppState>) -> Json<Value> {
    list_response("categories", state.catalog.categories())
}

pub async fn get_subcategories(
    State(state): State<AppState>,
    query: Result<Query<SubcategoryQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    Ok(list_response(
        "subcategories",
        state.catalog.subcategories(query.category.as_deref()),
    ))
}

pub async fn get_brands(State(state): State<AppState>) -> Json<Value> {
    list_response("brands", state.catalog.brands())
}

pub async fn get_tags(State(state): State<AppState>) -> Json<Value> {
    list_response("tags", state.catalog.tags())
}

pub async fn get_price_range(State(state): State<AppState>) -> Json<PriceRangeResponse> {
    Json(PriceRangeResponse {
        success: true,
        price_range: state.catalog.price_bounds(),
    })
}

/// Start a new browsing session
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let session = state.sessions.write().await.create();
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            success: true,
            session,
        }),
    )
}

pub async fn get_session(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<SessionResponse>> {
    let Path(session_id) = path?;
    let sessions = state.sessions.read().await;
    let session = sessions.get(&session_id)?.clone();
    Ok(Json(SessionResponse {
        success: true,
        session,
    }))
}

pub async fn end_session(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(session_id) = path?;
    state.sessions.write().await.remove(&session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply a partial preference update
pub async fn update_preferences(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<PreferencesUpdate>, JsonRejection>,
) -> AppResult<Json<PreferencesResponse>> {
    let Path(session_id) = path?;
    let Json(update) = body?;

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&session_id)?;
    session.update_preferences(update);

    tracing::debug!(session_id = %session_id, preferences = ?session.preferences, "Preferences updated");

    Ok(Json(PreferencesResponse {
        success: true,
        preferences: session.preferences.clone(),
    }))
}

/// Record a product view
pub async fn record_view(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RecordViewRequest>, JsonRejection>,
) -> AppResult<Json<HistoryResponse>> {
    let Path(session_id) = path?;
    let Json(request) = body?;

    if !state.catalog.contains(&request.product_id) {
        return Err(AppError::NotFound(format!(
            "Product with ID {} not found",
            request.product_id
        )));
    }

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&session_id)?;
    let recorded = session.record_view(request.product_id);

    Ok(Json(HistoryResponse {
        success: true,
        recorded,
        browsing_history: session.history.clone(),
    }))
}

pub async fn clear_history(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<HistoryResponse>> {
    let Path(session_id) = path?;
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&session_id)?;
    session.clear_history();

    tracing::info!(session_id = %session_id, "Browsing history cleared");

    Ok(Json(HistoryResponse {
        success: true,
        recorded: false,
        browsing_history: session.history.clone(),
    }))
}

pub async fn history_summary(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<SummaryResponse>> {
    let Path(session_id) = path?;
    let sessions = state.sessions.read().await;
    let summary = sessions.get(&session_id)?.history.summarize(&state.catalog);

    Ok(Json(SummaryResponse {
        success: true,
        insight: summary.insight(),
        summary,
    }))
}

/// Generate recommendations for a session
pub async fn session_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<RecommendationsResponse>> {
    let Path(session_id) = path?;
    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        "Processing recommendation request"
    );

    let outcome = state
        .recommender
        .recommend_for_session(&state.sessions, session_id)
        .await?;

    tracing::info!(
        request_id = %request_id,
        count = outcome.count,
        dropped = outcome.warnings.len(),
        "Recommendations completed"
    );

    Ok(Json(outcome.into()))
}

/// Generate recommendations from preferences and history sent in the body
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<RecommendationRequest>, JsonRejection>,
) -> AppResult<Json<RecommendationsResponse>> {
    let Json(request) = body?;
    let history = BrowsingHistory::from_views(request.browsing_history);

    tracing::info!(
        request_id = %request_id,
        history_len = history.len(),
        "Processing stateless recommendation request"
    );

    let outcome = state
        .recommender
        .recommend(&request.preferences, &history)
        .await?;

    Ok(Json(outcome.into()))
}
