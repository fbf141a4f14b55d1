/// Text generation provider abstraction
///
/// Recommendation generation is delegated to a hosted model. The core only
/// shapes the payload and parses the raw reply, so the call itself sits
/// behind this trait and tests substitute a deterministic stub.
use crate::{error::AppResult, services::request_builder::RecommendationPayload};

pub mod openai;

pub use openai::OpenAiGenerator;

/// Trait for text generation providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends one payload to the model and returns its raw text reply
    ///
    /// Fails with `ExternalService` (or `HttpClient`) when the call fails,
    /// times out or returns no content. No retries.
    async fn generate(&self, payload: &RecommendationPayload) -> AppResult<String>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
