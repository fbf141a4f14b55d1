pub mod catalog;
pub mod filter;
pub mod providers;
pub mod recommendations;
pub mod request_builder;
pub mod response_parser;
pub mod session;

pub use catalog::ProductStore;
pub use providers::{OpenAiGenerator, TextGenerator};
pub use recommendations::{RecommendationOutcome, RecommendationService};
pub use request_builder::{PayloadLimits, RecommendationPayload};
pub use session::{SessionContext, SessionStore};
