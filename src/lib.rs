pub mod config;
pub mod content;
pub mod inflight;
pub mod llm;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod routes;
pub mod upload;

pub use config::Config;
pub use models::{ErrorResponse, ExtractionResult};
pub use pipeline::{SummarizeError, Summarizer};
pub use routes::{create_router, AppState};
