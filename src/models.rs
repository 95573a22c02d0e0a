use serde::{Deserialize, Serialize};

/// The only payload a successful upload ever returns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub headline: String,
    pub press: String,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }
}
