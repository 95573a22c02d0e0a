use std::fmt;
use std::sync::Arc;

use crate::config::UploadPolicy;
use crate::content::{self, ContentError, ExtractedContent};
use crate::llm::{Generator, UpstreamError};
use crate::models::ExtractionResult;
use crate::parse::{self, ParseError, ValidationError};
use crate::prompt::{self, Purpose};
use crate::upload::{self, UploadError, UploadedDocument};

// ── Stages ───────────────────────────────────────────────────────────────────

/// Per-request states, strictly in order. Failure can end any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Validated,
    Extracted,
    MetadataRequested,
    MetadataParsed,
    SummaryRequested,
    SummaryParsed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Extracted => "extracted",
            Stage::MetadataRequested => "metadata_requested",
            Stage::MetadataParsed => "metadata_parsed",
            Stage::SummaryRequested => "summary_requested",
            Stage::SummaryParsed => "summary_parsed",
        };
        f.write_str(name)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{} call failed: {}", .purpose.as_str(), .source)]
    Upstream {
        purpose: Purpose,
        #[source]
        source: UpstreamError,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl SummarizeError {
    /// Last stage the request reached before this error ended it.
    pub fn stage(&self) -> Stage {
        match self {
            SummarizeError::Upload(_) => Stage::Received,
            SummarizeError::Content(_) => Stage::Validated,
            SummarizeError::Upstream {
                purpose: Purpose::Metadata,
                ..
            } => Stage::Extracted,
            SummarizeError::Parse(_) => Stage::MetadataRequested,
            SummarizeError::Upstream {
                purpose: Purpose::Summary,
                ..
            } => Stage::MetadataParsed,
            SummarizeError::Validation(_) => Stage::SummaryRequested,
        }
    }

    /// Upload and content problems are the client's; the rest are ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SummarizeError::Upload(_) | SummarizeError::Content(_))
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

pub struct Summarizer {
    generator: Arc<dyn Generator>,
    policy: UploadPolicy,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn Generator>, policy: UploadPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate, extract, then ask for metadata and summary one after the
    /// other. Any failure ends the request; nothing partial is returned.
    #[tracing::instrument(
        skip_all,
        fields(filename = %doc.filename, mime = %doc.display_type(), size = doc.size())
    )]
    pub async fn summarize(&self, doc: UploadedDocument) -> Result<ExtractionResult, SummarizeError> {
        tracing::debug!(stage = %Stage::Received, "upload received");

        upload::validate(&doc, &self.policy)?;
        tracing::debug!(stage = %Stage::Validated, "upload accepted");

        let content = content::extract(doc).await?;
        tracing::debug!(stage = %Stage::Extracted, kind = content.kind(), "content extracted");

        let raw_metadata = self.call(&content, Purpose::Metadata).await?;
        let metadata = parse::parse_metadata(&raw_metadata).map_err(|e| {
            tracing::debug!(response = %raw_metadata, "metadata response did not match format");
            e
        })?;
        tracing::debug!(stage = %Stage::MetadataParsed, headline = %metadata.headline, "metadata parsed");

        let raw_summary = self.call(&content, Purpose::Summary).await?;
        let summary = parse::clean_summary(&raw_summary);
        let result = parse::validate(metadata, summary)?;
        tracing::debug!(stage = %Stage::SummaryParsed, "summary parsed and validated");

        Ok(result)
    }

    async fn call(
        &self,
        content: &ExtractedContent,
        purpose: Purpose,
    ) -> Result<String, SummarizeError> {
        let payload = prompt::build(content, purpose);
        let stage = match purpose {
            Purpose::Metadata => Stage::MetadataRequested,
            Purpose::Summary => Stage::SummaryRequested,
        };
        tracing::debug!(%stage, blocks = payload.blocks.len(), "calling upstream");

        self.generator
            .generate(&payload)
            .await
            .map_err(|source| SummarizeError::Upstream { purpose, source })
    }
}
