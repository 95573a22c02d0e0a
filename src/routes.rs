use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::models::ErrorResponse;
use crate::pipeline::{SummarizeError, Summarizer};
use crate::upload::{self, UploadError};

/// Room for multipart boundaries, headers and the `fileType` field.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<Summarizer>,
}

pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.summarizer.policy().max_bytes + MULTIPART_OVERHEAD);

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/summarize", post(summarize_endpoint))
        .layer(body_limit)
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn summarize_endpoint(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            let err = SummarizeError::Upload(UploadError::Multipart(rejection.body_text()));
            tracing::warn!(error = %err, "rejected upload");
            return error_response(&err);
        }
    };

    let doc = match upload::read_upload(multipart).await {
        Ok(doc) => doc,
        Err(e) => {
            let err = SummarizeError::Upload(e);
            tracing::warn!(error = %err, "rejected upload");
            return error_response(&err);
        }
    };

    let filename = doc.filename.clone();
    let mime = doc.display_type();
    let size = doc.size();

    match state.summarizer.summarize(doc).await {
        Ok(result) => {
            tracing::info!(%filename, %mime, size, "article summarized");
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => {
            let stage = err.stage();
            if err.is_client_error() {
                tracing::warn!(%filename, %mime, size, %stage, error = %err, "rejected upload");
            } else {
                tracing::error!(%filename, %mime, size, %stage, error = %err, "summarization failed");
            }
            error_response(&err)
        }
    }
}

fn error_response(err: &SummarizeError) -> Response {
    let (status, message) = match err {
        SummarizeError::Upload(UploadError::MissingFile) => {
            (StatusCode::BAD_REQUEST, "파일이 없습니다.")
        }
        SummarizeError::Upload(UploadError::TooLarge { .. }) => {
            (StatusCode::BAD_REQUEST, "파일 크기가 너무 큽니다.")
        }
        SummarizeError::Upload(UploadError::UnsupportedType(_)) => (
            StatusCode::BAD_REQUEST,
            "지원하지 않는 파일 형식입니다. JPG, PNG, GIF, PDF 파일만 업로드 가능합니다.",
        ),
        SummarizeError::Upload(_) => (StatusCode::BAD_REQUEST, "업로드된 파일을 읽을 수 없습니다."),
        SummarizeError::Content(_) => (StatusCode::BAD_REQUEST, "파일 내용을 추출할 수 없습니다."),
        SummarizeError::Upstream { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "요약 서비스 호출 중 오류가 발생했습니다.",
        ),
        SummarizeError::Parse(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "요약 서비스의 응답 형식을 해석할 수 없습니다.",
        ),
        SummarizeError::Validation(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "유효하지 않은 요약 결과입니다.")
        }
    };

    (status, Json(ErrorResponse::new(message, Some(err.to_string())))).into_response()
}
