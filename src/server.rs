//! HTTP endpoint for prompt-to-video generation.

use crate::error::{ClipForgeError, OutwardError};
use crate::video::orchestrator::Orchestrator;
use crate::video::types::{GenerationRequest, GenerationResult, InputImage, ProviderKind};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Largest accepted reference image (30 MB).
pub const MAX_IMAGE_BYTES: usize = 30 * 1024 * 1024;

/// Allowance for the prompt and multipart framing on top of the image.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Builds the application router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/videos/kie", post(generate_kie))
        .route("/v1/videos/sora", post(generate_sora))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES))
        .with_state(orchestrator)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn generate_kie(
    State(orchestrator): State<Arc<Orchestrator>>,
    req: Request,
) -> Result<Json<GenerationResult>, ApiError> {
    handle(&orchestrator, ProviderKind::Kie, req).await
}

async fn generate_sora(
    State(orchestrator): State<Arc<Orchestrator>>,
    req: Request,
) -> Result<Json<GenerationResult>, ApiError> {
    handle(&orchestrator, ProviderKind::Sora, req).await
}

async fn handle(
    orchestrator: &Orchestrator,
    kind: ProviderKind,
    req: Request,
) -> Result<Json<GenerationResult>, ApiError> {
    let request = read_generation_request(req).await?;
    tracing::info!(
        provider = %kind,
        has_image = request.image.is_some(),
        "received generation request"
    );

    let result = orchestrator.generate(kind, &request).await.map_err(|e| {
        tracing::error!(provider = %kind, "video generation failed: {e}");
        ApiError::from(e)
    })?;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct PromptBody {
    prompt: String,
}

/// Accepts either a JSON body or a multipart form with `prompt` and `image`.
async fn read_generation_request(req: Request) -> Result<GenerationRequest, ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (prompt, image) = if is_multipart {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
        read_multipart(multipart).await?
    } else {
        let Json(body) = Json::<PromptBody>::from_request(req, &())
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
        (Some(body.prompt), None)
    };

    let prompt = prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "prompt is required"))?;

    let mut request = GenerationRequest::new(prompt);
    if let Some(image) = image {
        request = request.with_image(image);
    }
    Ok(request)
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Option<String>, Option<InputImage>), ApiError> {
    let mut prompt = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        match field.name() {
            Some("prompt") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                prompt = Some(text);
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

                if data.len() > MAX_IMAGE_BYTES {
                    return Err(ApiError::new(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!("image exceeds {} bytes", MAX_IMAGE_BYTES),
                    ));
                }
                if data.is_empty() {
                    continue;
                }

                let mut input = InputImage::new(data.to_vec(), filename);
                if let Some(ct) = content_type {
                    input = input.with_content_type(ct);
                }
                image = Some(input);
            }
            _ => {}
        }
    }

    Ok((prompt, image))
}

/// Error response: status code plus a short JSON message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ClipForgeError> for ApiError {
    fn from(err: ClipForgeError) -> Self {
        match err {
            ClipForgeError::InvalidRequest(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            other => match other.outward() {
                OutwardError::Timeout => {
                    Self::new(StatusCode::REQUEST_TIMEOUT, "video generation timed out")
                }
                OutwardError::Internal => {
                    Self::new(StatusCode::INTERNAL_SERVER_ERROR, "video generation failed")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
