use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eyre::WrapErr;
use scribe_core::{tempaudio::audio_file_name, TempAudio, TranscribeOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::setup::ModelContext;

const DEFAULT_FILENAME: &str = "audio";
const DEFAULT_FORMAT: &str = "wav";
const DEFAULT_LANGUAGE: &str = "auto";

const EMPTY_REQUEST: &str = "empty request JSON";
const MISSING_DATA: &str = "missing field 'data' (base64)";

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct TranscribeRequest {
    /// Base64 encoded audio file.
    pub data: Option<String>,
    /// Original file name, defaults to `audio`.
    pub filename: Option<String>,
    /// Audio container extension, defaults to `wav`.
    pub format: Option<String>,
    /// Spoken language code or `auto` to detect it.
    pub language: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
}

#[derive(Serialize, ToSchema)]
pub struct TranscribeResponse {
    pub ok: bool,
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// The body could not be read, e.g. it exceeded the size limit.
    Body(BytesRejection),
    Internal(eyre::Report),
}

impl From<eyre::Report> for ApiError {
    fn from(report: eyre::Report) -> Self {
        ApiError::Internal(report)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => {
                tracing::warn!("rejected request: {}", error);
                let body = ErrorResponse {
                    ok: false,
                    error,
                    trace: None,
                };
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::Body(rejection) => {
                tracing::warn!("unreadable request body: {}", rejection.body_text());
                let body = ErrorResponse {
                    ok: false,
                    error: rejection.body_text(),
                    trace: None,
                };
                (rejection.status(), body)
            }
            ApiError::Internal(report) => {
                let trace = format!("{:?}", report);
                tracing::error!("transcription failed: {}", trace);
                let body = ErrorResponse {
                    ok: false,
                    error: format!("{:#}", report),
                    trace: Some(trace),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, transcribe),
    components(schemas(HealthResponse, TranscribeRequest, TranscribeResponse, ErrorResponse))
)]
pub struct ApiDoc;

pub fn router(context: ModelContext, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/transcribe", post(transcribe))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(context): State<ModelContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        model: context.model.clone(),
    })
}

#[utoipa::path(
    post,
    path = "/transcribe",
    request_body = TranscribeRequest,
    responses(
        (status = 200, description = "Transcript of the uploaded audio", body = TranscribeResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 500, description = "Decoding or transcription failed", body = ErrorResponse)
    )
)]
pub async fn transcribe(
    State(context): State<ModelContext>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let body = body.map_err(ApiError::Body)?;
    let request = parse_request(&body)?;
    let data = request
        .data
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ApiError::BadRequest(MISSING_DATA.to_string()))?;
    let filename = request.filename.unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    let format = request.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string());
    let language = request.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let text = tokio::task::spawn_blocking(move || {
        run_transcription(&context, &data, &filename, &format, &language)
    })
    .await
    .wrap_err("transcription task aborted")??;

    Ok(Json(TranscribeResponse { ok: true, text }))
}

fn parse_request(body: &[u8]) -> Result<TranscribeRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest(EMPTY_REQUEST.to_string()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
    match &value {
        Value::Null => return Err(ApiError::BadRequest(EMPTY_REQUEST.to_string())),
        Value::Object(fields) if fields.is_empty() => {
            return Err(ApiError::BadRequest(EMPTY_REQUEST.to_string()))
        }
        Value::Object(_) => {}
        _ => {
            return Err(ApiError::BadRequest(
                "request JSON must be an object".to_string(),
            ))
        }
    }
    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("invalid request: {}", e)))
}

/// Decode, write, transcribe. The temp file is removed when `audio` goes out
/// of scope, on every path out of this function.
fn run_transcription(
    context: &ModelContext,
    data: &str,
    filename: &str,
    format: &str,
    language: &str,
) -> eyre::Result<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .wrap_err("invalid base64 in 'data'")?;

    let name = audio_file_name(filename, format);
    let audio = TempAudio::write(context.temp_dir.as_deref(), &name, &bytes)?;
    let options = TranscribeOptions::from_language(Some(language)).with_threads(context.n_threads);

    tracing::info!("transcribing {} (lang={})", audio.path().display(), language);
    let transcript = context.transcriber.transcribe(audio.path(), &options)?;
    Ok(transcript.text.trim().to_string())
}
