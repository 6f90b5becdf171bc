use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{DownloadRequest, PingResponse, SignatureQuery, StatusResponse},
    signature,
    state::AppState,
    utils::{self, BodyFormat},
    validation,
};
use crate::ledger::JobRecord;

fn check_signature(state: &AppState, query: &SignatureQuery) -> Result<(), ApiError> {
    signature::verify(
        state.token(),
        &query.signature,
        &query.timestamp,
        &query.nonce,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected unsigned request");
        ApiError::from(e)
    })
}

/// Download intake endpoint (POST /download)
///
/// ## Flow:
/// 1. Verify the request signature
/// 2. Decode the body as JSON or form, enforcing the payload limit
/// 3. Validate and convert into a `DownloadJob`
/// 4. Persist the job record so the archive's expiry can be reported after a restart
/// 5. Hand the job to the dispatcher; a full queue rolls the record back and answers 503
/// 6. Return 201 `{"code":0,"msg":"downloading"}`
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<SignatureQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    check_signature(&state, &query)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    let format = utils::parse_content_type(content_type)?;

    let body_bytes = read_body(body, state.config.server.max_payload_bytes.as_u64() as usize).await?;
    let request: DownloadRequest = match format {
        BodyFormat::Json => serde_json::from_slice(&body_bytes)?,
        BodyFormat::Form => serde_urlencoded::from_bytes(&body_bytes)?,
    };

    let job = validation::validate_request(request).inspect_err(|e| {
        state.metrics.job_rejected(1);
        warn!(error = %e, "Rejected download request");
    })?;

    let record = JobRecord::new(&job.archive_name, &job.callback_url);
    state
        .store
        .put(&record)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store job record: {}", e)))?;

    let archive_name = job.archive_name.clone();
    let pins = job.pins.len();
    if let Err(e) = state.dispatcher.submit(job) {
        state.metrics.job_rejected(1);
        if let Err(del) = state.store.delete(&archive_name).await {
            warn!(archive = %archive_name, error = %del, "Failed to roll back job record");
        }
        return Err(e.into());
    }

    state.metrics.job_accepted(1);
    info!(archive = %archive_name, pins, "Download accepted");

    Ok((StatusCode::CREATED, Json(StatusResponse::downloading())))
}

async fn read_body(body: Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    utils::validate_body_size(&data, max_size)?;

    Ok(data)
}

/// Signed status endpoint (GET /ping)
pub async fn ping(
    State(state): State<AppState>,
    Query(query): Query<SignatureQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_signature(&state, &query)?;

    let download_dir = &state.config.storage.download_dir;
    let disk_rate = state.disk.used_percent(download_dir).unwrap_or_else(|e| {
        warn!(dir = %download_dir.display(), error = %e, "Cannot sample disk usage");
        -1.0
    });

    let response = PingResponse {
        code: 0,
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: state.config.server.status.as_str().to_string(),
        disk_rate,
        timestamp: chrono::Utc::now().timestamp(),
        alert: state.config.server.alert.clone(),
        queued: state.dispatcher.queued(),
        jobs: state.metrics.snapshot(),
    };

    Ok(Json(response))
}

/// Liveness probe (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.dispatcher.health_check() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "dispatcher stopped")
    }
}

/// Archive retrieval (GET /downloads/{filename})
pub async fn send_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !utils::is_servable_archive(&filename, &state.config.storage.archive_prefix) {
        return Err(ApiError::InvalidPayload(format!("illegal file name: {filename}")));
    }

    let path = state.config.storage.download_dir.join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(filename));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound(filename));
    }

    let headers = [
        (header::CONTENT_TYPE, "application/x-tar".to_string()),
        (header::CONTENT_LENGTH, metadata.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}
