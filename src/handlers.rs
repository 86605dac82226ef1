//! HTTP handlers

use crate::error::{BgRemovalError, Result};
use crate::server::AppState;
use crate::services::TempFileStream;
use crate::tracing_config::spans;
use crate::upload;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use instant::Instant;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, Instrument};

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// A fully received upload
#[derive(Debug)]
struct Upload {
    filename: Option<String>,
    bytes: Bytes,
}

/// `POST /remove`: upload an image, receive it back as a transparent PNG
///
/// # Errors
/// - 400/422/413 for malformed, incomplete or oversized uploads
/// - 500 for any failure while converting
pub async fn remove_background(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let span = spans::request("remove_background");
    async move {
        let start = Instant::now();
        let upload = read_upload(&mut multipart?).await?;
        info!(
            filename = upload.filename.as_deref().unwrap_or_default(),
            bytes = upload.bytes.len(),
            "Received upload"
        );

        let download_name = upload::download_filename(upload.filename.as_deref());
        let output = convert(&state, upload).await?;
        let (stream, len) = TempFileStream::open(output).await?;

        info!(
            filename = %download_name,
            bytes = len,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Background removed"
        );

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/png")
            .header(header::CONTENT_LENGTH, len)
            .header(
                header::CONTENT_DISPOSITION,
                upload::content_disposition(&download_name),
            )
            .body(stream.into_body())
            .map_err(|e| BgRemovalError::internal(format!("Failed to build response: {e}")))
    }
    .instrument(span)
    .await
}

/// Read multipart fields until the upload field is found
async fn read_upload(multipart: &mut Multipart) -> Result<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            let filename = field.file_name().map(str::to_owned);
            let bytes = field.bytes().await?;
            return Ok(Upload { filename, bytes });
        }
    }

    Err(BgRemovalError::MissingUpload(format!(
        "multipart field '{UPLOAD_FIELD}' is required"
    )))
}

/// Run upload -> temp file -> model -> PNG temp file on the blocking pool
///
/// The input temp file is deleted before this returns on every path,
/// including a panic in the remover.
async fn convert(state: &AppState, upload: Upload) -> Result<tempfile::TempPath> {
    let remover = Arc::clone(&state.remover);
    let temp_files = state.temp_files.clone();
    let suffix = upload::input_suffix(upload.filename.as_deref());

    tokio::task::spawn_blocking(move || -> Result<tempfile::TempPath> {
        let input = temp_files.persist_upload(&upload.bytes, &suffix)?;
        let mut result = remover.remove_background(&input)?;
        drop(input);

        let output = temp_files.create_output()?;
        result.save_png(&output)?;
        tracing::debug!(timings = ?result.timings, "Conversion finished");
        Ok(output)
    })
    .await
    .map_err(|e| BgRemovalError::internal(format!("Conversion task failed: {e}")))?
}

/// `GET /health` response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub backend: String,
    pub started_at: DateTime<Utc>,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        model: state.remover.model_name(),
        backend: state.backend.clone(),
        started_at: state.started_at,
    })
}
