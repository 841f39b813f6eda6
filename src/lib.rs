pub mod processing;
pub mod templates;

use axum::{
    Json, Router,
    extract::Multipart,
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use processing::{ReductionOptions, TrackError, TrackReport, analyze_track_bytes};
use templates::{render_landing_page, render_report};
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Response header carrying the id of the analysis span.
pub const ANALYSIS_ID_HEADER: &str = "x-analysis-id";

pub fn build_app() -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/upload", post(handle_upload))
        .route("/api/analyze", post(handle_analyze))
}

async fn landing_page() -> Html<String> {
    Html(render_landing_page())
}

#[derive(Debug, Error)]
enum UploadError {
    #[error("No file provided")]
    MissingFile,
    #[error("Failed to read form field {field}: {reason}")]
    Field { field: String, reason: String },
    #[error("Invalid {name}: {raw:?} is not a number")]
    NotANumber { name: &'static str, raw: String },
    #[error(transparent)]
    Track(#[from] TrackError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
    options: ReductionOptions,
}

/// Blank values keep the default; anything else must parse as a number.
fn parse_number(name: &'static str, raw: &str) -> Result<Option<f64>, UploadError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| UploadError::NotANumber {
            name,
            raw: raw.to_string(),
        })
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, UploadError> {
    let mut uploaded: Option<(String, Vec<u8>)> = None;
    let mut options = ReductionOptions::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return Err(UploadError::Field {
                    field: "multipart".to_string(),
                    reason: err.to_string(),
                });
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let read_error = |err: axum::extract::multipart::MultipartError| UploadError::Field {
            field: name.clone(),
            reason: err.to_string(),
        };

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(read_error)?;
                uploaded = Some((file_name, bytes.to_vec()));
            }
            "running_speed" => {
                let text = field.text().await.map_err(read_error)?;
                if let Some(value) = parse_number("running_speed", &text)? {
                    options.running_speed_kmh = value;
                }
            }
            "interval" => {
                let text = field.text().await.map_err(read_error)?;
                if let Some(value) = parse_number("interval", &text)? {
                    options.interval_m = value;
                }
            }
            "split_km" => {
                let text = field.text().await.map_err(read_error)?;
                if let Some(value) = parse_number("split_km", &text)? {
                    options.split_m = value * 1000.0;
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = uploaded.ok_or(UploadError::MissingFile)?;
    if bytes.is_empty() {
        return Err(UploadError::MissingFile);
    }
    Ok(Upload {
        file_name,
        bytes,
        options,
    })
}

/// Read the form, analyze the track and log the outcome inside one span.
async fn analyze_upload(multipart: Multipart) -> (Uuid, Result<TrackReport, UploadError>) {
    let analysis_id = Uuid::new_v4();
    let span = info_span!("analysis", %analysis_id);

    let result = async {
        let upload = read_upload(multipart).await?;
        info!(
            file_name = %upload.file_name,
            bytes = upload.bytes.len(),
            "analyzing upload"
        );
        let report = analyze_track_bytes(&upload.bytes, &upload.file_name, &upload.options)?;
        info!(
            distance_km = report.summary.distance_km,
            splits = report.splits.len(),
            "analysis complete"
        );
        Ok::<_, UploadError>(report)
    }
    .instrument(span.clone())
    .await;

    if let Err(err) = &result {
        span.in_scope(|| warn!(error = %err, "rejected upload"));
    }
    (analysis_id, result)
}

fn with_analysis_id(mut response: Response, analysis_id: Uuid) -> Response {
    if let Ok(value) = HeaderValue::from_str(&analysis_id.to_string()) {
        response.headers_mut().insert(ANALYSIS_ID_HEADER, value);
    }
    response
}

async fn handle_upload(multipart: Multipart) -> Response {
    let (analysis_id, result) = analyze_upload(multipart).await;
    let response = match result {
        Ok(report) => Html(render_report(&report)).into_response(),
        Err(err) => err.into_response(),
    };
    with_analysis_id(response, analysis_id)
}

async fn handle_analyze(multipart: Multipart) -> Response {
    let (analysis_id, result) = analyze_upload(multipart).await;
    let response = match result {
        Ok(report) => Json(report).into_response(),
        Err(err) => err.into_response(),
    };
    with_analysis_id(response, analysis_id)
}
