use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use atelier_ai::workflows::drawing::extraction::ExtractionRequest;
use atelier_ai::workflows::drawing::versioning::{analysis_router, AnalysisStore, AnalysisWorkflow};

use crate::infra::AppState;

/// 25 MiB upload ceiling for drawings posted to the extract endpoint.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub(crate) fn with_analysis_routes<S>(workflow: Arc<AnalysisWorkflow<S>>) -> axum::Router
where
    S: AnalysisStore + 'static,
{
    analysis_router(workflow)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/drawings/extract",
            axum::routing::post(extract_endpoint),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtractRequest {
    pub(crate) file_name: String,
    #[serde(default)]
    pub(crate) file_type: Option<String>,
    pub(crate) content_base64: String,
}

pub(crate) async fn extract_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ExtractRequest>,
) -> impl IntoResponse {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(&payload.content_base64) {
        Ok(bytes) => bytes,
        Err(err) => {
            let body = json!({ "error": format!("contentBase64 is not valid base64: {err}") });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let file_type = payload.file_type.clone().or_else(|| {
        mime_guess::from_path(&payload.file_name)
            .first()
            .map(|mime| mime.essence_str().to_string())
    });

    let mut request = ExtractionRequest::new(payload.file_name, bytes);
    if let Some(file_type) = file_type {
        request = request.with_file_type(file_type);
    }

    // The gateway wraps its own blocking runtime; keep it off the async
    // worker threads.
    let extractor = state.extractor.clone();
    let result = tokio::task::spawn_blocking(move || extractor.analyze_drawing(request)).await;

    match result {
        Ok(Ok(extraction)) => (StatusCode::OK, Json(extraction)).into_response(),
        Ok(Err(err)) => {
            let body = json!({ "error": err.to_string() });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
        Err(err) => {
            let body = json!({ "error": format!("extraction task failed: {err}") });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
