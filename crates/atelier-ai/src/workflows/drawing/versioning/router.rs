use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::workflows::drawing::estimating::CatalogProfile;

use super::domain::{AnalysisId, AnalysisSummaryView, ClientRef};
use super::export::export_csv;
use super::session::{AnalysisSession, SessionError, SessionEvent, SessionService, SessionView};
use super::store::{AnalysisStore, StoreError};

/// Shared workflow state: the session service plus the in-progress sessions.
pub struct AnalysisWorkflow<S> {
    service: SessionService<S>,
    sessions: Mutex<HashMap<String, AnalysisSession>>,
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> String {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("session-{id:06}")
}

impl<S> AnalysisWorkflow<S>
where
    S: AnalysisStore + 'static,
{
    pub fn new(service: SessionService<S>) -> Self {
        Self {
            service,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &SessionService<S> {
        &self.service
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        operation: impl FnOnce(&SessionService<S>, &mut AnalysisSession) -> Result<T, SessionError>,
    ) -> Result<T, WorkflowApiError> {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or(WorkflowApiError::UnknownSession)?;
        operation(&self.service, session).map_err(WorkflowApiError::Session)
    }
}

enum WorkflowApiError {
    UnknownSession,
    Session(SessionError),
    Store(StoreError),
}

impl IntoResponse for WorkflowApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WorkflowApiError::UnknownSession => {
                (StatusCode::NOT_FOUND, "unknown session".to_string())
            }
            WorkflowApiError::Session(SessionError::ValidationRequired) => {
                (StatusCode::CONFLICT, SessionError::ValidationRequired.to_string())
            }
            WorkflowApiError::Session(err @ SessionError::Store(_)) => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            WorkflowApiError::Session(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            WorkflowApiError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, StoreError::NotFound.to_string())
            }
            WorkflowApiError::Store(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Router builder exposing the analysis workflow over HTTP.
pub fn analysis_router<S>(workflow: Arc<AnalysisWorkflow<S>>) -> Router
where
    S: AnalysisStore + 'static,
{
    Router::new()
        .route("/api/v1/drawings/sessions", post(create_session_handler::<S>))
        .route(
            "/api/v1/drawings/sessions/:session_id",
            get(session_handler::<S>),
        )
        .route(
            "/api/v1/drawings/sessions/:session_id/events",
            post(event_handler::<S>),
        )
        .route(
            "/api/v1/drawings/sessions/:session_id/flush",
            post(flush_handler::<S>),
        )
        .route(
            "/api/v1/drawings/sessions/:session_id/calculate",
            post(calculate_handler::<S>),
        )
        .route("/api/v1/drawings/analyses", get(list_handler::<S>))
        .route(
            "/api/v1/drawings/analyses/export",
            get(export_handler::<S>),
        )
        .route(
            "/api/v1/drawings/analyses/:analysis_id/versions",
            get(versions_handler::<S>),
        )
        .route(
            "/api/v1/drawings/analyses/:analysis_id",
            delete(delete_handler::<S>),
        )
        .with_state(workflow)
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    title: String,
    client: ClientRef,
    profile: CatalogProfile,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionEnvelope {
    session: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<AnalysisSummaryView>,
}

async fn create_session_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Json(request): Json<CreateSessionRequest>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let session = AnalysisSession::new(request.client, request.profile, request.title);
    let session_id = next_session_id();
    let view = session.view();

    let mut sessions = workflow.sessions.lock().expect("session mutex poisoned");
    sessions.insert(session_id.clone(), session);

    (
        StatusCode::CREATED,
        Json(json!({ "sessionId": session_id, "session": view })),
    )
        .into_response()
}

async fn session_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let result = workflow.with_session(&session_id, |_, session| Ok(session.view()));
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn event_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Path(session_id): Path<String>,
    Json(event): Json<SessionEvent>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let result = run_blocking(move || {
        workflow.with_session(&session_id, |service, session| {
            let saved = service.handle(session, event, Utc::now())?;
            Ok(SessionEnvelope {
                session: session.view(),
                saved: saved.map(|record| record.summary_view()),
            })
        })
    })
    .await;

    match result {
        Ok(Ok(envelope)) => (StatusCode::OK, Json(envelope)).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(response) => response,
    }
}

async fn flush_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let result = run_blocking(move || {
        workflow.with_session(&session_id, |service, session| {
            let saved = service.poll(session, Utc::now())?;
            Ok(SessionEnvelope {
                session: session.view(),
                saved: saved.map(|record| record.summary_view()),
            })
        })
    })
    .await;

    match result {
        Ok(Ok(envelope)) => (StatusCode::OK, Json(envelope)).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(response) => response,
    }
}

async fn calculate_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let result = run_blocking(move || {
        workflow.with_session(&session_id, |service, session| {
            service.calculate(session, Utc::now())
        })
    })
    .await;

    match result {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
struct ClientFilter {
    client: String,
}

async fn list_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Query(filter): Query<ClientFilter>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let store = workflow.service.store().clone();
    let result = run_blocking(move || store.list_for_client(&filter.client)).await;

    match result {
        Ok(Ok(records)) => {
            let views: Vec<AnalysisSummaryView> =
                records.iter().map(|record| record.summary_view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Ok(Err(err)) => WorkflowApiError::Store(err).into_response(),
        Err(response) => response,
    }
}

async fn versions_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Path(analysis_id): Path<String>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let store = workflow.service.store().clone();
    let result = run_blocking(move || store.lineage(&AnalysisId(analysis_id))).await;

    match result {
        Ok(Ok(records)) => {
            let views: Vec<AnalysisSummaryView> =
                records.iter().map(|record| record.summary_view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Ok(Err(err)) => WorkflowApiError::Store(err).into_response(),
        Err(response) => response,
    }
}

async fn delete_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Path(analysis_id): Path<String>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let store = workflow.service.store().clone();
    let result = run_blocking(move || store.delete(&AnalysisId(analysis_id))).await;

    match result {
        Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(err)) => WorkflowApiError::Store(err).into_response(),
        Err(response) => response,
    }
}

async fn export_handler<S>(
    State(workflow): State<Arc<AnalysisWorkflow<S>>>,
    Query(filter): Query<ClientFilter>,
) -> Response
where
    S: AnalysisStore + 'static,
{
    let store = workflow.service.store().clone();
    let result = run_blocking(move || store.list_for_client(&filter.client)).await;

    let records = match result {
        Ok(Ok(records)) => records,
        Ok(Err(err)) => return WorkflowApiError::Store(err).into_response(),
        Err(response) => return response,
    };

    let mut buffer = Vec::new();
    if let Err(err) = export_csv(&records, &mut buffer) {
        let body = Json(json!({ "error": format!("csv export failed: {err}") }));
        return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// The store clients wrap their own blocking runtime, so every store-touching
/// operation leaves the async worker threads.
async fn run_blocking<T>(task: impl FnOnce() -> T + Send + 'static) -> Result<T, Response>
where
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        let body = Json(json!({ "error": format!("workflow task failed: {err}") }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    })
}
