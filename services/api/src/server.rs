use crate::cli::ServeArgs;
use crate::infra::{AppState, CannedExtractionGateway, InMemoryAnalysisStore};
use crate::routes::with_analysis_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use atelier_ai::config::AppConfig;
use atelier_ai::error::AppError;
use atelier_ai::telemetry;
use atelier_ai::workflows::drawing::extraction::{ExtractionGateway, HttpExtractionClient};
use atelier_ai::workflows::drawing::versioning::{
    AnalysisWorkflow, HttpDocumentStore, SessionService,
};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let extractor: Arc<dyn ExtractionGateway> = if config.extraction.base_url.is_some() {
        Arc::new(HttpExtractionClient::from_config(&config.extraction)?)
    } else {
        info!("no extraction endpoint configured, using the canned gateway");
        Arc::new(CannedExtractionGateway)
    };

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        extractor,
    };

    let app = if config.store.base_url.is_some() {
        let store = Arc::new(HttpDocumentStore::from_config(&config.store)?);
        let workflow = Arc::new(AnalysisWorkflow::new(SessionService::new(store)));
        with_analysis_routes(workflow)
    } else {
        info!("no document store configured, analyses persist in memory only");
        let store = Arc::new(InMemoryAnalysisStore::default());
        let workflow = Arc::new(AnalysisWorkflow::new(SessionService::new(store)));
        with_analysis_routes(workflow)
    };

    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "drawing analysis orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
