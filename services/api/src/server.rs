use crate::cli::ServeArgs;
use crate::infra::{build_collaborators, AppState, InMemorySessionStore};
use crate::routes::with_loan_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use loan_agent::config::AppConfig;
use loan_agent::error::AppError;
use loan_agent::telemetry;
use loan_agent::workflows::loan::{LoanSessionService, UnderwritingPolicy, WorkflowEngine};

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let collaborators = build_collaborators(config.storage.sanction_dir.clone());
    let engine = WorkflowEngine::new(collaborators, UnderwritingPolicy::default());
    let service = Arc::new(LoanSessionService::new(
        InMemorySessionStore::default(),
        engine,
    ));

    let app = with_loan_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan agent service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
