use crate::cli::ServeArgs;
use crate::infra::{build_gateway, build_orchestrator, AppState};
use crate::routes::with_submission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use stage_eval::config::AppConfig;
use stage_eval::error::AppError;
use stage_eval::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let catalog = config.workflow.catalog()?;
    if args.in_memory {
        warn!("serving against an in-memory backend; submissions are not persisted");
    }
    let gateway = build_gateway(&config.backend, args.in_memory)?;
    let orchestrator = Arc::new(build_orchestrator(&config, gateway, catalog, None));

    let app = with_submission_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend = %config.backend.base_url,
        "stage evaluation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
