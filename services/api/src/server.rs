use crate::cli::ServeArgs;
use crate::infra::{build_backend, seed_demo_roster, AppState};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use cleaning_ops::config::AppConfig;
use cleaning_ops::error::AppError;
use cleaning_ops::telemetry;
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
    if args.no_seed {
        config.scheduling.seed_demo_data = false;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = build_backend(&config.scheduling);
    if config.scheduling.seed_demo_data {
        let roster = seed_demo_roster(&backend)?;
        info!(
            cleaners = roster.cleaners.len(),
            clients = roster.clients.len(),
            "demo roster loaded"
        );
    } else {
        warn!("starting with an empty roster; no session will resolve until users are issued");
    }

    let app = with_platform_routes(backend.service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        role_source = ?config.scheduling.role_source,
        "cleaning scheduler ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
