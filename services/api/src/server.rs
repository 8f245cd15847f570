use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryNotificationPublisher, InMemoryRecordStore};
use crate::routes::with_dss_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use health_dss::config::AppConfig;
use health_dss::dss::{DecisionSupportService, DssPipeline};
use health_dss::error::AppError;
use health_dss::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryRecordStore::default());
    let notifier = Arc::new(InMemoryNotificationPublisher::default());
    let service = Arc::new(DecisionSupportService::with_pipeline(
        store,
        notifier,
        DssPipeline::standard(),
        config.engine.clone(),
    ));

    let app = with_dss_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "school health decision support ready");

    axum::serve(listener, app).await?;
    Ok(())
}
