use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDocuments, InMemoryNotifications, InMemoryProfitStore};
use crate::routes::with_profit_sharing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use profit_share::config::AppConfig;
use profit_share::error::AppError;
use profit_share::telemetry;
use profit_share::workflows::profit_sharing::ProfitSharingService;
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

    let store = Arc::new(InMemoryProfitStore::from_data_dir(&config.data)?);
    let notifications = Arc::new(InMemoryNotifications::default());
    let documents = Arc::new(InMemoryDocuments::default());
    let service = Arc::new(ProfitSharingService::new(store, notifications, documents));

    let app = with_profit_sharing_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "profit sharing service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
