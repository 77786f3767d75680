use pgtester_service::{
    DefaultAppState,
    client::HttpApiClient,
    config::Config,
    probe::PgDatabaseProbe,
    routes::create_router,
    shutdown::{GracefulShutdownLayer, ShutdownState},
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pgtester_service=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().unwrap_or_else(|err| {
        error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });

    if config.database_url.is_none() {
        warn!("DATABASE_URL is not set; probes will report a configuration error");
    }
    info!(api_url = %config.api_url, "Dashboard will query probe endpoints");

    let shutdown_state = ShutdownState::new();
    let app_state = DefaultAppState::new(
        PgDatabaseProbe::new(config.database_url.clone()),
        HttpApiClient::new(config.api_url.clone()),
        shutdown_state.clone(),
    );

    let app = create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(GracefulShutdownLayer::new(shutdown_state.clone()))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .unwrap_or_else(|err| {
            error!(bind_address = %config.bind_address, error = %err, "Failed to bind to address");
            std::process::exit(1);
        });

    info!(bind_address = %config.bind_address, "Server running");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_state));

    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal(shutdown_state: ShutdownState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(
        in_flight = shutdown_state.in_flight_count(),
        "Shutdown signal received, draining requests and triggers"
    );
    let drained = shutdown_state.completed();
    shutdown_state.start_shutdown();

    drained.await;
    info!("Graceful shutdown completed");
}
