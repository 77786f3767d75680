use axum::Router;

pub mod client;
pub mod config;
pub mod dashboard;
pub mod endpoints;
pub mod errors;
pub mod models;
pub mod probe;
pub mod render;
pub mod routes;
pub mod shutdown;

use client::{ApiClient, HttpApiClient};
use dashboard::Dashboard;
use probe::{DatabaseProbe, PgDatabaseProbe};
use shutdown::ShutdownState;

/// Everything a handler can reach.
pub trait AppState: Clone + Send + Sync + 'static {
    type Probe: DatabaseProbe;
    type Client: ApiClient;

    fn probe(&self) -> Self::Probe;
    fn dashboard(&self) -> Dashboard<Self::Client>;
    fn shutdown(&self) -> ShutdownState;
}

/// State wiring the dashboard to an HTTP backend and the probe to PostgreSQL.
#[derive(Clone)]
pub struct DefaultAppState {
    probe: PgDatabaseProbe,
    dashboard: Dashboard<HttpApiClient>,
    shutdown: ShutdownState,
}

impl DefaultAppState {
    pub fn new(probe: PgDatabaseProbe, client: HttpApiClient, shutdown: ShutdownState) -> Self {
        Self {
            probe,
            dashboard: Dashboard::new(client),
            shutdown,
        }
    }
}

impl AppState for DefaultAppState {
    type Probe = PgDatabaseProbe;
    type Client = HttpApiClient;

    fn probe(&self) -> Self::Probe {
        self.probe.clone()
    }

    fn dashboard(&self) -> Dashboard<Self::Client> {
        self.dashboard.clone()
    }

    fn shutdown(&self) -> ShutdownState {
        self.shutdown.clone()
    }
}

pub fn create_app<S: AppState>(state: S) -> Router {
    routes::create_router().with_state(state)
}
