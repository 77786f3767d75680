#![allow(dead_code)]

use async_trait::async_trait;
use pgtester_service::{
    AppState,
    client::{ApiClient, FetchError},
    dashboard::Dashboard,
    endpoints::EndpointId,
    models::ApiResponse,
    probe::{DatabaseProbe, EnvironmentReport, ObjectReport, ProbeError},
    shutdown::ShutdownState,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub const CONN_REPR: &str =
    "<PgConnection object; dsn: 'user=app dbname=app host=db port=5432', closed: 0>";
pub const CURSOR_REPR: &str = "<PgCursor object; name: 'pgtester_probe', query: 'SELECT 1', closed: 0>";

pub fn result(text: &str) -> ApiResponse {
    ApiResponse {
        result: Some(text.to_string()),
        ..Default::default()
    }
}

pub fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Probe answering from canned data, or failing every call.
#[derive(Clone, Default)]
pub struct StubProbe {
    failing: bool,
}

impl StubProbe {
    pub fn failing() -> Self {
        Self { failing: true }
    }
}

#[async_trait]
impl DatabaseProbe for StubProbe {
    async fn connection(&self) -> Result<ObjectReport, ProbeError> {
        if self.failing {
            return Err(ProbeError::MissingDatabaseUrl);
        }
        Ok(ObjectReport {
            representation: CONN_REPR.to_string(),
            type_name: "PgConnection".to_string(),
        })
    }

    async fn cursor(&self) -> Result<ObjectReport, ProbeError> {
        if self.failing {
            return Err(ProbeError::MissingDatabaseUrl);
        }
        Ok(ObjectReport {
            representation: CURSOR_REPR.to_string(),
            type_name: "PgCursor".to_string(),
        })
    }

    async fn environment(&self) -> Result<EnvironmentReport, ProbeError> {
        if self.failing {
            return Err(ProbeError::MissingDatabaseUrl);
        }
        Ok(EnvironmentReport {
            db_url: "postgres://app:***@db:5432/app".to_string(),
            env_vars: string_map(&[("PGHOST", "db"), ("PGPORT", "5432")]),
            connection_params: string_map(&[
                ("dbname", "app"),
                ("host", "db"),
                ("port", "5432"),
                ("user", "app"),
            ]),
        })
    }
}

/// Client answering each endpoint with a fixed outcome. `Err` holds the
/// failure description.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    outcomes: Arc<BTreeMap<EndpointId, Result<ApiResponse, String>>>,
}

impl ScriptedClient {
    pub fn new(outcomes: Vec<(EndpointId, Result<ApiResponse, String>)>) -> Self {
        Self {
            outcomes: Arc::new(outcomes.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ApiClient for ScriptedClient {
    async fn fetch(&self, endpoint: EndpointId) -> Result<ApiResponse, FetchError> {
        match self.outcomes.get(&endpoint) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(FetchError::Message(message.clone())),
            None => Err(FetchError::Message("no scripted outcome".to_string())),
        }
    }
}

type Gate = oneshot::Sender<Result<ApiResponse, FetchError>>;

/// Client whose calls stay pending until the test releases them, so the
/// order in which requests settle is under the test's control.
#[derive(Clone, Default)]
pub struct GatedClient {
    calls: Arc<Mutex<Vec<(EndpointId, Option<Gate>)>>>,
}

impl GatedClient {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn endpoint_of(&self, call: usize) -> EndpointId {
        self.calls.lock().unwrap()[call].0
    }

    /// Wait until at least `count` calls have been issued.
    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.call_count() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("calls were not issued in time");
    }

    /// Settle the `call`-th request (0-based, in issue order).
    pub fn release(&self, call: usize, outcome: Result<ApiResponse, FetchError>) {
        let gate = self.calls.lock().unwrap()[call]
            .1
            .take()
            .expect("call already released");
        let _ = gate.send(outcome);
    }
}

#[async_trait]
impl ApiClient for GatedClient {
    async fn fetch(&self, endpoint: EndpointId) -> Result<ApiResponse, FetchError> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push((endpoint, Some(tx)));
        rx.await
            .unwrap_or_else(|_| Err(FetchError::Message("gate dropped".to_string())))
    }
}

#[derive(Clone)]
pub struct TestState<C> {
    pub probe: StubProbe,
    pub dashboard: Dashboard<C>,
    pub shutdown: ShutdownState,
}

impl<C: ApiClient> TestState<C> {
    pub fn new(probe: StubProbe, client: C) -> Self {
        Self {
            probe,
            dashboard: Dashboard::new(client),
            shutdown: ShutdownState::new(),
        }
    }
}

impl<C: ApiClient> AppState for TestState<C> {
    type Probe = StubProbe;
    type Client = C;

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

/// Wait until the dashboard has nothing in flight.
pub async fn wait_until_idle<C: ApiClient>(dashboard: &Dashboard<C>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while dashboard.loading().is_some() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("dashboard did not settle in time");
}

pub mod server_utils {
    use super::*;
    use axum_test::TestServer;
    use pgtester_service::create_app;

    pub fn create_test_server<C: ApiClient>(
        probe: StubProbe,
        client: C,
    ) -> (TestServer, TestState<C>) {
        let state = TestState::new(probe, client);
        let server = TestServer::new(create_app(state.clone())).unwrap();
        (server, state)
    }
}
