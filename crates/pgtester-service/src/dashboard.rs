use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::client::{ApiClient, FetchError};
use crate::endpoints::EndpointId;
use crate::models::ApiResponse;
use crate::shutdown::InFlightGuard;

/// Last response per endpoint, kept in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMap {
    entries: Vec<(EndpointId, ApiResponse)>,
}

impl ResponseMap {
    pub fn get(&self, endpoint: EndpointId) -> Option<&ApiResponse> {
        self.entries
            .iter()
            .find(|(id, _)| *id == endpoint)
            .map(|(_, response)| response)
    }

    /// Replace the entry for `endpoint` in place, or append a new one.
    pub fn upsert(&mut self, endpoint: EndpointId, response: ApiResponse) {
        match self.entries.iter_mut().find(|(id, _)| *id == endpoint) {
            Some((_, existing)) => *existing = response,
            None => self.entries.push((endpoint, response)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EndpointId, &ApiResponse)> {
        self.entries.iter().map(|(id, response)| (*id, response))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ResponseMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, response) in &self.entries {
            map.serialize_entry(id.as_str(), response)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardState {
    pub loading: Option<EndpointId>,
    pub responses: ResponseMap,
}

/// Triggers probe endpoints and keeps what they answered.
///
/// Cloning is cheap and every clone shares the same state. The lock is never
/// held across the network call, so any number of triggers may be in flight;
/// for a given endpoint the response that settles last is the one kept.
#[derive(Clone)]
pub struct Dashboard<C> {
    client: C,
    state: Arc<Mutex<DashboardState>>,
}

impl<C: ApiClient> Dashboard<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(DashboardState::default())),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn snapshot(&self) -> DashboardState {
        self.lock().clone()
    }

    pub fn loading(&self) -> Option<EndpointId> {
        self.lock().loading
    }

    pub fn response(&self, endpoint: EndpointId) -> Option<ApiResponse> {
        self.lock().responses.get(endpoint).cloned()
    }

    /// Mark `endpoint` as in flight.
    pub fn begin(&self, endpoint: EndpointId) {
        self.lock().loading = Some(endpoint);
    }

    /// Store the outcome of a request and clear the loading marker.
    pub fn settle(
        &self,
        endpoint: EndpointId,
        outcome: Result<ApiResponse, FetchError>,
    ) -> ApiResponse {
        let response = match outcome {
            Ok(response) => {
                debug!(endpoint = %endpoint, failed = response.is_failure(), "Probe answered");
                response
            }
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "Probe request failed");
                ApiResponse::failure(err.message())
            }
        };

        let mut state = self.lock();
        state.responses.upsert(endpoint, response.clone());
        state.loading = None;
        response
    }

    /// Trigger `endpoint` and wait for the stored response.
    ///
    /// The request runs on its own task, so dropping this future (a client
    /// disconnect or a timeout upstream) still lets it settle and clear the
    /// loading marker.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn trigger(&self, endpoint: EndpointId) -> ApiResponse {
        self.begin(endpoint);
        let dashboard = self.clone();
        let task = tokio::spawn(async move { dashboard.run(endpoint).await }.in_current_span());
        match task.await {
            Ok(response) => response,
            Err(err) => self.settle(endpoint, Err(FetchError::Message(err.to_string()))),
        }
    }

    /// Run a trigger on the runtime without waiting for it.
    ///
    /// The loading marker is set before this returns, so a page rendered right
    /// after sees the endpoint as in flight.
    pub fn spawn_trigger(&self, endpoint: EndpointId, guard: InFlightGuard) {
        self.begin(endpoint);
        let dashboard = self.clone();
        tokio::spawn(
            async move {
                let _guard = guard;
                dashboard.run(endpoint).await;
            }
            .instrument(info_span!("trigger", endpoint = %endpoint)),
        );
    }

    async fn run(&self, endpoint: EndpointId) -> ApiResponse {
        let outcome = self.client.fetch(endpoint).await;
        let response = self.settle(endpoint, outcome);
        info!(failed = response.is_failure(), "Trigger settled");
        response
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
