use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderName, Method, StatusCode, header},
    response::Json as ResponseJson,
    routing::{get, post},
};
use serde::Deserialize;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::dashboard::DashboardState;
use crate::endpoints::{ENDPOINTS, EndpointDescriptor, EndpointId};
use crate::errors::ApiError;
use crate::models::ApiResponse;
use crate::probe::{DatabaseProbe, EnvironmentReport, ObjectReport};

#[derive(Debug, Deserialize)]
struct ProbeQuery {
    path: Option<String>,
}

fn object_response(endpoint: EndpointId, report: ObjectReport) -> ApiResponse {
    ApiResponse {
        endpoint: Some(format!("/{endpoint}")),
        result: Some(report.representation),
        type_name: Some(report.type_name),
        ..Default::default()
    }
}

fn environment_response(report: EnvironmentReport) -> ApiResponse {
    ApiResponse {
        endpoint: Some(format!("/{}", EndpointId::Info)),
        db_url: Some(report.db_url),
        env_vars: Some(report.env_vars),
        connection_params: Some(report.connection_params),
        ..Default::default()
    }
}

#[instrument(skip_all, fields(path = ?query.path))]
async fn probe<S: AppState>(
    State(state): State<S>,
    Query(query): Query<ProbeQuery>,
) -> Result<ResponseJson<ApiResponse>, ApiError> {
    let endpoint = query
        .path
        .as_deref()
        .and_then(|path| path.parse::<EndpointId>().ok())
        .ok_or(ApiError::InvalidPath)?;
    debug!(endpoint = %endpoint, "Running database probe");

    let probe = state.probe();
    let response = match endpoint {
        EndpointId::Conn => object_response(endpoint, probe.connection().await?),
        EndpointId::Cursor => object_response(endpoint, probe.cursor().await?),
        EndpointId::Info => environment_response(probe.environment().await?),
    };

    info!(endpoint = %endpoint, "Database probe succeeded");
    Ok(ResponseJson(response))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn probe_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-user-id")])
        .max_age(Duration::from_secs(86_400))
}

async fn list_endpoints() -> ResponseJson<Vec<EndpointDescriptor>> {
    ResponseJson(ENDPOINTS.to_vec())
}

async fn dashboard_state<S: AppState>(State(state): State<S>) -> ResponseJson<DashboardState> {
    ResponseJson(state.dashboard().snapshot())
}

#[instrument(skip_all, fields(endpoint = %endpoint))]
async fn trigger_endpoint<S: AppState>(
    State(state): State<S>,
    Path(endpoint): Path<String>,
) -> Result<ResponseJson<ApiResponse>, ApiError> {
    let endpoint: EndpointId = endpoint.parse()?;
    let response = state.dashboard().trigger(endpoint).await;
    Ok(ResponseJson(response))
}

pub fn create_api_v1_router<S: AppState>() -> Router<S> {
    Router::new()
        .route(
            "/probe",
            get(probe::<S>).options(preflight).layer(probe_cors()),
        )
        .route("/endpoints", get(list_endpoints))
        .route("/dashboard", get(dashboard_state::<S>))
        .route("/dashboard/{endpoint}", post(trigger_endpoint::<S>))
}
