use axum::{
    Router,
    extract::{Path, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use tracing::{info, instrument};

use crate::AppState;
use crate::endpoints::EndpointId;
use crate::errors::ApiError;
use crate::render::render_dashboard;

async fn dashboard_page<S: AppState>(State(state): State<S>) -> Html<String> {
    Html(render_dashboard(&state.dashboard().snapshot()))
}

/// Start a trigger and send the browser back to the page, which shows the
/// card as loading until the probe answers.
#[instrument(skip_all, fields(endpoint = %endpoint))]
async fn trigger<S: AppState>(
    State(state): State<S>,
    Path(endpoint): Path<String>,
) -> Result<Redirect, ApiError> {
    let endpoint: EndpointId = endpoint.parse()?;
    state
        .dashboard()
        .spawn_trigger(endpoint, state.shutdown().track());
    info!("Trigger started");
    Ok(Redirect::to("/web"))
}

pub fn create_web_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/", get(dashboard_page::<S>))
        .route("/trigger/{endpoint}", post(trigger::<S>))
}
