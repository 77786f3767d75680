use crate::AppState;
use axum::{Router, response::Redirect, routing::get};

pub mod api;
pub mod web;

async fn health() -> &'static str {
    "OK"
}

async fn index() -> Redirect {
    Redirect::to("/web")
}

pub fn create_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api", api::create_api_router())
        .nest("/web", web::create_web_router())
}
