use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::endpoints::{EndpointId, EndpointParseError};
use crate::probe::ProbeError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A `path` the probe function does not serve.
    #[error("Invalid path")]
    InvalidPath,

    #[error(transparent)]
    UnknownEndpoint(#[from] EndpointParseError),

    #[error("Probe failed: {0}")]
    ProbeFailed(#[from] ProbeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidPath => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": self.to_string(),
                    "available_paths": EndpointId::ALL,
                }),
            ),
            ApiError::UnknownEndpoint(ref err) => {
                (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
            }
            ApiError::ProbeFailed(ref err) => {
                error!(error = %err, kind = err.kind(), "Database probe failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": err.to_string(),
                        "type": err.kind(),
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
