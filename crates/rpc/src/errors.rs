use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shepherd_files::{FetchError, LocateError};
use shepherd_names::AliasError;
use shepherd_types::PathError;
use thiserror::Error;

/// Every way a gateway request can fail.
///
/// Input problems are the caller's fault and map to 400. Everything else maps
/// to 500 with an empty body.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl GatewayError {
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingParameter(_) | GatewayError::InvalidPath(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        if self.is_input() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
