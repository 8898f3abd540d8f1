//! API error types.
//!
//! Every error is rendered as `{"errors": [..]}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jobnode_core::{StoreError, ValidationErrors};
use jobnode_pipeline::PipelineError;
use jobnode_scheduler::SchedulerError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The submitted job definition was rejected.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// The request body could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Body shared by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Store(_) | Self::Pipeline(_) | Self::Scheduler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation(errors) => errors.messages().to_vec(),
            other => vec![other.to_string()],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && !matches!(self, Self::Validation(_)) {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            errors: self.messages(),
        };
        (status, Json(body)).into_response()
    }
}
