use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::ControllerError;
use crate::forecast::AggregationError;
use crate::optimizer::{OptimizerError, SolveStatus};

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Optimization failed with solver status {status}")]
    OptimizationFailed { status: SolveStatus },
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) | ApiError::OptimizationFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::InternalError(_) => "InternalServerError",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
            ApiError::OptimizationFailed { .. } => "OptimizationFailed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let (message, details) = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                ("An internal error occurred".to_string(), None)
            }
            ApiError::OptimizationFailed { status } => {
                tracing::error!(error = %self, "API error occurred");
                (
                    "Dispatch optimization did not find a solution".to_string(),
                    Some(status.to_string()),
                )
            }
            ApiError::ServiceUnavailable(_) => {
                tracing::warn!(error = %self, "Service unavailable");
                (self.to_string(), None)
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                (self.to_string(), None)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<OptimizerError> for ApiError {
    fn from(error: OptimizerError) -> Self {
        match error {
            OptimizerError::InvalidBatteryParameter(_) | OptimizerError::InputDataMisalignment(_) => {
                ApiError::BadRequest(error.to_string())
            }
            OptimizerError::OptimizationFailed { status } => ApiError::OptimizationFailed { status },
            OptimizerError::InvalidSettings(msg) => ApiError::InternalError(msg),
            OptimizerError::SolverUnavailable(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<AggregationError> for ApiError {
    fn from(error: AggregationError) -> Self {
        match error {
            AggregationError::MissingSeries(_) => ApiError::NotFound(error.to_string()),
            AggregationError::Misaligned(_) => ApiError::BadRequest(error.to_string()),
            AggregationError::Store(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<ControllerError> for ApiError {
    fn from(error: ControllerError) -> Self {
        match error {
            ControllerError::BatteryNotFound(_) => ApiError::NotFound(error.to_string()),
            ControllerError::Battery(_) => ApiError::BadRequest(error.to_string()),
            ControllerError::Optimizer(e) => e.into(),
            ControllerError::Aggregation(e) => e.into(),
            ControllerError::Join(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}
