//! Error types for fp-api
//!
//! [`ServiceError`] is the failure taxonomy of the prediction pipeline. Each
//! kind carries its own transport status so the HTTP boundary never has to
//! guess. [`ApiError`] adds the boundary-only failures (auth, path parsing)
//! and renders everything as a JSON response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Name used for the territory data service in messages and logs
pub const URBAN_API_SERVICE: &str = "Urban API";

/// Why an upstream service could not be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableKind {
    /// Connection refused, reset, DNS failure, ...
    Connection,
    /// The call exceeded its timeout budget
    Timeout,
}

impl UnavailableKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            UnavailableKind::Connection => StatusCode::SERVICE_UNAVAILABLE,
            UnavailableKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl fmt::Display for UnavailableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableKind::Connection => write!(f, "connection failed"),
            UnavailableKind::Timeout => write!(f, "timed out"),
        }
    }
}

/// Prediction pipeline failures
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No qualifying buildings, or none still missing a storey count
    #[error("No buildings with a missing storey count were found in this scenario")]
    NoBuildingsFound,

    /// Fewer valid buildings than the configured minimum
    #[error("Not enough buildings for a prediction: found {found}, at least {required} required")]
    NotEnoughBuildings { found: usize, required: usize },

    /// Category lookup did not resolve to exactly one identifier
    #[error("No unique physical object type named `{name}` found ({matches} matches)")]
    AmbiguousCategory { name: String, matches: usize },

    /// Upstream answered with a non-success status
    #[error("Error in response of external service '{service}' (status {status}): {body}")]
    UpstreamResponse {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Upstream could not be reached within its budget
    #[error("External service '{service}' is unavailable: {kind}")]
    UpstreamUnavailable {
        service: &'static str,
        kind: UnavailableKind,
    },

    /// Upstream answered 2xx with a body of the wrong shape
    #[error("Malformed response from external service '{service}': {message}")]
    UpstreamMalformed {
        service: &'static str,
        message: String,
    },

    /// Anything the collaborators raised that has no taxonomy kind
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ServiceError {
    /// Transport status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NoBuildingsFound => StatusCode::NOT_FOUND,
            ServiceError::NotEnoughBuildings { .. } => StatusCode::BAD_REQUEST,
            ServiceError::AmbiguousCategory { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::UpstreamResponse { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ServiceError::UpstreamUnavailable { kind, .. } => kind.status_code(),
            ServiceError::UpstreamMalformed { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable kind name, used as the `error_type` metric label
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NoBuildingsFound => "NoBuildingsFound",
            ServiceError::NotEnoughBuildings { .. } => "NotEnoughBuildings",
            ServiceError::AmbiguousCategory { .. } => "AmbiguousCategory",
            ServiceError::UpstreamResponse { .. } => "UpstreamResponseError",
            ServiceError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            ServiceError::UpstreamMalformed { .. } => "UpstreamMalformed",
            ServiceError::Unexpected(_) => "Unexpected",
        }
    }

    /// Shorthand for a timeout against the territory data service
    pub fn urban_api_timeout() -> Self {
        ServiceError::UpstreamUnavailable {
            service: URBAN_API_SERVICE,
            kind: UnavailableKind::Timeout,
        }
    }

    /// Shorthand for a connection failure against the territory data service
    pub fn urban_api_unreachable() -> Self {
        ServiceError::UpstreamUnavailable {
            service: URBAN_API_SERVICE,
            kind: UnavailableKind::Connection,
        }
    }

    pub fn urban_api_malformed(message: impl Into<String>) -> Self {
        ServiceError::UpstreamMalformed {
            service: URBAN_API_SERVICE,
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// HTTP boundary error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Pipeline failure, already classified
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Missing credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Service(err) => err.status_code(),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Service(err) => err.kind(),
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Internal(_) => "Internal",
        }
    }

    /// Message safe to show outside debug mode
    ///
    /// Unclassified failures may carry internal details, so they are
    /// replaced with a generic text.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Service(ServiceError::Unexpected(_)) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Error source chain, one line per entry
    ///
    /// Unclassified errors are rendered with their debug form, which includes
    /// a backtrace when one was captured.
    pub fn trace(&self) -> Vec<String> {
        if let ApiError::Service(ServiceError::Unexpected(inner)) = self {
            return format!("{:?}", inner).lines().map(str::to_string).collect();
        }

        let mut lines = Vec::new();
        let mut current: Option<&dyn std::error::Error> = Some(self);
        while let Some(err) = current {
            lines.push(err.to_string());
            current = err.source();
        }
        lines
    }
}

/// Failure details attached to an error response for the error middleware
///
/// Stored as a response extension so that metrics and debug rendering
/// happen in one place regardless of which handler failed.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub status: StatusCode,
    pub message: String,
    pub trace: Vec<String>,
}

impl ErrorReport {
    pub fn from_api_error(err: &ApiError) -> Self {
        Self {
            kind: err.kind(),
            status: err.status_code(),
            message: err.to_string(),
            trace: err.trace(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from_api_error(&self);
        let body = Json(json!({ "detail": self.public_message() }));

        let mut response = (report.status, body).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
