//! Request metrics and error reporting middleware
//!
//! Handlers return [`ApiError`]s, which attach an [`ErrorReport`] to their
//! response. `handle_errors` is the one place that turns those reports into
//! metrics and, in debug mode, a detailed response body.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use crate::error::{ApiError, ErrorReport};
use crate::metrics::{method_label, Metrics, UNMATCHED_ROUTE};
use crate::AppState;

/// Route template if matched, else [`UNMATCHED_ROUTE`]
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str())
        .unwrap_or(UNMATCHED_ROUTE)
        .to_string()
}

/// Count requests and time them
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = method_label(request.method().as_str());
    let path = route_label(&request);
    metrics.record_request(method, &path);

    let started = Instant::now();
    let response = next.run(request).await;
    metrics.observe_request_time(method, &path, started.elapsed().as_secs_f64());

    response
}

/// Count failures once per request and render debug details
pub async fn handle_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let metric_method = method_label(&method);
    let path = route_label(&request);
    let uri_path = request.uri().path().to_string();
    let params = request.uri().query().unwrap_or_default().to_string();

    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        state
            .metrics
            .record_success(metric_method, &path, response.status().as_u16());
        return response;
    };

    state
        .metrics
        .record_error(metric_method, &path, report.kind, report.status.as_u16());

    if report.status.is_server_error() {
        error!(
            method = %method,
            path = %uri_path,
            error_type = report.kind,
            status = report.status.as_u16(),
            "Request failed: {}",
            report.message
        );
    } else {
        warn!(
            method = %method,
            path = %uri_path,
            error_type = report.kind,
            status = report.status.as_u16(),
            "Request rejected: {}",
            report.message
        );
    }

    if !state.debug {
        return response;
    }

    let body = Json(json!({
        "error": report.message,
        "error_type": report.kind,
        "path": uri_path,
        "params": params,
        "trace": report.trace,
    }));
    (report.status, body).into_response()
}

/// Turn a handler panic into a 500 carrying an [`ErrorReport`]
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_panic_becomes_internal_error() {
        let response = handle_panic(Box::new("index out of bounds"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.kind, "Internal");
        assert!(report.message.contains("index out of bounds"));
    }

    #[test]
    fn test_unrouted_requests_share_one_label() {
        let first = Request::builder()
            .uri("/api/v1/scenarios/17/unknown")
            .body(axum::body::Body::empty())
            .unwrap();
        let second = Request::builder()
            .uri("/wp-admin/setup.php")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(route_label(&first), UNMATCHED_ROUTE);
        assert_eq!(route_label(&second), UNMATCHED_ROUTE);
    }
}
