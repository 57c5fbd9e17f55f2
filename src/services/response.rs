//! HTTP response building helpers
//!
//! Provides a consistent API for building HTTP responses across all handlers.
//! Reduces boilerplate and ensures consistent error formatting: every failure
//! becomes a JSON `{"error": ...}` with a status derived from the error kind,
//! and no raw low-level error reaches the caller.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;

use crate::error::PortalError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": message }),
    )
}

/// Build a 400 Bad Request response with message
pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({ "error": message }),
    )
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

/// Convert a PortalError to an appropriate HTTP response
pub fn error_response(error: PortalError) -> Response<Full<Bytes>> {
    let (status, message) = match &error {
        PortalError::AuthRequired(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        PortalError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        PortalError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        PortalError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        PortalError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        PortalError::Json(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
        PortalError::Directory(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    };

    json_response(status, &serde_json::json!({ "error": message }))
}

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, PortalError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into an HTTP response with 201 Created
pub fn from_create_result<T: Serialize>(result: Result<T, PortalError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}
