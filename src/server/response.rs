// src/server/response.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::site::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("Site not found")]
    NotFound,

    #[error("Not found")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Storage error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Failed to read index file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode metrics: {0}")]
    Metrics(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Persistence(_) | ApiError::Io(_) | ApiError::Metrics(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Every error leaves as `{"error": "..."}` with the matching status.
impl From<ApiError> for Response<Body> {
    fn from(err: ApiError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        json_response(status, &json!({ "error": err.to_string() }))
    }
}

pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            );
            response
        }
        Err(e) => {
            error!("Failed to encode response body: {}", e);
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn body_response(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
