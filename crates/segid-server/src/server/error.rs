//! HTTP mapping of allocator errors.
//!
//! Every failure to produce an ID is reported as `500` with the error text as
//! a plain-text body, except a closed allocator, which means the process is
//! shutting down and is reported as `503` so load balancers route elsewhere.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use segid::Error;

/// An allocator error on its way to an HTTP client.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Closed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.0.to_string()).into_response()
    }
}
