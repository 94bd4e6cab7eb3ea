//! Relay error taxonomy and its HTTP mapping

use crate::core::client::{RelayCallError, UpstreamError};
use crate::core::constants::{cors, message};
use crate::models::relay::ErrorResponse;
use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{}", message::MISSING_API_KEY)]
    MissingCredential,

    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(Method),

    #[error("{}", message::MISSING_PROMPT)]
    MissingPrompt,

    #[error("AI service error: {status} - {detail}")]
    Upstream { status: u16, detail: String },

    #[error("AI connection failed: {0}")]
    Connection(String),

    #[error("{}", message::INVALID_RESPONSE)]
    InvalidResponse,
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::MissingPrompt => StatusCode::BAD_REQUEST,
            RelayError::MissingCredential
            | RelayError::Upstream { .. }
            | RelayError::Connection(_)
            | RelayError::InvalidResponse => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RelayCallError> for RelayError {
    fn from(err: RelayCallError) -> Self {
        match err {
            RelayCallError::Rejected(UpstreamError::Status { status, detail }) => {
                RelayError::Upstream { status, detail }
            }
            RelayCallError::Rejected(last) | RelayCallError::Exhausted { last, .. } => {
                RelayError::Connection(last.to_string())
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut response = match self {
            RelayError::MethodNotAllowed(_) => {
                let mut response = (status, self.to_string()).into_response();
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("POST"));
                response
            }
            other => (
                status,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        };

        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(cors::ALLOW_ORIGIN),
        );
        response
    }
}
