use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::coordinator::MutationError;
use crate::scheduler::{RefreshError, RefreshTriggerError};

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    fn session_closed() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "session_closed",
            "the dashboard session has been torn down",
        )
    }
}

impl From<MutationError> for ProblemResponse {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Remote(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "remote_rejected", err.to_string())
            }
            MutationError::Shortlist { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, "shortlist_failed", err.to_string())
            }
            MutationError::EmptySelection => Self::new(
                StatusCode::CONFLICT,
                "empty_selection",
                "select at least one candidate before shortlisting",
            ),
            MutationError::SessionClosed => Self::session_closed(),
        }
    }
}

impl From<RefreshError> for ProblemResponse {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::SessionClosed => Self::session_closed(),
            _ => Self::new(StatusCode::BAD_GATEWAY, "refresh_failed", err.to_string()),
        }
    }
}

impl From<RefreshTriggerError> for ProblemResponse {
    fn from(err: RefreshTriggerError) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "refresh_unavailable",
            err.to_string(),
        )
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
