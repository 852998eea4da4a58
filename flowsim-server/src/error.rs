use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flowsim::SessionError;
use flowsim_core::{SimError, node::ConfigError};
use serde::Serialize;
use tracing::debug;

/// A rejected request, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError(SessionError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SessionError::Sim(SimError::NodeNotFound(_)) | SessionError::SessionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            SessionError::Sim(_) => StatusCode::BAD_REQUEST,
            SessionError::Stopped(_) => StatusCode::GONE,
            SessionError::NotStarted(_) | SessionError::AlreadyRunning(_) => StatusCode::CONFLICT,
            SessionError::SessionLimitReached { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        Self(error)
    }
}

impl From<SimError> for ApiError {
    fn from(error: SimError) -> Self {
        Self(SessionError::Sim(error))
    }
}

impl From<ConfigError> for ApiError {
    fn from(error: ConfigError) -> Self {
        Self::from(SimError::InvalidConfig(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = status.as_u16(), error = %self.0, "request rejected");
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
