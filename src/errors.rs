use crate::identity::AuthError;
use crate::session::SessionError;
use axum::http::StatusCode;
use tracing::debug;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountExists => StatusCode::CONFLICT,
            AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
            AuthError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::NotSignedIn => StatusCode::UNAUTHORIZED,
            SessionError::InvalidInput(input) => {
                debug!(input = %input, "rejected start date");
                StatusCode::BAD_REQUEST
            }
            SessionError::ConfirmationRequired(_) => StatusCode::PRECONDITION_REQUIRED,
        };
        Self::new(status, err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
