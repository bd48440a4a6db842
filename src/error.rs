//! 에러 타입 정의

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// 세션 토큰 검증/발급 실패
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("error decoding token data: {0}")]
    Decode(String),
    #[error("token expired")]
    Expired,
    #[error("error encoding session data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 방 목록 조작 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("room name '{0}' already exists")]
    NameTaken(String),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room name is invalid")]
    InvalidName,
}

/// HTTP 경계 에러
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Encode(e) => AppError::Internal(e.to_string()),
            _ => AppError::Unauthorized,
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NameTaken(_) => AppError::Conflict(err.to_string()),
            DirectoryError::RoomNotFound(_) => AppError::NotFound(err.to_string()),
            DirectoryError::InvalidName => AppError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_faults_map_to_unauthorized() {
        for err in [
            SessionError::Malformed,
            SessionError::InvalidSignature,
            SessionError::Expired,
        ] {
            assert_eq!(AppError::from(err).status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn state_machine_faults_are_client_errors() {
        assert_eq!(
            AppError::Conflict("game already active".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::BadRequest("no active game".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn directory_faults_map_to_status() {
        assert_eq!(
            AppError::from(DirectoryError::NameTaken("crew".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(DirectoryError::RoomNotFound("7".into())).status(),
            StatusCode::NOT_FOUND
        );
    }
}
