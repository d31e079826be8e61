//! API 에러 처리.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrix_core::error::CoreError;
use serde::Serialize;
use thiserror::Error;

/// API 에러
#[derive(Debug, Error)]
pub enum ApiError {
    /// 내부 서버 오류
    #[error("내부 서버 오류: {0}")]
    Internal(String),

    /// 리소스를 찾을 수 없음
    #[error("리소스를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 잘못된 요청
    #[error("잘못된 요청: {0}")]
    BadRequest(String),

    /// 신뢰 서브넷 밖의 요청
    #[error("접근 거부: {0}")]
    Forbidden(String),
}

impl ApiError {
    /// 응답 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// 배치 경로용 변환
    ///
    /// 배치 안의 빈 ID는 "없는 리소스"가 아니라 잘못된 배치이므로 400.
    pub fn from_batch(err: CoreError) -> Self {
        match err {
            CoreError::MissingId => ApiError::BadRequest(err.to_string()),
            other => other.into(),
        }
    }
}

/// 에러 응답 본문
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// 에러 메시지
    pub error: String,
    /// HTTP 상태 코드
    pub status: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg) => msg,
        };

        let body = ErrorResponse {
            error: message,
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { .. } | CoreError::MissingId => ApiError::NotFound(message),
            CoreError::Forbidden(_) => ApiError::Forbidden(message),
            CoreError::Signature(_) | CoreError::Crypto(_) | CoreError::Compression(_) => {
                ApiError::BadRequest(message)
            }
            ref e if e.is_validation() => ApiError::BadRequest(message),
            _ => ApiError::Internal(message),
        }
    }
}
