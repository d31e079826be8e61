//! 응답 서명 미들웨어.
//!
//! 서명 키가 설정되어 있으면 응답 본문 전체의 HMAC을 `HashSHA256` 헤더로 붙인다.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// `HashSHA256` 헤더 이름 (HeaderMap 키는 소문자)
const SIGNATURE: HeaderName = HeaderName::from_static("hashsha256");

/// 응답 본문 서명
pub async fn sign_response(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !state.decoder.requires_signature() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("응답 본문 버퍼링 실패: {e}");
            return ApiError::Internal("응답 서명 실패".to_string()).into_response();
        }
    };

    if let Some(signature) = state.decoder.sign_response(&bytes) {
        match HeaderValue::from_str(&signature) {
            Ok(value) => {
                parts.headers.insert(SIGNATURE, value);
            }
            Err(e) => warn!("서명 헤더 생성 실패: {e}"),
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
