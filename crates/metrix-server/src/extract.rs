//! 본문 디코딩 추출기.
//!
//! 수신 측 코덱 파이프라인을 axum 추출기로 감싼다.
//! - [`DecodedJson`]: 단건 경로. 압축(Content-Encoding) 해제 → 복호화 → JSON
//! - [`SignedJson`]: 배치 경로. 서명 검증을 먼저 하고 나머지는 동일
//!
//! 서명 검증은 본문을 읽은 직후, 다른 어떤 처리보다 먼저 수행된다.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_ENCODING;
use axum::http::HeaderMap;
use metrix_codec::SIGNATURE_HEADER;
use metrix_core::error::CoreError;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// 압축/암호화가 풀린 JSON 본문
#[derive(Debug)]
pub struct DecodedJson<T>(pub T);

/// 서명 검증을 거친 JSON 본문
#[derive(Debug)]
pub struct SignedJson<T>(pub T);

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|enc| enc.trim().eq_ignore_ascii_case("gzip")))
}

async fn read_body(req: Request, state: &AppState) -> Result<Bytes, ApiError> {
    Bytes::from_request(req, state)
        .await
        .map_err(|e| ApiError::BadRequest(format!("본문 읽기 실패: {e}")))
}

fn parse_json<T: DeserializeOwned>(state: &AppState, body: &[u8], gzip: bool) -> Result<T, CoreError> {
    let bytes = state.decoder.unwrap_payload(body, gzip)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl<T> FromRequest<AppState> for DecodedJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let gzip = is_gzip(req.headers());
        let body = read_body(req, state).await?;

        parse_json(state, &body, gzip).map(Self).map_err(|e| {
            warn!("본문 디코딩 실패: {e}");
            ApiError::BadRequest(e.to_string())
        })
    }
}

impl<T> FromRequest<AppState> for SignedJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let gzip = is_gzip(req.headers());
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = read_body(req, state).await?;

        if let Err(e) = state.decoder.verify(&body, signature.as_deref()) {
            warn!("배치 서명 거부: {e}");
            return Err(ApiError::BadRequest(e.to_string()));
        }

        parse_json(state, &body, gzip).map(Self).map_err(|e| {
            warn!("배치 디코딩 실패: {e}");
            ApiError::BadRequest(e.to_string())
        })
    }
}
