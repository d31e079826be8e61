//! 조회 핸들러.

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use metrix_core::models::metric::{Metric, MetricKind};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::DecodedJson;
use crate::AppState;

/// 조회 요청 본문
#[derive(Debug, Deserialize)]
pub struct ValueRequest {
    /// 메트릭 ID
    #[serde(default)]
    pub id: String,
    /// 종류 (주어지면 저장된 종류와 같아야 함)
    #[serde(default, rename = "type")]
    pub kind: Option<MetricKind>,
}

/// JSON 조회
///
/// POST /value
pub async fn value_json(
    State(state): State<AppState>,
    DecodedJson(request): DecodedJson<ValueRequest>,
) -> Result<Json<Metric>, ApiError> {
    let metric = state.service.get(&request.id).await?;
    if request.kind.is_some_and(|kind| kind != metric.kind) {
        return Err(ApiError::NotFound(format!("종류가 다른 메트릭: {}", request.id)));
    }
    Ok(Json(metric))
}

/// 평문 조회
///
/// GET /value/{kind}/{id}
pub async fn value_path(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let metric = state.service.get(&id).await?;
    if metric.kind != kind {
        return Err(ApiError::NotFound(format!("{kind} 메트릭 아님: {id}")));
    }

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        metric.display_value(),
    ))
}
