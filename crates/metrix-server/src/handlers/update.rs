//! 갱신 핸들러.
//!
//! - `POST /update` 단건 JSON (선택적 gzip/암호화)
//! - `POST /update/{kind}/{id}/{value}` 레거시 경로 (디코딩/서명 없음, 빈 본문 + 상태 코드)
//! - `POST /updates` 배치 (서명 → 해제 → 복호화)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use metrix_core::models::metric::Metric;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::extract::{DecodedJson, SignedJson};
use crate::AppState;

/// 단건 갱신
///
/// POST /update
pub async fn update_json(
    State(state): State<AppState>,
    DecodedJson(metric): DecodedJson<Metric>,
) -> Result<Json<Metric>, ApiError> {
    let stored = state.service.upsert_one(&metric).await?;
    debug!(id = %stored.id, "단건 갱신");
    Ok(Json(stored))
}

/// ID 없는 경로
///
/// POST /update/{kind}
pub async fn update_kind_only(Path(kind): Path<String>) -> StatusCode {
    debug!("ID 없는 갱신 요청: {kind}");
    StatusCode::NOT_FOUND
}

/// 값 없는 경로
///
/// POST /update/{kind}/{id}
pub async fn update_no_value(Path((kind, id)): Path<(String, String)>) -> StatusCode {
    debug!("값 없는 갱신 요청: {kind}/{id}");
    StatusCode::BAD_REQUEST
}

/// 레거시 경로 갱신
///
/// POST /update/{kind}/{id}/{value}
pub async fn update_path(
    State(state): State<AppState>,
    Path((kind, id, value)): Path<(String, String, String)>,
) -> StatusCode {
    let result = match Metric::from_path(&kind, &id, &value) {
        Ok(metric) => state.service.upsert_one(&metric).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            let status = ApiError::from(e).status();
            warn!("레거시 갱신 실패 {kind}/{id}/{value}: {status}");
            status
        }
    }
}

/// 배치 갱신
///
/// POST /updates
pub async fn update_batch(
    State(state): State<AppState>,
    SignedJson(metrics): SignedJson<Vec<Metric>>,
) -> Result<StatusCode, ApiError> {
    let count = metrics.len();
    state
        .service
        .upsert_batch(&metrics)
        .await
        .map_err(ApiError::from_batch)?;
    debug!(count, "배치 갱신");
    Ok(StatusCode::OK)
}
