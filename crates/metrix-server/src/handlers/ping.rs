//! 저장소 생존 확인 핸들러.

use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::AppState;

/// GET /ping
pub async fn ping(State(state): State<AppState>) -> StatusCode {
    match state.service.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!("저장소 ping 실패: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
