//! 라우트 정의.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::signing::sign_response;
use crate::subnet::require_trusted_subnet;
use crate::AppState;

/// 수집 라우트
///
/// 신뢰 서브넷 검사는 레거시 경로를 포함한 모든 수집 경로에 적용된다.
/// 응답 압축은 단건 경로에만 건다. `/updates` 응답은 서명된 원문 그대로 나가야 한다.
pub fn ingestion_routes(state: AppState) -> Router<AppState> {
    let single = Router::new()
        .route("/update", post(handlers::update::update_json))
        .route("/update/{kind}", post(handlers::update::update_kind_only))
        .route("/update/{kind}/{id}", post(handlers::update::update_no_value))
        .route(
            "/update/{kind}/{id}/{value}",
            post(handlers::update::update_path),
        )
        .layer(CompressionLayer::new());

    Router::new()
        .merge(single)
        .route(
            "/updates",
            post(handlers::update::update_batch)
                .layer(middleware::from_fn_with_state(state.clone(), sign_response)),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            require_trusted_subnet,
        ))
}

/// 조회 라우트
///
/// `Accept-Encoding: gzip` 요청에는 응답을 gzip으로 압축한다.
pub fn query_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::page::metrics_page))
        .route("/ping", get(handlers::ping::ping))
        .route("/value", post(handlers::value::value_json))
        .route("/value/{kind}/{id}", get(handlers::value::value_path))
        .layer(CompressionLayer::new())
}

/// 전체 라우터
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(ingestion_routes(state.clone()))
        .merge(query_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
