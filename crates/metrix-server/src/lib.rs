//! # metrix-server
//!
//! 메트릭 수집 서버.
//! Axum 기반 HTTP 수집/조회 API와 tonic 기반 gRPC 수집 서비스가 같은 수집 서비스를 공유한다.
//!
//! ## 구성
//! - [`service`] — 검증 + 재시도가 포함된 수집 서비스
//! - [`routes`] — HTTP 라우트 (신뢰 서브넷 → 서명 → 해제 → 복호화 가드)
//! - [`grpc`] — gRPC 서비스 (같은 순서의 인터셉터/가드)
//! - [`subnet`] — 신뢰 서브넷 검사

pub mod error;
pub mod extract;
pub mod grpc;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod signing;
pub mod subnet;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use metrix_codec::crypto::HybridDecryptor;
use metrix_codec::signer::Signer;
use metrix_codec::PayloadDecoder;
use metrix_core::config::ServerConfig;
use metrix_core::error::CoreError;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use service::{IngestionService, RetryPolicy};
pub use subnet::TrustedSubnet;

/// 서버 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    /// 수집 서비스
    pub service: Arc<IngestionService>,
    /// 수신 측 코덱 파이프라인
    pub decoder: Arc<PayloadDecoder>,
    /// 신뢰 서브넷 (None이면 검사 안 함)
    pub subnet: Option<TrustedSubnet>,
}

impl AppState {
    /// 새 상태 생성
    pub fn new(
        service: Arc<IngestionService>,
        decoder: PayloadDecoder,
        subnet: Option<TrustedSubnet>,
    ) -> Self {
        Self {
            service,
            decoder: Arc::new(decoder),
            subnet,
        }
    }
}

/// 설정으로부터 수신 측 디코더 구성
///
/// 서명 키가 비어 있으면 서명 검증, 개인키 경로가 없으면 복호화를 생략한다.
pub fn build_decoder(config: &ServerConfig) -> Result<PayloadDecoder, CoreError> {
    let mut decoder = PayloadDecoder::new();
    if let Some(signer) = Signer::from_optional(config.sign_key.as_deref())? {
        decoder = decoder.with_signer(signer);
    }
    if let Some(path) = &config.crypto_key {
        decoder = decoder.with_decryptor(HybridDecryptor::from_pem_file(path)?);
        info!("본문 복호화 활성화: {}", path.display());
    }
    Ok(decoder)
}

/// 주소 문자열 해석 (`localhost:8080` 등)
pub async fn resolve_addr(address: &str) -> Result<SocketAddr, CoreError> {
    tokio::net::lookup_host(address)
        .await
        .map_err(|e| CoreError::Config(format!("주소 해석 실패 {address}: {e}")))?
        .next()
        .ok_or_else(|| CoreError::Config(format!("주소 해석 결과 없음: {address}")))
}

/// HTTP 수집 서버
pub struct HttpServer {
    address: String,
    state: AppState,
}

impl HttpServer {
    /// 새 HTTP 서버 생성
    pub fn new(address: impl Into<String>, state: AppState) -> Self {
        Self {
            address: address.into(),
            state,
        }
    }

    /// 라우터 구성
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// 주소에 바인드하고 종료 신호까지 실행
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(&self.address).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// 이미 바인드된 리스너로 실행
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), std::io::Error> {
        let app = self.router();
        info!("HTTP 서버 시작: http://{}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                loop {
                    if *shutdown_rx.borrow() {
                        info!("HTTP 서버 종료 신호 수신");
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await?;

        info!("HTTP 서버 종료");
        Ok(())
    }
}
