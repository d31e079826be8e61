//! 서버 조립.
//!
//! 저장소 선택 → 수집 서비스 → 디코더/서브넷 가드 → HTTP 서버 (+ 선택적 gRPC 서버).

use std::sync::Arc;

use metrix_core::config::ServerConfig;
use metrix_core::error::CoreError;
use metrix_server::{build_decoder, grpc, resolve_addr, AppState, HttpServer, IngestionService, TrustedSubnet};
use metrix_storage::open_storage;
use tokio::sync::watch;
use tracing::info;

/// 설정으로부터 서버 상태 구성
pub fn build_state(config: &ServerConfig) -> Result<AppState, CoreError> {
    let storage = open_storage(config)?;
    let service = Arc::new(IngestionService::new(storage));
    let decoder = build_decoder(config)?;
    let subnet = TrustedSubnet::from_config(config.trusted_subnet.as_deref());
    if let Some(subnet) = &subnet {
        info!("신뢰 서브넷 검사 활성화: {subnet:?}");
    }
    Ok(AppState::new(service, decoder, subnet))
}

/// 종료 신호까지 서버 실행
///
/// 어느 한쪽 서버가 실패하면 다른 쪽도 중단하고 에러를 돌려준다.
pub async fn run(config: ServerConfig, shutdown: watch::Receiver<bool>) -> Result<(), CoreError> {
    let state = build_state(&config)?;

    if config.file_storage_path.is_some() {
        info!(
            "STORE_INTERVAL={}s 는 호환용 값 (파일 저장은 변경마다 동기 기록)",
            config.store_interval_secs
        );
    }

    let grpc_addr = match config.grpc_address.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(address) => Some(resolve_addr(address).await?),
        None => None,
    };

    let http = {
        let server = HttpServer::new(config.address.clone(), state.clone());
        let shutdown = shutdown.clone();
        async move { server.run(shutdown).await.map_err(CoreError::from) }
    };

    let rpc = async move {
        match grpc_addr {
            Some(addr) => {
                grpc::serve(
                    addr,
                    state.service.clone(),
                    state.decoder.clone(),
                    state.subnet,
                    shutdown,
                )
                .await
            }
            None => Ok(()),
        }
    };

    tokio::try_join!(http, rpc)?;
    Ok(())
}
