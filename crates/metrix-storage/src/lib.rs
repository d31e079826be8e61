//! # metrix-storage
//!
//! 메트릭 저장소 어댑터.
//! 세 백엔드가 같은 `MetricStorage` 계약(gauge 교체, counter 합산, 종류 충돌 거부)을 따른다.
//!
//! ## 모듈
//! - `memory`: 메모리 맵 저장소
//! - `file`: 변경마다 JSON 파일로 기록하는 메모리 저장소
//! - `sqlite`: SQLite 저장소 (`Liveness` 지원)
//! - `migration`: 스키마 마이그레이션

pub mod file;
pub mod memory;
mod merge;
pub mod migration;
pub mod sqlite;

use metrix_core::config::ServerConfig;
use metrix_core::error::CoreError;
use metrix_core::ports::storage::MetricStorage;
use std::sync::Arc;
use tracing::info;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// 설정에 따른 백엔드 선택
///
/// 우선순위: 파일 경로 → DSN → 메모리.
pub fn open_storage(config: &ServerConfig) -> Result<Arc<dyn MetricStorage>, CoreError> {
    if let Some(path) = &config.file_storage_path {
        info!(
            path = %path.display(),
            restore = config.restore,
            store_interval_secs = config.store_interval_secs,
            "파일 저장소 사용 (변경마다 동기 기록)"
        );
        return Ok(Arc::new(FileStorage::open(path, config.restore)?));
    }

    if let Some(dsn) = config.database_dsn.as_deref().filter(|d| !d.is_empty()) {
        info!("SQLite 저장소 사용: {dsn}");
        return Ok(Arc::new(SqliteStorage::open_dsn(dsn)?));
    }

    info!("메모리 저장소 사용");
    Ok(Arc::new(MemoryStorage::new()))
}
