//! SQLite 저장소 어댑터.
//!
//! `MetricStorage` + `Liveness` 포트 구현.
//!
//! # 모듈 구조
//! - `metrics`: 메트릭 upsert/조회 (MetricStorage 포트)

mod metrics;

use async_trait::async_trait;
use metrix_core::error::CoreError;
use metrix_core::ports::storage::Liveness;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::migration;

/// SQLite 저장소 — `MetricStorage` + `Liveness` 포트 구현
///
/// 원자성은 프로세스 내 잠금이 아니라 `ON CONFLICT` upsert와 배치 단위 트랜잭션이 보장한다.
/// 연결 자체는 rusqlite `Connection`이 `Sync`가 아니므로 `Mutex`로 감싼다.
pub struct SqliteStorage {
    pub(super) conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// DSN으로 열기 (`:memory:`면 인메모리)
    pub fn open_dsn(dsn: &str) -> Result<Self, CoreError> {
        if dsn == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(Path::new(dsn))
        }
    }

    /// 파일 기반 SQLite 저장소 생성
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|e| classify("SQLite 열기", e))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
            ",
        )
        .map_err(|e| classify("PRAGMA 설정", e))?;

        migration::run_migrations(&conn).map_err(|e| classify("마이그레이션", e))?;

        info!("SQLite 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 인메모리 SQLite 저장소 생성
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(|e| classify("인메모리 SQLite 생성", e))?;

        migration::run_migrations(&conn).map_err(|e| classify("마이그레이션", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(super) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }
}

#[async_trait]
impl Liveness for SqliteStorage {
    async fn ping(&self) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| classify("ping", e))?;
        Ok(())
    }
}

/// rusqlite 에러를 코어 에러로 분류
///
/// 잠김/사용 중/열기 실패는 연결 수준 문제로 보고 재시도 대상으로 분류한다.
pub(crate) fn classify(action: &str, e: rusqlite::Error) -> CoreError {
    let transient = matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen)
    );
    let message = format!("{action} 실패: {e}");
    if transient {
        CoreError::TransientStorage(message)
    } else {
        CoreError::Storage(message)
    }
}
