//! 메트릭 저장소 포트.
//!
//! 구현: `metrix-storage` crate (메모리, 파일, SQLite)
//!
//! 모든 백엔드는 같은 계약을 따른다.
//! - 새 ID는 그대로 저장
//! - 같은 종류의 기존 ID는 gauge 교체, counter 합산
//! - 다른 종류의 기존 ID는 `CoreError::KindConflict`이며 저장값은 변경되지 않음
//! - 조회 결과는 저장소 내부와 분리된 복사본

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::Metric;

/// 메트릭 저장소
#[async_trait]
pub trait MetricStorage: Send + Sync {
    /// 메트릭 하나를 병합 저장하고 병합 결과를 반환
    async fn upsert(&self, metric: &Metric) -> Result<Metric, CoreError>;

    /// 메트릭 여러 개를 원자적으로 병합 저장
    ///
    /// 하나라도 실패하면 배치 전체가 적용되지 않는다.
    async fn upsert_batch(&self, metrics: &[Metric]) -> Result<(), CoreError>;

    /// ID로 조회 (없으면 `CoreError::NotFound`)
    async fn get(&self, id: &str) -> Result<Metric, CoreError>;

    /// 전체 스냅샷 조회 (순서 보장 없음)
    async fn get_all(&self) -> Result<Vec<Metric>, CoreError>;

    /// 생존 확인 기능 (지원하는 백엔드만 `Some`)
    fn liveness(&self) -> Option<&dyn Liveness> {
        None
    }
}

/// 저장소 생존 확인 기능
#[async_trait]
pub trait Liveness: Send + Sync {
    /// 연결 상태 확인
    async fn ping(&self) -> Result<(), CoreError>;
}
