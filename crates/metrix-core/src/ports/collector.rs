//! 메트릭 수집 포트.
//!
//! 구현: `metrix-monitor` crate (sysinfo)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::Batch;

/// 주기적으로 배치를 만드는 수집원
///
/// 수집원은 자기 상태(예: poll 카운터, sysinfo 핸들)를 소유하므로 `&mut self`로 호출된다.
#[async_trait]
pub trait MetricSource: Send {
    /// 수집원 이름 (로그용)
    fn name(&self) -> &'static str;

    /// 배치 하나 수집
    async fn collect(&mut self) -> Result<Batch, CoreError>;
}
