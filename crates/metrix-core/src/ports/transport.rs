//! 메트릭 전송 포트.
//!
//! 구현: `metrix-network` crate (reqwest HTTP, tonic gRPC)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metric::Metric;

/// 배치를 서버로 전달하는 전송 어댑터
///
/// 구현체는 코덱 파이프라인(직렬화 → 암호화 → 압축 → 서명)을 적용한 뒤 전송한다.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    /// 전송 방식 이름 (로그용)
    fn name(&self) -> &'static str;

    /// 배치 하나 전송
    async fn send_batch(&self, batch: &[Metric]) -> Result<(), CoreError>;
}
