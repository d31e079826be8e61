//! Proto 메시지 및 gRPC 클라이언트/서버 정의
//!
//! `proto/metrics.proto`에서 생성된 코드를 포함합니다.
//! 생성 코드(`generated/`)는 저장소에 커밋되며 빌드 시 protoc가 필요하지 않습니다.

/// 메트릭 수집 서비스 (`metrics.Metrics/Updates`)
pub mod metrics {
    #![allow(clippy::all)]
    #![allow(warnings)]
    include!("generated/metrics.rs");
}
