//! gRPC 클라이언트 모듈
//!
//! 서버의 `metrics.Metrics/Updates`로 배치를 보내는 전송 어댑터.
//! 채널은 첫 전송 시점에 한 번만 연결되고 이후 모든 전송이 공유한다.

mod client;
mod error_mapping;

pub use client::GrpcTransport;
pub use error_mapping::map_grpc_status_error;
