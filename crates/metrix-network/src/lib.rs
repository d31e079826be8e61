//! # metrix-network
//!
//! 에이전트 측 네트워크 어댑터.
//! 코덱 파이프라인으로 인코딩한 배치를 HTTP 또는 gRPC로 서버에 보내고,
//! 송신 풀이 큐에서 배치를 꺼내 동시 전송 수를 제한하며 전달한다.
//!
//! ## 모듈
//!
//! - [`http_client`] — `POST /updates` 전송 (reqwest, 연결 실패만 재시도)
//! - [`grpc`] — `metrics.Metrics/Updates` 전송 (tonic, 지연 연결 채널)
//! - [`dispatcher`] — 송신 워커 풀과 종료 시 드레인
//! - [`outbound_ip`] — `X-Real-IP`에 쓸 송신 IP 감지
//! - [`proto`] — gRPC 메시지/서비스 정의 (서버 crate와 공유)

pub mod dispatcher;
pub mod grpc;
pub mod http_client;
pub mod outbound_ip;
pub mod proto;
