//! # metrix-codec
//!
//! 배치를 전송 바이트로, 전송 바이트를 배치로 바꾸는 코덱 파이프라인.
//! 에이전트와 서버, HTTP와 gRPC가 모두 같은 단계 순서를 공유한다.
//!
//! 인코딩: JSON 직렬화 → (선택) 하이브리드 암호화 → gzip → (선택) HMAC-SHA256 서명
//!
//! 디코딩: 서명 검증 → gzip 해제 → (선택) 복호화 → JSON 역직렬화
//!
//! - [`compression`] — gzip 단계 (`Compressor` 포트 구현)
//! - [`signer`] — HMAC-SHA256 서명/검증
//! - [`crypto`] — RSA-OAEP + AES-256-GCM 하이브리드 암호화
//! - [`pipeline`] — 단계 조합 (`PayloadEncoder`, `PayloadDecoder`)

pub mod compression;
pub mod crypto;
pub mod pipeline;
pub mod signer;

pub use pipeline::{Envelope, PayloadDecoder, PayloadEncoder};

/// 서명 헤더 이름 (HTTP)
pub const SIGNATURE_HEADER: &str = "HashSHA256";

/// 서명 메타데이터 키 (gRPC, 소문자 필수)
pub const SIGNATURE_METADATA_KEY: &str = "hashsha256";

/// 송신 IP 헤더 이름 (HTTP)
pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// 송신 IP 메타데이터 키 (gRPC)
pub const REAL_IP_METADATA_KEY: &str = "x-real-ip";
