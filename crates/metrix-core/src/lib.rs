//! # metrix-core
//!
//! METRIX 도메인 모델, 포트(trait) 정의, 에러 타입, 설정.
//! 에이전트와 서버의 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 메트릭/배치 데이터 구조체 (serde Serialize/Deserialize)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 에이전트/서버 설정 구조체와 계층 병합 (기본값 → JSON → 플래그 → 환경변수)

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
