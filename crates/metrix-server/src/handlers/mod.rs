//! HTTP 핸들러 모듈.

pub mod page;
pub mod ping;
pub mod update;
pub mod value;
