//! # metrix-monitor
//!
//! 에이전트 메트릭 수집기.
//! 두 수집원(런타임, 호스트)이 각자의 주기 루프에서 배치를 만들어 공유 큐에 넣는다.

pub mod collector;
pub mod host;
pub mod runtime;

pub use collector::{run_collector, spawn_collector};
pub use host::HostSource;
pub use runtime::RuntimeSource;
