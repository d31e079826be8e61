//! 로깅 초기화.
//!
//! `RUST_LOG`가 있으면 그 필터를 쓰고, 없으면 설정된 로그 레벨을 쓴다.

use tracing_subscriber::EnvFilter;

/// 로그 필터 선택
pub fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(log_level).unwrap_or_else(|e| {
            eprintln!("잘못된 로그 레벨 {log_level:?} ({e}), info 사용");
            EnvFilter::new("info")
        })
    })
}

/// 전역 구독자 설치 (이미 설치되어 있으면 무시)
pub fn init(log_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(log_level))
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init("debug");
        init("warn");
    }

    #[test]
    fn broken_level_falls_back() {
        // RUST_LOG가 설정된 환경에서도 패닉 없이 필터를 만든다
        let _ = build_filter("not a [level");
    }
}
