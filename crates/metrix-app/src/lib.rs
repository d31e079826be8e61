//! # metrix-app
//!
//! METRIX 에이전트/서버 바이너리의 공용 조립 코드.
//! CLI 인자, 로깅, 라이프사이클, 각 프로세스의 오케스트레이션.

pub mod agent;
pub mod cli;
pub mod lifecycle;
pub mod logging;
pub mod server;

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use metrix_core::error::CoreError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::lifecycle::LifecycleManager;

/// 작업이 끝나거나 시그널이 올 때까지 대기
///
/// 시그널 후 `grace`가 있으면 그만큼만 작업 종료를 기다리고, 넘기면 그대로 반환한다.
/// `None`이면 작업이 스스로 끝날 때까지 기다린다 (에이전트 드레인).
pub async fn supervise_with(
    lifecycle: &LifecycleManager,
    task: JoinHandle<Result<(), CoreError>>,
    grace: Option<Duration>,
) -> Result<()> {
    supervise_until(lifecycle.wait_for_signal(), task, grace).await
}

async fn supervise_until(
    signal: impl Future<Output = ()>,
    mut task: JoinHandle<Result<(), CoreError>>,
    grace: Option<Duration>,
) -> Result<()> {
    tokio::select! {
        joined = &mut task => return flatten(joined),
        _ = signal => {}
    }

    let Some(grace) = grace else {
        info!("작업 종료 대기 (유예 제한 없음)");
        return flatten(task.await);
    };
    match tokio::time::timeout(grace, task).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            warn!("유예 시간 {grace:?} 초과, 남은 작업을 버리고 종료");
            Ok(())
        }
    }
}

fn flatten(joined: Result<Result<(), CoreError>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => {
            info!("정상 종료");
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(anyhow!("메인 태스크 비정상 종료: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::lifecycle::SHUTDOWN_GRACE;

    /// 유예 시간보다 오래 걸리는 작업
    fn slow_task(done: Arc<AtomicBool>) -> JoinHandle<Result<(), CoreError>> {
        tokio::spawn(async move {
            tokio::time::sleep(SHUTDOWN_GRACE + Duration::from_secs(2)).await;
            done.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_wait_lets_slow_drain_finish() {
        let done = Arc::new(AtomicBool::new(false));
        supervise_until(async {}, slow_task(done.clone()), None)
            .await
            .unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_cuts_off_slow_task() {
        let done = Arc::new(AtomicBool::new(false));
        let started = tokio::time::Instant::now();
        supervise_until(async {}, slow_task(done.clone()), Some(SHUTDOWN_GRACE))
            .await
            .unwrap();
        assert!(!done.load(Ordering::SeqCst));
        assert!(started.elapsed() >= SHUTDOWN_GRACE);
        assert!(started.elapsed() < SHUTDOWN_GRACE + Duration::from_secs(2));
    }

    #[tokio::test]
    async fn task_error_is_returned_without_signal() {
        let task = tokio::spawn(async { Err(CoreError::Config("bad".to_string())) });
        let result = supervise_until(std::future::pending(), task, None).await;
        assert!(result.is_err());
    }
}
