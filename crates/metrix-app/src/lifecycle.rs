//! 라이프사이클 관리.
//!
//! 종료 채널 하나를 모든 작업이 구독한다. SIGINT/SIGTERM/SIGQUIT가 채널을 뒤집는다.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

/// 종료 신호 후 진행 중 작업에 주는 유예 시간
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// 종료 채널 소유자
///
/// 구독자는 `Receiver<bool>`을 받아 `true`가 되면 정리를 시작한다.
pub struct LifecycleManager {
    tx: watch::Sender<bool>,
}

impl LifecycleManager {
    /// 새 라이프사이클 관리자 생성 (실행 중 상태)
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// 종료 채널 구독
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// 모든 구독자에게 종료 알림 (구독자가 없어도 값은 남는다)
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        self.tx.send_replace(true);
    }

    /// 종료 신호 발송 여부
    pub fn is_shutting_down(&self) -> bool {
        *self.tx.borrow()
    }

    /// OS 시그널 대기 후 종료 알림
    pub async fn wait_for_signal(&self) {
        wait_os_signal().await;
        self.shutdown();
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm, mut sigquit) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(int), Ok(term), Ok(quit)) => (int, term, quit),
        (int, term, quit) => {
            let err = int.err().or(term.err()).or(quit.err());
            warn!("시그널 핸들러 등록 실패, Ctrl+C만 대기: {err:?}");
            wait_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT 수신"),
        _ = sigterm.recv() => info!("SIGTERM 수신"),
        _ = sigquit.recv() => info!("SIGQUIT 수신"),
    }
}

#[cfg(not(unix))]
async fn wait_os_signal() {
    wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C 수신"),
        Err(e) => {
            // 시그널을 받을 방법이 없으면 외부 종료에만 의존
            error!("Ctrl+C 핸들러 등록 실패: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let lm = LifecycleManager::new();
        assert!(!*lm.subscribe().borrow());
        assert!(!lm.is_shutting_down());
    }

    #[test]
    fn late_subscriber_sees_shutdown() {
        let lm = LifecycleManager::new();
        lm.shutdown();
        assert!(lm.is_shutting_down());
        assert!(*lm.subscribe().borrow());
    }

    #[tokio::test]
    async fn subscribers_observe_change() {
        let lm = LifecycleManager::new();
        let mut rx = lm.subscribe();
        let waiter = tokio::spawn(async move {
            rx.changed().await.unwrap();
            *rx.borrow()
        });
        lm.shutdown();
        assert!(waiter.await.unwrap());
    }
}
