//! 배치 송신 풀.
//!
//! 고정 수의 워커가 전송 주기마다 공유 큐에서 배치를 하나씩 꺼내 전송한다.
//! 동시 전송 수는 워커 수와 무관하게 세마포어로 제한한다.
//!
//! 종료 신호를 받으면 각 워커는 주기를 무시하고 큐가 빌 때까지 남은 배치를 전송한다.
//! 생산자가 모두 멈춘 뒤에 종료 신호를 보내는 것은 호출자 몫이다.

use std::sync::Arc;
use std::time::Duration;

use metrix_core::models::metric::Batch;
use metrix_core::ports::transport::MetricsTransport;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 여러 워커가 나눠 쓰는 배치 큐 수신단
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Batch>>>;

/// 송신 풀 설정
#[derive(Debug, Clone)]
pub struct SenderPoolConfig {
    /// 워커 수
    pub workers: usize,
    /// 워커별 전송 주기
    pub report_interval: Duration,
    /// 동시 전송 상한
    pub rate_limit: usize,
}

impl Default for SenderPoolConfig {
    fn default() -> Self {
        Self {
            workers: metrix_core::config::SENDER_WORKERS,
            report_interval: Duration::from_secs(10),
            rate_limit: 100,
        }
    }
}

/// 배치 송신 풀
pub struct SenderPool {
    transport: Arc<dyn MetricsTransport>,
    config: SenderPoolConfig,
    permits: Arc<Semaphore>,
}

impl SenderPool {
    /// 새 송신 풀 생성
    pub fn new(transport: Arc<dyn MetricsTransport>, config: SenderPoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.rate_limit.max(1)));
        Self {
            transport,
            config,
            permits,
        }
    }

    /// 워커 시작
    ///
    /// 반환된 핸들을 모두 기다리면 드레인까지 끝난 것이다.
    pub fn spawn(
        &self,
        queue: mpsc::Receiver<Batch>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let queue: SharedQueue = Arc::new(Mutex::new(queue));
        info!(
            "송신 풀 시작: 워커 {}개, 주기 {:?}, 동시 전송 {} ({})",
            self.config.workers,
            self.config.report_interval,
            self.config.rate_limit,
            self.transport.name()
        );

        (0..self.config.workers.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    transport: self.transport.clone(),
                    permits: self.permits.clone(),
                    report_interval: self.config.report_interval,
                };
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }

    /// 워커를 시작하고 모두 끝날 때까지 대기
    pub async fn run(&self, queue: mpsc::Receiver<Batch>, shutdown: watch::Receiver<bool>) {
        for handle in self.spawn(queue, shutdown) {
            if let Err(e) = handle.await {
                warn!("송신 워커 비정상 종료: {e}");
            }
        }
        info!("송신 풀 종료");
    }
}

struct Worker {
    id: usize,
    queue: SharedQueue,
    transport: Arc<dyn MetricsTransport>,
    permits: Arc<Semaphore>,
    report_interval: Duration,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(
            Instant::now() + self.report_interval,
            self.report_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let next = self.queue.lock().await.try_recv();
                    match next {
                        Ok(batch) => self.deliver(batch).await,
                        Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Disconnected) => {
                            debug!(worker = self.id, "큐 닫힘");
                            return;
                        }
                    }
                }
            }
        }

        self.drain().await;
    }

    /// 큐에 남은 배치를 주기 없이 전송
    ///
    /// 대기하지 않는다. 큐가 비었거나 닫혔으면 바로 끝나므로
    /// 어딘가에 `Sender`가 남아 있어도 종료가 멈추지 않는다.
    async fn drain(&self) {
        let mut drained = 0usize;
        loop {
            let next = self.queue.lock().await.try_recv();
            match next {
                Ok(batch) => {
                    self.deliver(batch).await;
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        info!(worker = self.id, drained, "송신 워커 드레인 완료");
    }

    async fn deliver(&self, batch: Batch) {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(worker = self.id, "전송 허가 획득 실패: {e}");
                return;
            }
        };

        match self.transport.send_batch(&batch).await {
            Ok(()) => debug!(worker = self.id, count = batch.len(), "배치 전송 완료"),
            Err(e) => warn!(worker = self.id, count = batch.len(), "배치 전송 실패, 폐기: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use metrix_core::error::CoreError;
    use metrix_core::models::metric::Metric;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 동시 실행 수를 기록하는 느린 전송
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetricsTransport for SlowTransport {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn send_batch(&self, _batch: &[Metric]) -> Result<(), CoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Network("down".to_string()))
        }
    }

    #[tokio::test]
    async fn rate_limit_caps_concurrent_sends() {
        let transport = Arc::new(SlowTransport {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let pool = SenderPool::new(
            transport.clone(),
            SenderPoolConfig {
                workers: 3,
                report_interval: Duration::from_secs(3600),
                rate_limit: 1,
            },
        );

        let (tx, rx) = mpsc::channel(10);
        for i in 0..6 {
            tx.send(vec![Metric::counter("PollCount", i)]).await.unwrap();
        }
        drop(tx);

        let (_shutdown_tx, shutdown_rx) = watch::channel(true);
        pool.run(rx, shutdown_rx).await;

        // 실패한 전송도 재시도 없이 한 번씩만 호출
        assert_eq!(transport.calls.load(Ordering::SeqCst), 6);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_sends_on_tick() {
        let transport = Arc::new(SlowTransport {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let pool = SenderPool::new(
            transport.clone(),
            SenderPoolConfig {
                workers: 1,
                report_interval: Duration::from_secs(10),
                rate_limit: 10,
            },
        );

        let (tx, rx) = mpsc::channel(10);
        tx.send(vec![Metric::gauge("Alloc", 1.0)]).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = pool.spawn(rx, shutdown_rx);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        drop(tx);
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
