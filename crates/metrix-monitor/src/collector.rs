//! 주기적 수집 루프.
//!
//! 수집원 하나를 poll 주기마다 호출하여 공유 큐에 배치를 넣는다.
//! 큐가 가득 차면 전송이 막히며 수집도 멈춘다 (배치를 버리지 않음).
//! 종료 신호는 큐 대기 중에도 즉시 반영된다.

use std::time::Duration;

use metrix_core::models::metric::Batch;
use metrix_core::ports::collector::MetricSource;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 수집 루프 실행 (종료 신호까지 블록)
///
/// 반환 시 `queue` 송신단이 drop되어 오케스트레이터가 큐를 닫을 수 있다.
pub async fn run_collector<S: MetricSource>(
    mut source: S,
    poll_interval: Duration,
    queue: mpsc::Sender<Batch>,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = source.name();
    let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("수집 루프 시작: {name} ({poll_interval:?})");

    while !*shutdown.borrow() {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let batch = match source.collect().await {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!("{name} 수집 실패, 이번 틱 건너뜀: {e}");
                        continue;
                    }
                };

                let count = batch.len();
                tokio::select! {
                    sent = queue.send(batch) => {
                        if sent.is_err() {
                            warn!("{name}: 큐가 닫혀 수집 종료");
                            break;
                        }
                        debug!("{name}: 배치 {count}개 메트릭 큐 적재");
                    }
                    _ = shutdown.changed() => {
                        debug!("{name}: 큐 대기 중 종료");
                        break;
                    }
                }
            }
        }
    }

    info!("수집 루프 종료: {name}");
}

/// 수집 루프를 태스크로 시작
pub fn spawn_collector<S>(
    source: S,
    poll_interval: Duration,
    queue: mpsc::Sender<Batch>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: MetricSource + 'static,
{
    tokio::spawn(run_collector(source, poll_interval, queue, shutdown))
}
