//! 런타임 메트릭 수집원.
//!
//! 에이전트 자신의 프로세스 지표(sysinfo)와 시스템 메모리/스왑/부하 평균,
//! 그리고 `RandomValue`, `PollCount`를 한 배치로 만든다.

use async_trait::async_trait;
use metrix_core::error::CoreError;
use metrix_core::models::metric::{Batch, Metric};
use metrix_core::ports::collector::MetricSource;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

/// 에이전트 프로세스 기준 런타임 수집원
pub struct RuntimeSource {
    sys: System,
    pid: Pid,
    /// 이 수집원 인스턴스의 누적 poll 횟수 (저장소 값과 무관)
    poll_count: i64,
}

impl RuntimeSource {
    /// 현재 프로세스를 대상으로 생성
    pub fn new() -> Result<Self, CoreError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| CoreError::Internal(format!("현재 PID 조회 실패: {e}")))?;
        Ok(Self {
            sys: System::new(),
            pid,
            poll_count: 0,
        })
    }

    /// 지금까지의 poll 횟수
    pub fn poll_count(&self) -> i64 {
        self.poll_count
    }

    fn process_metrics(&mut self, batch: &mut Batch) {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_cpu()
                .with_disk_usage(),
        );

        let Some(process) = self.sys.process(self.pid) else {
            debug!("자기 프로세스 정보 없음, 프로세스 지표 생략");
            return;
        };

        let disk = process.disk_usage();
        batch.extend([
            Metric::gauge("ProcessMemory", process.memory() as f64),
            Metric::gauge("ProcessVirtualMemory", process.virtual_memory() as f64),
            Metric::gauge("ProcessCpuUsage", f64::from(process.cpu_usage())),
            Metric::gauge("ProcessRunTime", process.run_time() as f64),
            Metric::gauge("ProcessDiskRead", disk.read_bytes as f64),
            Metric::gauge("ProcessDiskWritten", disk.written_bytes as f64),
            Metric::gauge("ProcessDiskReadTotal", disk.total_read_bytes as f64),
            Metric::gauge("ProcessDiskWrittenTotal", disk.total_written_bytes as f64),
        ]);
    }

    fn system_metrics(&mut self, batch: &mut Batch) {
        self.sys.refresh_memory();
        let load = System::load_average();

        batch.extend([
            Metric::gauge("UsedMemory", self.sys.used_memory() as f64),
            Metric::gauge("AvailableMemory", self.sys.available_memory() as f64),
            Metric::gauge("TotalSwap", self.sys.total_swap() as f64),
            Metric::gauge("FreeSwap", self.sys.free_swap() as f64),
            Metric::gauge("UsedSwap", self.sys.used_swap() as f64),
            Metric::gauge("LoadAverage1", load.one),
            Metric::gauge("LoadAverage5", load.five),
            Metric::gauge("LoadAverage15", load.fifteen),
        ]);
    }
}

#[async_trait]
impl MetricSource for RuntimeSource {
    fn name(&self) -> &'static str {
        "runtime"
    }

    async fn collect(&mut self) -> Result<Batch, CoreError> {
        let mut batch = Vec::with_capacity(20);
        self.process_metrics(&mut batch);
        self.system_metrics(&mut batch);

        self.poll_count += 1;
        batch.push(Metric::gauge("RandomValue", rand::random::<f64>()));
        batch.push(Metric::counter("PollCount", self.poll_count));

        debug!(count = batch.len(), poll = self.poll_count, "런타임 메트릭 수집");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(batch: &'a Batch, id: &str) -> Option<&'a Metric> {
        batch.iter().find(|m| m.id == id)
    }

    #[tokio::test]
    async fn poll_count_is_local_and_increasing() {
        let mut source = RuntimeSource::new().unwrap();

        let first = source.collect().await.unwrap();
        assert_eq!(find(&first, "PollCount").and_then(|m| m.delta), Some(1));

        let second = source.collect().await.unwrap();
        assert_eq!(find(&second, "PollCount").and_then(|m| m.delta), Some(2));
        assert_eq!(source.poll_count(), 2);

        // 다른 인스턴스는 1부터 다시 센다
        let mut other = RuntimeSource::new().unwrap();
        let batch = other.collect().await.unwrap();
        assert_eq!(find(&batch, "PollCount").and_then(|m| m.delta), Some(1));
    }

    #[tokio::test]
    async fn batch_is_valid_and_has_random_value() {
        let mut source = RuntimeSource::new().unwrap();
        let batch = source.collect().await.unwrap();

        for metric in &batch {
            metric.validate().unwrap();
        }

        let random = find(&batch, "RandomValue").and_then(|m| m.value).unwrap();
        assert!((0.0..1.0).contains(&random));
        assert!(find(&batch, "ProcessMemory").is_some());
    }
}
