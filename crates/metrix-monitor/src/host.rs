//! 호스트 메트릭 수집원.
//!
//! 전체/여유 메모리와 논리 CPU별 사용률. CPU 사용률은 틱마다 1초 창으로 샘플링한다.

use std::time::Duration;

use async_trait::async_trait;
use metrix_core::error::CoreError;
use metrix_core::models::metric::{Batch, Metric};
use metrix_core::ports::collector::MetricSource;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

/// CPU 샘플링 창
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// 호스트 수집원
pub struct HostSource {
    sys: System,
    sample_window: Duration,
}

impl HostSource {
    /// 새 호스트 수집원 생성
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self {
            sys,
            sample_window: CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    /// 논리 CPU별 사용률 샘플링
    async fn sample_cpus(&mut self) -> Result<Vec<f64>, CoreError> {
        self.sys.refresh_cpu_usage();
        tokio::time::sleep(self.sample_window).await;
        self.sys.refresh_cpu_usage();

        let usage: Vec<f64> = self
            .sys
            .cpus()
            .iter()
            .map(|cpu| f64::from(cpu.cpu_usage()))
            .collect();
        if usage.is_empty() {
            return Err(CoreError::Internal("CPU 정보를 읽을 수 없음".to_string()));
        }
        Ok(usage)
    }
}

impl Default for HostSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for HostSource {
    fn name(&self) -> &'static str {
        "host"
    }

    async fn collect(&mut self) -> Result<Batch, CoreError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        let free = self.sys.free_memory();
        if total == 0 {
            return Err(CoreError::Internal("메모리 정보를 읽을 수 없음".to_string()));
        }

        let cpus = self.sample_cpus().await?;

        let mut batch = Vec::with_capacity(cpus.len() + 2);
        batch.push(Metric::gauge("TotalMemory", total as f64));
        batch.push(Metric::gauge("FreeMemory", free as f64));
        batch.extend(
            cpus.into_iter()
                .enumerate()
                .map(|(i, usage)| Metric::gauge(format!("CPUutilization{i}"), usage)),
        );

        debug!(count = batch.len(), "호스트 메트릭 수집");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_memory_and_per_cpu_gauges() {
        let mut source = HostSource::new();
        let batch = source.collect().await.unwrap();

        assert_eq!(batch[0].id, "TotalMemory");
        assert_eq!(batch[1].id, "FreeMemory");
        assert!(batch[0].value.unwrap() > 0.0);
        assert!(batch.iter().any(|m| m.id == "CPUutilization0"));

        for metric in &batch {
            metric.validate().unwrap();
        }
    }
}
