//! 메모리 저장소.
//!
//! ID를 키로 하는 맵. 병합은 잠금을 쥔 채 읽기-병합-쓰기로 수행되어
//! 같은 counter에 대한 동시 갱신이 유실되지 않는다.

use async_trait::async_trait;
use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use metrix_core::ports::storage::MetricStorage;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::merge;

/// 메모리 저장소 (영속화 없음)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    metrics: Mutex<HashMap<String, Metric>>,
}

impl MemoryStorage {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricStorage for MemoryStorage {
    async fn upsert(&self, metric: &Metric) -> Result<Metric, CoreError> {
        let mut map = self.metrics.lock();
        merge::apply_one(&mut map, metric)
    }

    async fn upsert_batch(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        let mut map = self.metrics.lock();
        merge::apply_batch(&mut map, metrics)
    }

    async fn get(&self, id: &str) -> Result<Metric, CoreError> {
        self.metrics
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::metric_not_found(id))
    }

    async fn get_all(&self) -> Result<Vec<Metric>, CoreError> {
        Ok(self.metrics.lock().values().cloned().collect())
    }
}
