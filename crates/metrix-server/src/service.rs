//! 수집 서비스.
//!
//! HTTP 핸들러와 gRPC 서비스가 공유하는 진입점. 구조 검증을 먼저 하고
//! 통과한 요청만 저장소에 전달하며, 일시적 저장소 에러에 한해 고정 간격으로 재시도한다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use metrix_core::ports::storage::MetricStorage;
use tracing::{debug, warn};

/// 저장소 재시도 정책
///
/// 시도 사이 대기는 `backoff`를 순서대로 쓰고, 목록이 끝나면 마지막 값을 반복한다.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 시도 사이 대기
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
        }
    }
}

impl RetryPolicy {
    /// 대기 없이 재시도 (테스트용)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Vec::new(),
        }
    }

    /// `retry`번째 재시도 전 대기 시간 (0부터)
    pub fn delay(&self, retry: usize) -> Duration {
        self.backoff
            .get(retry)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// 수집 서비스
pub struct IngestionService {
    storage: Arc<dyn MetricStorage>,
    retry: RetryPolicy,
}

impl IngestionService {
    /// 기본 재시도 정책으로 생성
    pub fn new(storage: Arc<dyn MetricStorage>) -> Self {
        Self {
            storage,
            retry: RetryPolicy::default(),
        }
    }

    /// 재시도 정책 교체
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 메트릭 하나 갱신, 병합 후 저장된 값 반환
    pub async fn upsert_one(&self, metric: &Metric) -> Result<Metric, CoreError> {
        metric.validate()?;
        self.with_retry("upsert", || self.storage.upsert(metric))
            .await
    }

    /// 배치 갱신
    ///
    /// 하나라도 구조적으로 잘못되면 저장소를 건드리지 않고 배치 전체를 거부한다.
    pub async fn upsert_batch(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        for metric in metrics {
            metric.validate()?;
        }
        if metrics.is_empty() {
            return Ok(());
        }

        self.with_retry("upsert_batch", || self.storage.upsert_batch(metrics))
            .await?;
        debug!(count = metrics.len(), "배치 수집 완료");
        Ok(())
    }

    /// ID로 조회
    pub async fn get(&self, id: &str) -> Result<Metric, CoreError> {
        if id.is_empty() {
            return Err(CoreError::MissingId);
        }
        self.with_retry("get", || self.storage.get(id)).await
    }

    /// 전체 조회 (순서 보장 없음)
    pub async fn get_all(&self) -> Result<Vec<Metric>, CoreError> {
        self.with_retry("get_all", || self.storage.get_all()).await
    }

    /// 저장소 생존 확인
    ///
    /// 생존 확인 기능이 없는 저장소는 항상 정상으로 본다.
    pub async fn ping(&self) -> Result<(), CoreError> {
        match self.storage.liveness() {
            Some(liveness) => liveness.ping().await,
            None => Ok(()),
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay(attempt as usize - 1);
                    warn!(
                        "저장소 {operation} 실패 (시도 {attempt}/{max_attempts}): {e}, {delay:?} 후 재시도"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("저장소 {operation} 재시도 소진: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use metrix_storage::memory::MemoryStorage;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 처음 `failures`번은 일시적 에러를 내는 저장소
    struct FlakyStorage {
        inner: MemoryStorage,
        failures: u32,
        calls: AtomicU32,
        error: fn() -> CoreError,
    }

    impl FlakyStorage {
        fn new(failures: u32, error: fn() -> CoreError) -> Self {
            Self {
                inner: MemoryStorage::new(),
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn fail_now(&self) -> Result<(), CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MetricStorage for FlakyStorage {
        async fn upsert(&self, metric: &Metric) -> Result<Metric, CoreError> {
            self.fail_now()?;
            self.inner.upsert(metric).await
        }

        async fn upsert_batch(&self, metrics: &[Metric]) -> Result<(), CoreError> {
            self.fail_now()?;
            self.inner.upsert_batch(metrics).await
        }

        async fn get(&self, id: &str) -> Result<Metric, CoreError> {
            self.inner.get(id).await
        }

        async fn get_all(&self) -> Result<Vec<Metric>, CoreError> {
            self.inner.get_all().await
        }
    }

    fn transient() -> CoreError {
        CoreError::TransientStorage("연결 끊김".to_string())
    }

    fn permanent() -> CoreError {
        CoreError::Storage("제약 위반".to_string())
    }

    #[test]
    fn backoff_repeats_last_step() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(3));
        assert_eq!(policy.delay(2), Duration::from_secs(5));
        assert_eq!(policy.delay(7), Duration::from_secs(5));
        assert_eq!(RetryPolicy::immediate(3).delay(0), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_is_retried_without_double_counting() {
        let storage = Arc::new(FlakyStorage::new(2, transient));
        let service = IngestionService::new(storage.clone());

        let stored = service.upsert_one(&Metric::counter("hits", 3)).await.unwrap();
        assert_eq!(stored.delta, Some(3));
        assert_eq!(storage.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let storage = Arc::new(FlakyStorage::new(10, transient));
        let service = IngestionService::new(storage.clone());

        let result = service.upsert_one(&Metric::gauge("temp", 1.0)).await;
        assert_matches!(result, Err(CoreError::TransientStorage(_)));
        assert_eq!(storage.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let storage = Arc::new(FlakyStorage::new(10, permanent));
        let service =
            IngestionService::new(storage.clone()).with_retry_policy(RetryPolicy::immediate(5));

        let result = service.upsert_batch(&[Metric::gauge("temp", 1.0)]).await;
        assert_matches!(result, Err(CoreError::Storage(_)));
        assert_eq!(storage.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_metric_never_reaches_storage() {
        let storage = Arc::new(FlakyStorage::new(0, transient));
        let service = IngestionService::new(storage.clone());

        let mut broken = Metric::gauge("temp", 1.0);
        broken.value = None;
        assert_matches!(
            service.upsert_one(&broken).await,
            Err(CoreError::InvalidMetric { .. })
        );
        assert_matches!(
            service.upsert_one(&Metric::counter("", 1)).await,
            Err(CoreError::MissingId)
        );

        // 배치 중 하나라도 잘못되면 전체 거부
        let result = service
            .upsert_batch(&[Metric::counter("hits", 1), broken])
            .await;
        assert_matches!(result, Err(CoreError::InvalidMetric { .. }));

        assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
        assert!(service.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conflict_and_not_found_are_distinct() {
        let service = IngestionService::new(Arc::new(MemoryStorage::new()));
        service.upsert_one(&Metric::gauge("temp", 1.0)).await.unwrap();

        assert_matches!(
            service.upsert_one(&Metric::counter("temp", 1)).await,
            Err(CoreError::KindConflict { .. })
        );
        assert_matches!(service.get("missing").await, Err(CoreError::NotFound { .. }));
        assert_eq!(service.get("temp").await.unwrap(), Metric::gauge("temp", 1.0));
    }

    #[tokio::test]
    async fn ping_without_liveness_is_ok() {
        let service = IngestionService::new(Arc::new(MemoryStorage::new()));
        assert!(service.ping().await.is_ok());
    }
}
