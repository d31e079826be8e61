//! HTTP 전송 클라이언트.
//!
//! `MetricsTransport` 포트 구현. 코덱 파이프라인으로 인코딩한 배치를 `POST {address}/updates`로 보낸다.
//! 재시도는 연결 실패에만 적용한다 (5xx는 재시도하지 않음).

use async_trait::async_trait;
use metrix_codec::{PayloadEncoder, REAL_IP_HEADER, SIGNATURE_HEADER};
use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use metrix_core::ports::transport::MetricsTransport;
use reqwest::header::{ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// 첫 재시도 대기
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// 재시도 대기 상한
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// 기본 요청 타임아웃
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// 재시도 가능한 에러인지 판별 (연결 실패만)
fn is_retryable(error: &CoreError) -> bool {
    matches!(error, CoreError::Network(_))
}

/// scheme이 없으면 `http://`를 붙인다
pub fn normalize_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// HTTP 전송 — `MetricsTransport` 포트 구현
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    encoder: PayloadEncoder,
    real_ip: Option<String>,
    max_retries: u32,
}

impl HttpTransport {
    /// 새 HTTP 전송 생성
    pub fn new(address: &str, encoder: PayloadEncoder, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Transport(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/updates", normalize_base_url(address)),
            encoder,
            real_ip: None,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// 송신 IP 헤더 설정 (빈 값이면 생략)
    pub fn with_real_ip(mut self, ip: Option<String>) -> Self {
        self.real_ip = ip.filter(|v| !v.is_empty());
        self
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 전송 대상 URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 응답 상태 코드 확인
    async fn check_response(&self, resp: reqwest::Response) -> Result<(), CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        Err(CoreError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 100ms → 200ms → 400ms (상한 2s)
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "요청 실패 (시도 {attempt}/{}): {e}, {delay:?} 후 재시도",
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MetricsTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send_batch(&self, batch: &[Metric]) -> Result<(), CoreError> {
        let envelope = self.encoder.encode(batch)?;
        debug!(
            "배치 전송: {} 메트릭, {} bytes → {}",
            batch.len(),
            envelope.payload.len(),
            self.endpoint
        );

        self.execute_with_retry(|| async {
            let mut req = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_ENCODING, "gzip")
                .header(ACCEPT, "application/json")
                .body(envelope.payload.clone());

            if let Some(signature) = &envelope.signature {
                req = req.header(SIGNATURE_HEADER, signature);
            }
            if let Some(ip) = &self.real_ip {
                req = req.header(REAL_IP_HEADER, ip);
            }

            let resp = req.send().await.map_err(|e| {
                if e.is_connect() {
                    CoreError::Network(format!("연결 실패: {e}"))
                } else {
                    CoreError::Transport(format!("배치 전송 실패: {e}"))
                }
            })?;

            self.check_response(resp).await
        })
        .await
    }
}
