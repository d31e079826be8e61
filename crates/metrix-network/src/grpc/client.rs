//! gRPC 전송 — `MetricsTransport` 포트 구현

use std::time::Duration;

use async_trait::async_trait;
use metrix_codec::{PayloadEncoder, REAL_IP_METADATA_KEY, SIGNATURE_METADATA_KEY};
use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use metrix_core::ports::transport::MetricsTransport;
use tokio::sync::OnceCell;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

use super::error_mapping::map_grpc_status_error;
use crate::http_client::normalize_base_url;
use crate::proto::metrics::metrics_client::MetricsClient;
use crate::proto::metrics::BatchBytes;

/// 연결 타임아웃
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 호출당 타임아웃
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// gRPC 전송
pub struct GrpcTransport {
    endpoint: String,
    encoder: PayloadEncoder,
    real_ip: Option<String>,
    client: OnceCell<MetricsClient<Channel>>,
}

impl GrpcTransport {
    /// 새 gRPC 전송 생성 (연결은 첫 전송 시)
    pub fn new(address: &str, encoder: PayloadEncoder) -> Self {
        Self {
            endpoint: normalize_base_url(address),
            encoder,
            real_ip: None,
            client: OnceCell::new(),
        }
    }

    /// 송신 IP 메타데이터 설정 (빈 값이면 생략)
    pub fn with_real_ip(mut self, ip: Option<String>) -> Self {
        self.real_ip = ip.filter(|v| !v.is_empty());
        self
    }

    /// 공유 클라이언트 반환 (최초 호출 시 연결)
    ///
    /// 연결에 실패하면 셀이 비어 있으므로 다음 전송에서 다시 연결을 시도한다.
    async fn client(&self) -> Result<MetricsClient<Channel>, CoreError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let endpoint = Endpoint::from_shared(self.endpoint.clone())
                    .map_err(|e| CoreError::Config(format!("잘못된 gRPC 엔드포인트: {e}")))?
                    .connect_timeout(CONNECT_TIMEOUT)
                    .timeout(REQUEST_TIMEOUT);

                let channel = endpoint
                    .connect()
                    .await
                    .map_err(|e| CoreError::Network(format!("gRPC 연결 실패: {e}")))?;

                info!("gRPC 채널 연결: {}", self.endpoint);
                Ok::<_, CoreError>(MetricsClient::new(channel))
            })
            .await?;

        Ok(client.clone())
    }

    fn build_request(
        &self,
        payload: Vec<u8>,
        signature: Option<&str>,
    ) -> Result<tonic::Request<BatchBytes>, CoreError> {
        let mut request = tonic::Request::new(BatchBytes { payload });
        request.set_timeout(REQUEST_TIMEOUT);

        if let Some(signature) = signature {
            let value = MetadataValue::try_from(signature)
                .map_err(|e| CoreError::Rpc(format!("서명 메타데이터 생성 실패: {e}")))?;
            request.metadata_mut().insert(SIGNATURE_METADATA_KEY, value);
        }
        if let Some(ip) = &self.real_ip {
            let value = MetadataValue::try_from(ip.as_str())
                .map_err(|e| CoreError::Rpc(format!("IP 메타데이터 생성 실패: {e}")))?;
            request.metadata_mut().insert(REAL_IP_METADATA_KEY, value);
        }

        Ok(request)
    }
}

#[async_trait]
impl MetricsTransport for GrpcTransport {
    fn name(&self) -> &'static str {
        "grpc"
    }

    async fn send_batch(&self, batch: &[Metric]) -> Result<(), CoreError> {
        let envelope = self.encoder.encode(batch)?;
        debug!(
            "gRPC 배치 전송: {} 메트릭, {} bytes",
            batch.len(),
            envelope.payload.len()
        );

        let request = self.build_request(envelope.payload, envelope.signature.as_deref())?;
        let mut client = self.client().await?;

        client
            .updates(request)
            .await
            .map_err(|status| map_grpc_status_error("grpc updates", status))?;
        Ok(())
    }
}
