//! gRPC 수집 서버.
//!
//! 가드 순서는 HTTP와 같다: 신뢰 서브넷(인터셉터) → 서명 → 해제 → 복호화 → JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use metrix_codec::{PayloadDecoder, REAL_IP_METADATA_KEY, SIGNATURE_METADATA_KEY};
use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use metrix_network::proto::metrics::metrics_server::{Metrics, MetricsServer};
use metrix_network::proto::metrics::BatchBytes;
use tokio::sync::watch;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::service::IngestionService;
use crate::subnet::TrustedSubnet;

/// 수집 서비스의 gRPC 어댑터
pub struct MetricsGrpcService {
    service: Arc<IngestionService>,
    decoder: Arc<PayloadDecoder>,
}

impl MetricsGrpcService {
    /// 새 어댑터 생성
    pub fn new(service: Arc<IngestionService>, decoder: Arc<PayloadDecoder>) -> Self {
        Self { service, decoder }
    }

    fn decode(&self, request: &Request<BatchBytes>) -> Result<Vec<Metric>, Status> {
        let payload = &request.get_ref().payload;
        let signature = request
            .metadata()
            .get(SIGNATURE_METADATA_KEY)
            .and_then(|v| v.to_str().ok());

        if self.decoder.requires_signature() && signature.map_or(true, |s| s.trim().is_empty()) {
            return Err(Status::invalid_argument("서명 누락"));
        }
        self.decoder
            .verify(payload, signature)
            .map_err(|e| Status::permission_denied(e.to_string()))?;

        let bytes = self
            .decoder
            .unwrap_payload(payload, true)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| Status::invalid_argument(format!("배치 역직렬화 실패: {e}")))
    }
}

/// 수집 에러를 gRPC Status로 변환
pub fn ingestion_status(err: CoreError) -> Status {
    match err {
        CoreError::NotFound { .. } => Status::not_found(err.to_string()),
        CoreError::TransientStorage(_) => Status::unavailable(err.to_string()),
        ref e if e.is_validation() => Status::invalid_argument(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}

#[async_trait]
impl Metrics for MetricsGrpcService {
    async fn updates(&self, request: Request<BatchBytes>) -> Result<Response<()>, Status> {
        let metrics = self.decode(&request).map_err(|status| {
            warn!("gRPC 배치 거부: {}", status.message());
            status
        })?;

        self.service
            .upsert_batch(&metrics)
            .await
            .map_err(ingestion_status)?;

        debug!(count = metrics.len(), "gRPC 배치 갱신");
        Ok(Response::new(()))
    }
}

/// 신뢰 서브넷 인터셉터 생성
///
/// `x-real-ip` 메타데이터가 있으면 그것을, 없으면 피어 주소를 쓴다.
pub fn subnet_interceptor(
    subnet: Option<TrustedSubnet>,
) -> impl FnMut(Request<()>) -> Result<Request<()>, Status> + Clone {
    move |request: Request<()>| {
        let Some(subnet) = subnet else {
            return Ok(request);
        };

        let from_metadata = request
            .metadata()
            .get(REAL_IP_METADATA_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let result = match from_metadata {
            Some(raw) => subnet.check(Some(&raw)),
            None => match request.remote_addr() {
                Some(addr) => subnet.check_ip(addr.ip()),
                None => Err(CoreError::Forbidden("송신자 주소 없음".to_string())),
            },
        };

        match result {
            Ok(_) => Ok(request),
            Err(e) => {
                warn!("gRPC 요청 거부: {e}");
                Err(Status::permission_denied(e.to_string()))
            }
        }
    }
}

/// 인터셉터가 적용된 서비스 생성
pub fn metrics_service(
    service: Arc<IngestionService>,
    decoder: Arc<PayloadDecoder>,
    subnet: Option<TrustedSubnet>,
) -> InterceptedService<
    MetricsServer<MetricsGrpcService>,
    impl FnMut(Request<()>) -> Result<Request<()>, Status> + Clone,
> {
    MetricsServer::with_interceptor(
        MetricsGrpcService::new(service, decoder),
        subnet_interceptor(subnet),
    )
}

/// gRPC 서버 실행 (종료 신호까지)
pub async fn serve(
    addr: SocketAddr,
    service: Arc<IngestionService>,
    decoder: Arc<PayloadDecoder>,
    subnet: Option<TrustedSubnet>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), CoreError> {
    info!("gRPC 서버 시작: {addr}");

    Server::builder()
        .add_service(metrics_service(service, decoder, subnet))
        .serve_with_shutdown(addr, async move {
            loop {
                if *shutdown_rx.borrow() {
                    info!("gRPC 서버 종료 신호 수신");
                    break;
                }
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| CoreError::Rpc(format!("gRPC 서버 실패: {e}")))?;

    info!("gRPC 서버 종료");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrix_codec::signer::Signer;
    use metrix_codec::PayloadEncoder;
    use metrix_storage::memory::MemoryStorage;
    use tonic::metadata::MetadataValue;
    use tonic::Code;

    fn grpc_service(decoder: PayloadDecoder) -> (MetricsGrpcService, Arc<IngestionService>) {
        let service = Arc::new(IngestionService::new(Arc::new(MemoryStorage::new())));
        (
            MetricsGrpcService::new(service.clone(), Arc::new(decoder)),
            service,
        )
    }

    fn signed_request(payload: Vec<u8>, signature: Option<String>) -> Request<BatchBytes> {
        let mut request = Request::new(BatchBytes { payload });
        if let Some(signature) = signature {
            request.metadata_mut().insert(
                SIGNATURE_METADATA_KEY,
                MetadataValue::try_from(signature.as_str()).unwrap(),
            );
        }
        request
    }

    #[tokio::test]
    async fn signed_batch_is_stored() {
        let signer = Signer::new("secret").unwrap();
        let (grpc, service) = grpc_service(PayloadDecoder::new().with_signer(signer.clone()));

        let envelope = PayloadEncoder::new()
            .with_signer(signer)
            .encode(&vec![Metric::counter("hits", 3), Metric::counter("hits", 4)])
            .unwrap();
        grpc.updates(signed_request(envelope.payload, envelope.signature))
            .await
            .unwrap();

        assert_eq!(service.get("hits").await.unwrap().delta, Some(7));
    }

    #[tokio::test]
    async fn signature_failures_map_to_status() {
        let signer = Signer::new("secret").unwrap();
        let (grpc, service) = grpc_service(PayloadDecoder::new().with_signer(signer.clone()));
        let envelope = PayloadEncoder::new()
            .with_signer(signer)
            .encode(&vec![Metric::gauge("temp", 1.0)])
            .unwrap();

        let missing = grpc
            .updates(signed_request(envelope.payload.clone(), None))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), Code::InvalidArgument);

        let mut tampered = envelope.payload.clone();
        tampered[0] ^= 0x01;
        let mismatch = grpc
            .updates(signed_request(tampered, envelope.signature.clone()))
            .await
            .unwrap_err();
        assert_eq!(mismatch.code(), Code::PermissionDenied);

        assert!(service.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_metric_is_invalid_argument() {
        let (grpc, _) = grpc_service(PayloadDecoder::new());
        let envelope = PayloadEncoder::new()
            .encode(&vec![Metric::counter("", 1)])
            .unwrap();
        let status = grpc
            .updates(signed_request(envelope.payload, None))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let garbage = grpc
            .updates(signed_request(b"not gzip".to_vec(), None))
            .await
            .unwrap_err();
        assert_eq!(garbage.code(), Code::InvalidArgument);
    }

    #[test]
    fn interceptor_uses_metadata_then_peer() {
        let subnet = TrustedSubnet::from_config(Some("10.0.0.0/8"));
        let mut intercept = subnet_interceptor(subnet);

        let mut allowed = Request::new(());
        allowed
            .metadata_mut()
            .insert(REAL_IP_METADATA_KEY, MetadataValue::from_static("10.1.2.3"));
        assert!(intercept(allowed).is_ok());

        let mut denied = Request::new(());
        denied
            .metadata_mut()
            .insert(REAL_IP_METADATA_KEY, MetadataValue::from_static("192.168.0.1"));
        assert_eq!(intercept(denied).unwrap_err().code(), Code::PermissionDenied);

        // 메타데이터도 피어 주소도 없음
        assert_eq!(
            intercept(Request::new(())).unwrap_err().code(),
            Code::PermissionDenied
        );

        let mut open = subnet_interceptor(None);
        assert!(open(Request::new(())).is_ok());
    }

    #[test]
    fn ingestion_errors_map_to_codes() {
        assert_eq!(
            ingestion_status(CoreError::TransientStorage("x".to_string())).code(),
            Code::Unavailable
        );
        assert_eq!(ingestion_status(CoreError::MissingId).code(), Code::InvalidArgument);
        assert_eq!(
            ingestion_status(CoreError::metric_not_found("x")).code(),
            Code::NotFound
        );
        assert_eq!(
            ingestion_status(CoreError::Storage("x".to_string())).code(),
            Code::Internal
        );
    }
}
