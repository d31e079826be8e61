//! 에이전트 오케스트레이션.
//!
//! 수집기 두 개가 공유 큐에 배치를 넣고, 송신 풀이 큐에서 꺼내 전송한다.
//!
//! 종료 순서:
//! 1. 종료 신호 → 수집기 루프 종료 (각자 큐 `Sender` drop)
//! 2. 오케스트레이터 몫의 `Sender`는 시작 직후 drop → 수집기가 모두 끝나면 큐가 닫힘
//! 3. 수집기가 모두 끝난 뒤에야 송신 풀에 드레인 신호를 보낸다
//! 4. 송신 워커는 큐에 남은 배치를 모두 보낸 뒤 종료

use std::net::IpAddr;
use std::sync::Arc;

use metrix_codec::crypto::HybridEncryptor;
use metrix_codec::signer::Signer;
use metrix_codec::PayloadEncoder;
use metrix_core::config::{AgentConfig, QUEUE_CAPACITY, SENDER_WORKERS};
use metrix_core::error::CoreError;
use metrix_core::models::metric::Batch;
use metrix_core::ports::transport::MetricsTransport;
use metrix_monitor::{spawn_collector, HostSource, RuntimeSource};
use metrix_network::dispatcher::{SenderPool, SenderPoolConfig};
use metrix_network::grpc::GrpcTransport;
use metrix_network::http_client::{HttpTransport, DEFAULT_TIMEOUT};
use metrix_network::outbound_ip::detect_outbound_ip;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// 설정으로부터 송신 측 인코더 구성
pub fn build_encoder(config: &AgentConfig) -> Result<PayloadEncoder, CoreError> {
    let mut encoder = PayloadEncoder::new();
    if let Some(signer) = Signer::from_optional(config.sign_key.as_deref())? {
        encoder = encoder.with_signer(signer);
    }
    if let Some(path) = &config.crypto_key {
        encoder = encoder.with_encryptor(HybridEncryptor::from_pem_file(path)?);
        info!("본문 암호화 활성화: {}", path.display());
    }
    Ok(encoder)
}

/// 설정으로부터 전송 구성
///
/// gRPC 주소가 있으면 gRPC, 없으면 HTTP.
pub fn build_transport(
    config: &AgentConfig,
    real_ip: Option<IpAddr>,
) -> Result<Arc<dyn MetricsTransport>, CoreError> {
    let encoder = build_encoder(config)?;
    let real_ip = real_ip.map(|ip| ip.to_string());

    let transport: Arc<dyn MetricsTransport> = match config
        .grpc_address
        .as_deref()
        .filter(|a| !a.trim().is_empty())
    {
        Some(address) => {
            info!("gRPC 전송 사용: {address}");
            Arc::new(GrpcTransport::new(address, encoder).with_real_ip(real_ip))
        }
        None => {
            info!("HTTP 전송 사용: {}", config.address);
            Arc::new(
                HttpTransport::new(&config.address, encoder, DEFAULT_TIMEOUT)?
                    .with_real_ip(real_ip),
            )
        }
    };
    Ok(transport)
}

/// 메트릭 에이전트
pub struct Agent {
    config: AgentConfig,
    transport: Arc<dyn MetricsTransport>,
}

impl Agent {
    /// 설정대로 전송을 구성한 에이전트 생성
    pub fn new(config: AgentConfig) -> Result<Self, CoreError> {
        let real_ip = detect_outbound_ip();
        match real_ip {
            Some(ip) => info!("송신 IP: {ip}"),
            None => warn!("송신 IP 감지 실패, X-Real-IP 생략"),
        }
        let transport = build_transport(&config, real_ip)?;
        Ok(Self { config, transport })
    }

    /// 주어진 전송으로 에이전트 생성
    pub fn with_transport(config: AgentConfig, transport: Arc<dyn MetricsTransport>) -> Self {
        Self { config, transport }
    }

    /// 종료 신호까지 수집/전송 후 남은 배치를 드레인
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), CoreError> {
        let runtime = RuntimeSource::new()?;
        let poll_interval = self.config.poll_interval();

        let (queue_tx, queue_rx) = mpsc::channel::<Batch>(QUEUE_CAPACITY);

        let collectors = vec![
            spawn_collector(runtime, poll_interval, queue_tx.clone(), shutdown.clone()),
            spawn_collector(
                HostSource::new(),
                poll_interval,
                queue_tx.clone(),
                shutdown.clone(),
            ),
        ];
        drop(queue_tx);

        let pool = SenderPool::new(
            self.transport.clone(),
            SenderPoolConfig {
                workers: SENDER_WORKERS,
                report_interval: self.config.report_interval(),
                rate_limit: self.config.rate_limit,
            },
        );
        // 수집기가 마지막 배치를 넣은 뒤에 드레인이 시작되도록 별도 채널을 쓴다
        let (drain_tx, drain_rx) = watch::channel(false);
        let senders = pool.spawn(queue_rx, drain_rx);

        info!(
            "에이전트 시작: 수집 {:?}, 전송 {:?}",
            poll_interval,
            self.config.report_interval()
        );

        for handle in collectors {
            if let Err(e) = handle.await {
                warn!("수집 태스크 비정상 종료: {e}");
            }
        }
        drain_tx.send_replace(true);
        for handle in senders {
            if let Err(e) = handle.await {
                warn!("송신 워커 비정상 종료: {e}");
            }
        }

        info!("에이전트 종료 (드레인 완료)");
        Ok(())
    }
}
