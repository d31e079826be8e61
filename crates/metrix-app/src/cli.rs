//! 커맨드라인 인자.
//!
//! 모든 플래그는 선택이다. 주어지지 않은 플래그는 아래 레이어(설정 파일, 기본값)를 가리지 않는다.

use std::path::PathBuf;

use clap::Parser;
use metrix_core::config::{parse_duration_secs, AgentOverrides, ServerOverrides};

/// METRIX 에이전트
///
/// 호스트/프로세스 메트릭을 주기적으로 수집해 서버로 보낸다.
#[derive(Parser, Debug, Default)]
#[command(name = "metrix-agent")]
#[command(author, version, about, long_about = None)]
pub struct AgentArgs {
    /// JSON 설정 파일 경로
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// 서버 HTTP 주소 (host:port)
    #[arg(short = 'a')]
    pub address: Option<String>,

    /// 서버 gRPC 주소 (지정하면 gRPC로 전송)
    #[arg(long = "ga")]
    pub grpc_address: Option<String>,

    /// 수집 주기 ("2" 또는 "2s")
    #[arg(short = 'p', value_parser = parse_duration_secs)]
    pub poll_interval: Option<u64>,

    /// 전송 주기 ("10" 또는 "10s")
    #[arg(short = 'r', value_parser = parse_duration_secs)]
    pub report_interval: Option<u64>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long = "ll")]
    pub log_level: Option<String>,

    /// 서명 키
    #[arg(short = 'k')]
    pub sign_key: Option<String>,

    /// 동시 전송 상한
    #[arg(short = 'l')]
    pub rate_limit: Option<usize>,

    /// 공개키 PEM 경로 (본문 암호화)
    #[arg(long = "crypto-key")]
    pub crypto_key: Option<PathBuf>,
}

impl AgentArgs {
    /// 설정 덮어쓰기 레이어로 변환
    pub fn overrides(&self) -> AgentOverrides {
        AgentOverrides {
            address: self.address.clone(),
            grpc_address: self.grpc_address.clone(),
            poll_interval_secs: self.poll_interval,
            report_interval_secs: self.report_interval,
            log_level: self.log_level.clone(),
            sign_key: self.sign_key.clone(),
            rate_limit: self.rate_limit,
            crypto_key: self.crypto_key.clone(),
        }
    }
}

/// METRIX 수집 서버
#[derive(Parser, Debug, Default)]
#[command(name = "metrix-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// JSON 설정 파일 경로
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP 수신 주소 (host:port)
    #[arg(short = 'a')]
    pub address: Option<String>,

    /// gRPC 수신 주소 (지정하지 않으면 gRPC 서버 비활성)
    #[arg(long = "ga")]
    pub grpc_address: Option<String>,

    /// 로그 레벨
    #[arg(short = 'l')]
    pub log_level: Option<String>,

    /// 파일 저장 주기 (호환용, 기록은 항상 동기)
    #[arg(short = 'i', value_parser = parse_duration_secs)]
    pub store_interval: Option<u64>,

    /// 파일 저장소 경로
    #[arg(short = 'f')]
    pub file_storage_path: Option<PathBuf>,

    /// 시작 시 파일 저장소 복원 (`-r` 또는 `-r=false`)
    #[arg(short = 'r', num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub restore: Option<bool>,

    /// SQLite DSN (경로 또는 `:memory:`)
    #[arg(short = 'd')]
    pub database_dsn: Option<String>,

    /// 서명 키
    #[arg(short = 'k')]
    pub sign_key: Option<String>,

    /// 개인키 PEM 경로 (본문 복호화)
    #[arg(long = "crypto-key")]
    pub crypto_key: Option<PathBuf>,

    /// 신뢰 서브넷 CIDR
    #[arg(short = 't')]
    pub trusted_subnet: Option<String>,
}

impl ServerArgs {
    /// 설정 덮어쓰기 레이어로 변환
    pub fn overrides(&self) -> ServerOverrides {
        ServerOverrides {
            address: self.address.clone(),
            grpc_address: self.grpc_address.clone(),
            log_level: self.log_level.clone(),
            store_interval_secs: self.store_interval,
            file_storage_path: self.file_storage_path.clone(),
            restore: self.restore,
            database_dsn: self.database_dsn.clone(),
            sign_key: self.sign_key.clone(),
            crypto_key: self.crypto_key.clone(),
            trusted_subnet: self.trusted_subnet.clone(),
        }
    }
}
