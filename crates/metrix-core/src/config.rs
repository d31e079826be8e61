//! 에이전트/서버 설정 구조체.
//!
//! 우선순위: 환경변수 > CLI 플래그 > JSON 설정 파일 > 기본값.
//! CLI 파싱은 `metrix-app`이 담당하고, 여기서는 각 레이어를 덮어쓰는 규칙만 정의한다.
//! 환경변수는 조회 함수(`Fn(&str) -> Option<String>`)로 주입받아 테스트에서 교체할 수 있다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreError;

/// 전송 워커 수 (고정)
pub const SENDER_WORKERS: usize = 3;

/// 배치 큐 용량 (고정)
pub const QUEUE_CAPACITY: usize = 10;

/// 설정 파일 경로 환경변수
pub const CONFIG_ENV: &str = "CONFIG";

// ============================================================
// 에이전트 설정
// ============================================================

/// 에이전트 런타임 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// HTTP 서버 주소 (scheme 생략 가능)
    pub address: String,
    /// gRPC 서버 주소 (설정 시 gRPC 전송 사용)
    pub grpc_address: Option<String>,
    /// 수집 주기 (초)
    pub poll_interval_secs: u64,
    /// 전송 주기 (초)
    pub report_interval_secs: u64,
    /// 로그 레벨
    pub log_level: String,
    /// HMAC 서명 키
    pub sign_key: Option<String>,
    /// 동시 전송 상한
    pub rate_limit: usize,
    /// 서버 공개키 PEM 경로
    pub crypto_key: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            grpc_address: None,
            poll_interval_secs: 2,
            report_interval_secs: 10,
            log_level: "info".to_string(),
            sign_key: None,
            rate_limit: 100,
            crypto_key: None,
        }
    }
}

/// 에이전트 설정 덮어쓰기 레이어 (JSON 파일/CLI 플래그 공용)
///
/// 모든 필드가 `Option`이므로 지정되지 않은 값은 하위 레이어를 가리지 않는다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentOverrides {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub grpc_address: Option<String>,
    /// JSON에서는 `"2s"` 형식
    #[serde(default, rename = "poll_interval", deserialize_with = "de_opt_duration_secs")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, rename = "report_interval", deserialize_with = "de_opt_duration_secs")]
    pub report_interval_secs: Option<u64>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub sign_key: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<usize>,
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,
}

impl AgentConfig {
    /// 전체 레이어를 적용하여 최종 설정 생성
    ///
    /// `config_path`는 `-c` 플래그 값. `CONFIG` 환경변수가 있으면 그쪽이 우선한다.
    pub fn load<F>(config_path: Option<&Path>, flags: AgentOverrides, env: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(config_path, &env) {
            let file: AgentOverrides = read_json_file(&path)?;
            config.apply(file);
        }

        config.apply(flags);
        config.apply_env(&env)?;
        config.normalize();
        Ok(config)
    }

    /// 덮어쓰기 레이어 적용
    pub fn apply(&mut self, layer: AgentOverrides) {
        overlay(&mut self.address, layer.address);
        overlay_opt(&mut self.grpc_address, layer.grpc_address);
        overlay(&mut self.poll_interval_secs, layer.poll_interval_secs);
        overlay(&mut self.report_interval_secs, layer.report_interval_secs);
        overlay(&mut self.log_level, layer.log_level);
        overlay_opt(&mut self.sign_key, layer.sign_key);
        overlay(&mut self.rate_limit, layer.rate_limit);
        overlay_opt(&mut self.crypto_key, layer.crypto_key);
    }

    /// 환경변수 레이어 적용
    pub fn apply_env<F>(&mut self, env: &F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let layer = AgentOverrides {
            address: env_var(env, "ADDRESS"),
            grpc_address: env_var(env, "GRPC_ADDRESS"),
            poll_interval_secs: env_parse(env, "POLL_INTERVAL")?,
            report_interval_secs: env_parse(env, "REPORT_INTERVAL")?,
            log_level: env_var(env, "LOG_LEVEL"),
            sign_key: env_var(env, "KEY"),
            rate_limit: env_parse(env, "RATE_LIMIT")?,
            crypto_key: env_var(env, "CRYPTO_KEY").map(PathBuf::from),
        };
        self.apply(layer);
        Ok(())
    }

    /// 범위를 벗어난 값을 기본값으로 되돌림
    fn normalize(&mut self) {
        let defaults = Self::default();
        if self.poll_interval_secs < 1 {
            self.poll_interval_secs = defaults.poll_interval_secs;
        }
        if self.report_interval_secs < 1 {
            self.report_interval_secs = defaults.report_interval_secs;
        }
        if self.rate_limit == 0 {
            self.rate_limit = defaults.rate_limit;
        }
    }

    /// 수집 주기를 Duration으로 반환
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 전송 주기를 Duration으로 반환
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

// ============================================================
// 서버 설정
// ============================================================

/// 서버 런타임 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP 수신 주소
    pub address: String,
    /// gRPC 수신 주소 (없으면 gRPC 서버 비활성)
    pub grpc_address: Option<String>,
    /// 로그 레벨
    pub log_level: String,
    /// 파일 저장 주기 (초). 파일 백엔드는 변경마다 동기 저장하므로 참고용.
    pub store_interval_secs: u64,
    /// 파일 저장소 경로
    pub file_storage_path: Option<PathBuf>,
    /// 시작 시 파일에서 복원
    pub restore: bool,
    /// SQLite DSN (경로 또는 `:memory:`)
    pub database_dsn: Option<String>,
    /// HMAC 서명 키
    pub sign_key: Option<String>,
    /// 개인키 PEM 경로
    pub crypto_key: Option<PathBuf>,
    /// 신뢰 서브넷 CIDR
    pub trusted_subnet: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            grpc_address: None,
            log_level: "warn".to_string(),
            store_interval_secs: 5,
            file_storage_path: None,
            restore: false,
            database_dsn: None,
            sign_key: None,
            crypto_key: None,
            trusted_subnet: None,
        }
    }
}

/// 서버 설정 덮어쓰기 레이어 (JSON 파일/CLI 플래그 공용)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerOverrides {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub grpc_address: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    /// JSON에서는 `"300s"` 형식
    #[serde(default, rename = "store_interval", deserialize_with = "de_opt_duration_secs")]
    pub store_interval_secs: Option<u64>,
    #[serde(default, rename = "store_file")]
    pub file_storage_path: Option<PathBuf>,
    #[serde(default)]
    pub restore: Option<bool>,
    #[serde(default)]
    pub database_dsn: Option<String>,
    #[serde(default)]
    pub sign_key: Option<String>,
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,
    #[serde(default)]
    pub trusted_subnet: Option<String>,
}

impl ServerConfig {
    /// 전체 레이어를 적용하여 최종 설정 생성
    pub fn load<F>(config_path: Option<&Path>, flags: ServerOverrides, env: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(config_path, &env) {
            let file: ServerOverrides = read_json_file(&path)?;
            config.apply(file);
        }

        config.apply(flags);
        config.apply_env(&env)?;
        Ok(config)
    }

    /// 덮어쓰기 레이어 적용
    pub fn apply(&mut self, layer: ServerOverrides) {
        overlay(&mut self.address, layer.address);
        overlay_opt(&mut self.grpc_address, layer.grpc_address);
        overlay(&mut self.log_level, layer.log_level);
        overlay(&mut self.store_interval_secs, layer.store_interval_secs);
        overlay_opt(&mut self.file_storage_path, layer.file_storage_path);
        overlay(&mut self.restore, layer.restore);
        overlay_opt(&mut self.database_dsn, layer.database_dsn);
        overlay_opt(&mut self.sign_key, layer.sign_key);
        overlay_opt(&mut self.crypto_key, layer.crypto_key);
        overlay_opt(&mut self.trusted_subnet, layer.trusted_subnet);
    }

    /// 환경변수 레이어 적용
    pub fn apply_env<F>(&mut self, env: &F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let layer = ServerOverrides {
            address: env_var(env, "ADDRESS"),
            grpc_address: env_var(env, "GRPC_ADDRESS"),
            log_level: env_var(env, "LOG_LEVEL"),
            store_interval_secs: env_parse(env, "STORE_INTERVAL")?,
            file_storage_path: env_var(env, "FILE_STORAGE_PATH").map(PathBuf::from),
            restore: env_parse(env, "RESTORE")?,
            database_dsn: env_var(env, "DATABASE_DSN"),
            sign_key: env_var(env, "KEY"),
            crypto_key: env_var(env, "CRYPTO_KEY").map(PathBuf::from),
            trusted_subnet: env_var(env, "TRUSTED_SUBNET"),
        };
        self.apply(layer);
        Ok(())
    }

    /// 파일 저장 주기를 Duration으로 반환
    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs)
    }
}

// ============================================================
// 레이어 헬퍼
// ============================================================

fn overlay<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn overlay_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn resolve_config_path<F>(flag: Option<&Path>, env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    env_var(env, CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(|| flag.map(Path::to_path_buf))
}

fn read_json_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CoreError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("설정 파일 읽기 실패 {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CoreError::Config(format!("설정 파일 파싱 실패 {}: {e}", path.display())))
}

/// 빈 문자열은 미설정으로 취급
fn env_var<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key).filter(|v| !v.trim().is_empty())
}

fn env_parse<F, T>(env: &F, key: &str) -> Result<Option<T>, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(env, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CoreError::Config(format!("환경변수 {key}={raw:?} 파싱 실패: {e}"))),
        None => Ok(None),
    }
}

/// `"10"`, `"10s"`, `"5m"`, `"1h"` 형식을 초 단위로 변환
pub fn parse_duration_secs(raw: &str) -> Result<u64, CoreError> {
    let raw = raw.trim();
    let (number, multiplier) = match raw.char_indices().last() {
        Some((idx, 's')) => (&raw[..idx], 1),
        Some((idx, 'm')) => (&raw[..idx], 60),
        Some((idx, 'h')) => (&raw[..idx], 3600),
        _ => (raw, 1),
    };

    let n = number
        .parse::<u64>()
        .map_err(|e| CoreError::Config(format!("잘못된 주기 값 {raw:?}: {e}")))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| CoreError::Config(format!("주기 값 범위 초과: {raw:?}")))
}

fn de_opt_duration_secs<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Secs(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => parse_duration_secs(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
