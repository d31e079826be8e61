//! 신뢰 서브넷 검사.
//!
//! HTTP는 `X-Real-IP` 헤더, gRPC는 `x-real-ip` 메타데이터(없으면 피어 주소)로 송신자를 판별한다.
//! CIDR이 비어 있거나 파싱할 수 없으면 검사를 끈다 (경고 로그).

use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use ipnet::IpNet;
use metrix_codec::REAL_IP_HEADER;
use metrix_core::error::CoreError;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// 신뢰 서브넷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedSubnet(IpNet);

impl TrustedSubnet {
    /// 설정값에서 생성 (검사를 끄는 경우 None)
    pub fn from_config(cidr: Option<&str>) -> Option<Self> {
        let cidr = cidr.map(str::trim).filter(|c| !c.is_empty())?;
        match cidr.parse::<IpNet>() {
            Ok(net) => Some(Self(net)),
            Err(e) => {
                warn!("신뢰 서브넷 CIDR 파싱 실패, 검사 비활성화: {cidr:?} ({e})");
                None
            }
        }
    }

    /// 주소가 서브넷 안에 있는지
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip)
    }

    /// 송신자 주소 문자열 검사
    pub fn check(&self, raw: Option<&str>) -> Result<IpAddr, CoreError> {
        let raw = raw
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CoreError::Forbidden("송신자 IP 없음".to_string()))?;

        let ip: IpAddr = raw
            .parse()
            .map_err(|_| CoreError::Forbidden(format!("잘못된 송신자 IP: {raw}")))?;

        self.check_ip(ip)
    }

    /// 파싱된 주소 검사
    pub fn check_ip(&self, ip: IpAddr) -> Result<IpAddr, CoreError> {
        if self.contains(ip) {
            Ok(ip)
        } else {
            Err(CoreError::Forbidden(format!("{ip}는 신뢰 서브넷 {} 밖", self.0)))
        }
    }
}

/// 수집 경로 앞단 미들웨어
pub async fn require_trusted_subnet(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(subnet) = &state.subnet {
        let raw = request
            .headers()
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok());
        match subnet.check(raw) {
            Ok(ip) => debug!("신뢰 서브넷 통과: {ip}"),
            Err(e) => {
                warn!("{} {} 거부: {e}", request.method(), request.uri().path());
                return Err(e.into());
            }
        }
    }
    Ok(next.run(request).await)
}
