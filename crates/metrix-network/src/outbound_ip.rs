//! 송신 IP 감지.
//!
//! UDP 소켓을 외부 주소로 connect 하면 패킷을 보내지 않고도 라우팅에 쓰일 로컬 주소를 알 수 있다.

use std::net::{IpAddr, UdpSocket};
use tracing::{debug, warn};

/// 라우팅 기준 주소
const PROBE_ADDR: &str = "8.8.8.8:80";

/// 외부로 나가는 로컬 IP 감지 (실패 시 None)
pub fn detect_outbound_ip() -> Option<IpAddr> {
    match probe(PROBE_ADDR) {
        Ok(ip) => {
            debug!("송신 IP 감지: {ip}");
            Some(ip)
        }
        Err(e) => {
            warn!("송신 IP 감지 실패, X-Real-IP 생략: {e}");
            None
        }
    }
}

fn probe(target: &str) -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(target)?;
    Ok(socket.local_addr()?.ip())
}
