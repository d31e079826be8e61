//! METRIX 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 타입을 그대로 반환하거나 전송 계층 에러(HTTP 상태, gRPC Status)로 변환한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 유효성 검증, 저장소, 보안(서명/암호화), 전송 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 구조적으로 잘못된 메트릭 (값 누락, 종류와 값 불일치 등)
    #[error("잘못된 메트릭 {id:?}: {reason}")]
    InvalidMetric {
        /// 메트릭 ID (비어 있을 수 있음)
        id: String,
        /// 실패 사유
        reason: String,
    },

    /// 메트릭 ID가 비어 있음
    #[error("메트릭 ID가 비어 있음")]
    MissingId,

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Metric")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 기존 ID의 종류와 다른 종류로 갱신 시도
    #[error("메트릭 종류 충돌 {id}: 저장됨={stored}, 수신={received}")]
    KindConflict {
        /// 메트릭 ID
        id: String,
        /// 저장된 종류
        stored: String,
        /// 수신된 종류
        received: String,
    },

    /// 일시적 저장소 에러 (연결 끊김, 데드라인 초과, 일시적 권한 오류)
    #[error("일시적 저장소 에러: {0}")]
    TransientStorage(String),

    /// 저장소 에러 (재시도 불가)
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 서명 누락 또는 검증 실패
    #[error("서명 에러: {0}")]
    Signature(String),

    /// 암호화/복호화 실패
    #[error("암호화 에러: {0}")]
    Crypto(String),

    /// 압축/해제 실패
    #[error("압축 에러: {0}")]
    Compression(String),

    /// 신뢰 서브넷 밖의 요청
    #[error("접근 거부: {0}")]
    Forbidden(String),

    /// 네트워크 연결 에러 (연결 실패)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 연결 이후의 전송 에러 (타임아웃, 본문 읽기 실패 등)
    #[error("전송 에러: {0}")]
    Transport(String),

    /// 2xx가 아닌 응답
    #[error("예상치 못한 응답 ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문
        body: String,
    },

    /// gRPC 호출 실패
    #[error("gRPC 에러: {0}")]
    Rpc(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 메트릭 조회 실패 에러 생성
    pub fn metric_not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource_type: "Metric".to_string(),
            id: id.into(),
        }
    }

    /// 저장소 재시도 대상 여부
    ///
    /// 수집 서비스의 재시도 루프는 이 판정만 사용한다.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientStorage(_))
    }

    /// 클라이언트 입력 문제로 인한 에러 여부 (재시도 없이 4xx로 응답)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidMetric { .. }
                | CoreError::MissingId
                | CoreError::KindConflict { .. }
                | CoreError::Serialization(_)
        )
    }
}
