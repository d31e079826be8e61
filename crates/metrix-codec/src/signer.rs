//! HMAC-SHA256 서명.
//!
//! 서명 대상은 압축된 바이트이며, 결과는 소문자 hex로 헤더/메타데이터에 실린다.

use hmac::{Hmac, Mac};
use metrix_core::error::CoreError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 공유 키 기반 서명기
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    /// 공유 키로 서명기 생성
    pub fn new(key: &str) -> Result<Self, CoreError> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| CoreError::Config(format!("서명 키 초기화 실패: {e}")))?;
        Ok(Self { mac })
    }

    /// 빈 키는 서명 비활성으로 취급
    pub fn from_optional(key: Option<&str>) -> Result<Option<Self>, CoreError> {
        match key {
            Some(k) if !k.is_empty() => Self::new(k).map(Some),
            _ => Ok(None),
        }
    }

    /// 서명 생성 (hex)
    pub fn sign(&self, data: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }

    /// 서명 검증 (상수 시간 비교)
    pub fn verify(&self, data: &[u8], signature: &str) -> Result<(), CoreError> {
        let tag = hex::decode(signature.trim())
            .map_err(|e| CoreError::Signature(format!("서명 형식 오류: {e}")))?;

        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_slice(&tag)
            .map_err(|_| CoreError::Signature("서명 불일치".to_string()))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn sign_then_verify() {
        let signer = Signer::new("secret").unwrap();
        let sig = signer.sign(b"payload");
        assert_eq!(sig.len(), 64);
        assert!(signer.verify(b"payload", &sig).is_ok());
    }

    #[test]
    fn known_vector() {
        // RFC 4231 테스트 케이스 2
        let signer = Signer::new("Jefe").unwrap();
        assert_eq!(
            signer.sign(b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn tampered_data_is_rejected() {
        let signer = Signer::new("secret").unwrap();
        let sig = signer.sign(b"payload");
        assert_matches!(signer.verify(b"paylOad", &sig), Err(CoreError::Signature(_)));
    }

    #[test]
    fn other_key_is_rejected() {
        let sig = Signer::new("a").unwrap().sign(b"payload");
        assert!(Signer::new("b").unwrap().verify(b"payload", &sig).is_err());
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        let signer = Signer::new("secret").unwrap();
        assert_matches!(signer.verify(b"payload", "zz"), Err(CoreError::Signature(_)));
    }

    #[test]
    fn empty_key_disables_signing() {
        assert!(Signer::from_optional(Some("")).unwrap().is_none());
        assert!(Signer::from_optional(None).unwrap().is_none());
        assert!(Signer::from_optional(Some("k")).unwrap().is_some());
    }
}
