//! 코덱 파이프라인.
//!
//! 인코더와 디코더는 서로 정확한 거울상이다. 암호화/서명을 끄는 것은
//! 양쪽에서 해당 단계를 생략하는 것과 완전히 같다.

use metrix_core::error::CoreError;
use metrix_core::ports::compressor::Compressor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::compression::GzipCompressor;
use crate::crypto::{HybridDecryptor, HybridEncryptor};
use crate::signer::Signer;

/// 전송 직전의 페이로드
///
/// 전송 시도마다 만들어지고 호출이 끝나면 버려진다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// 압축된 (필요 시 암호화된) 본문
    pub payload: Vec<u8>,
    /// 압축 바이트에 대한 HMAC (hex)
    pub signature: Option<String>,
}

/// 송신 측 인코더
#[derive(Debug, Clone, Default)]
pub struct PayloadEncoder {
    compressor: GzipCompressor,
    encryptor: Option<HybridEncryptor>,
    signer: Option<Signer>,
}

impl PayloadEncoder {
    /// 보안 단계 없는 인코더
    pub fn new() -> Self {
        Self::default()
    }

    /// 서명 단계 추가
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    /// 암호화 단계 추가
    pub fn with_encryptor(mut self, encryptor: HybridEncryptor) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// 값 하나를 봉투로 인코딩
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Envelope, CoreError> {
        let mut bytes = serde_json::to_vec(value)?;

        if let Some(encryptor) = &self.encryptor {
            bytes = encryptor.encrypt(&bytes)?;
        }

        let payload = self.compressor.compress(&bytes)?;
        let signature = self.signer.as_ref().map(|s| s.sign(&payload));

        debug!(
            raw = bytes.len(),
            compressed = payload.len(),
            signed = signature.is_some(),
            "페이로드 인코딩"
        );

        Ok(Envelope { payload, signature })
    }
}

/// 수신 측 디코더
///
/// 단계별 메서드를 따로 노출하여 HTTP 미들웨어와 gRPC 가드가 같은 순서로 조합할 수 있게 한다.
#[derive(Debug, Clone, Default)]
pub struct PayloadDecoder {
    compressor: GzipCompressor,
    decryptor: Option<HybridDecryptor>,
    signer: Option<Signer>,
}

impl PayloadDecoder {
    /// 보안 단계 없는 디코더
    pub fn new() -> Self {
        Self::default()
    }

    /// 서명 검증 단계 추가
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    /// 복호화 단계 추가
    pub fn with_decryptor(mut self, decryptor: HybridDecryptor) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// 서명 검증이 켜져 있는지
    pub fn requires_signature(&self) -> bool {
        self.signer.is_some()
    }

    /// 1단계: 압축 바이트의 서명 검증
    ///
    /// 키가 없으면 통과. 키가 있는데 서명이 없으면 거부.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), CoreError> {
        let Some(signer) = &self.signer else {
            return Ok(());
        };

        match signature.map(str::trim).filter(|s| !s.is_empty()) {
            Some(sig) => signer.verify(body, sig),
            None => Err(CoreError::Signature("서명 누락".to_string())),
        }
    }

    /// 2단계: gzip 해제
    pub fn decompress(&self, body: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.compressor.decompress(body)
    }

    /// 3단계: 복호화 (개인키가 없으면 그대로 반환)
    pub fn decrypt(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CoreError> {
        match &self.decryptor {
            Some(decryptor) => decryptor.decrypt(&bytes),
            None => Ok(bytes),
        }
    }

    /// 서명 검증 이후 단계 (압축 해제 → 복호화)
    ///
    /// 단건 갱신처럼 압축이 선택적인 경로는 `compressed`로 해제 여부를 정한다.
    pub fn unwrap_payload(&self, body: &[u8], compressed: bool) -> Result<Vec<u8>, CoreError> {
        let bytes = if compressed {
            self.decompress(body)?
        } else {
            body.to_vec()
        };
        self.decrypt(bytes)
    }

    /// 전체 디코딩 (검증 → 해제 → 복호화 → 역직렬화)
    pub fn decode<T: DeserializeOwned>(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<T, CoreError> {
        self.verify(body, signature)?;
        let bytes = self.unwrap_payload(body, true)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 응답 본문 서명 (서명 키가 있을 때만)
    pub fn sign_response(&self, body: &[u8]) -> Option<String> {
        self.signer.as_ref().map(|s| s.sign(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use metrix_core::models::metric::{Batch, Metric};

    fn batch() -> Batch {
        vec![Metric::gauge("Alloc", 1024.5), Metric::counter("PollCount", 7)]
    }

    #[test]
    fn plain_roundtrip() {
        let envelope = PayloadEncoder::new().encode(&batch()).unwrap();
        assert!(envelope.signature.is_none());
        let decoded: Batch = PayloadDecoder::new().decode(&envelope.payload, None).unwrap();
        assert_eq!(decoded, batch());
    }

    #[test]
    fn signature_covers_compressed_bytes() {
        let signer = Signer::new("secret").unwrap();
        let envelope = PayloadEncoder::new()
            .with_signer(signer.clone())
            .encode(&batch())
            .unwrap();
        let sig = envelope.signature.clone().unwrap();
        assert_eq!(sig, signer.sign(&envelope.payload));
    }

    #[test]
    fn missing_signature_rejected_when_key_configured() {
        let envelope = PayloadEncoder::new().encode(&batch()).unwrap();
        let decoder = PayloadDecoder::new().with_signer(Signer::new("secret").unwrap());
        assert_matches!(
            decoder.decode::<Batch>(&envelope.payload, None),
            Err(CoreError::Signature(_))
        );
    }

    #[test]
    fn unsigned_server_accepts_signed_request() {
        let envelope = PayloadEncoder::new()
            .with_signer(Signer::new("secret").unwrap())
            .encode(&batch())
            .unwrap();
        let decoded: Batch = PayloadDecoder::new()
            .decode(&envelope.payload, envelope.signature.as_deref())
            .unwrap();
        assert_eq!(decoded, batch());
    }

    #[test]
    fn uncompressed_single_metric_body() {
        let body = serde_json::to_vec(&Metric::counter("hits", 1)).unwrap();
        let bytes = PayloadDecoder::new().unwrap_payload(&body, false).unwrap();
        assert_eq!(bytes, body);
    }

    #[test]
    fn response_signing_follows_key() {
        assert!(PayloadDecoder::new().sign_response(b"{}").is_none());
        let decoder = PayloadDecoder::new().with_signer(Signer::new("k").unwrap());
        assert!(decoder.requires_signature());
        assert_eq!(decoder.sign_response(b"{}").map(|s| s.len()), Some(64));
    }
}
