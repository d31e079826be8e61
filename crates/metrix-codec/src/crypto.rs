//! 하이브리드 암호화 (RSA-OAEP-SHA256 + AES-256-GCM).
//!
//! 호출마다 새 AES 키를 만들어 페이로드를 암호화하고, 그 키를 RSA 공개키로 감싼다.
//! 두 조각은 JSON 봉투 `{"aes_key": b64, "data": b64(nonce || ciphertext)}`로 직렬화된다.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use metrix_core::error::CoreError;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;

const NONCE_LEN: usize = 12;
const AES_KEY_LEN: usize = 32;

/// 암호화 봉투 (직렬화 형식)
#[derive(Debug, Serialize, Deserialize)]
struct SealedEnvelope {
    aes_key: String,
    data: String,
}

/// 공개키 기반 암호화기 (에이전트 측)
#[derive(Debug, Clone)]
pub struct HybridEncryptor {
    public_key: RsaPublicKey,
}

impl HybridEncryptor {
    /// 공개키로 생성
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }

    /// PEM 문자열에서 생성 (PKCS#1, 실패 시 SPKI)
    pub fn from_pem(pem: &str) -> Result<Self, CoreError> {
        let public_key = RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map_err(|e| CoreError::Crypto(format!("공개키 파싱 실패: {e}")))?;
        Ok(Self::new(public_key))
    }

    /// PEM 파일에서 생성
    pub fn from_pem_file(path: &Path) -> Result<Self, CoreError> {
        Self::from_pem(&read_pem(path)?)
    }

    /// 평문을 봉투 바이트로 암호화
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        let key = Aes256Gcm::generate_key(OsRng);
        let cipher = Aes256Gcm::new(&key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CoreError::Crypto("AES-GCM 암호화 실패".to_string()))?;

        let wrapped_key = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_slice())
            .map_err(|e| CoreError::Crypto(format!("RSA 키 래핑 실패: {e}")))?;

        let mut data = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        data.extend_from_slice(nonce.as_slice());
        data.extend_from_slice(&ciphertext);

        let envelope = SealedEnvelope {
            aes_key: BASE64.encode(wrapped_key),
            data: BASE64.encode(data),
        };
        Ok(serde_json::to_vec(&envelope)?)
    }
}

/// 개인키 기반 복호화기 (서버 측)
#[derive(Debug, Clone)]
pub struct HybridDecryptor {
    private_key: RsaPrivateKey,
}

impl HybridDecryptor {
    /// 개인키로 생성
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// PEM 문자열에서 생성 (PKCS#1, 실패 시 PKCS#8)
    pub fn from_pem(pem: &str) -> Result<Self, CoreError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| CoreError::Crypto(format!("개인키 파싱 실패: {e}")))?;
        Ok(Self::new(private_key))
    }

    /// PEM 파일에서 생성
    pub fn from_pem_file(path: &Path) -> Result<Self, CoreError> {
        Self::from_pem(&read_pem(path)?)
    }

    /// 봉투 바이트를 평문으로 복호화
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CoreError> {
        let envelope: SealedEnvelope = serde_json::from_slice(sealed)
            .map_err(|e| CoreError::Crypto(format!("암호화 봉투 파싱 실패: {e}")))?;

        if envelope.aes_key.is_empty() || envelope.data.is_empty() {
            return Err(CoreError::Crypto("암호화 봉투 필드가 비어 있음".to_string()));
        }

        let wrapped_key = BASE64
            .decode(&envelope.aes_key)
            .map_err(|e| CoreError::Crypto(format!("aes_key base64 디코딩 실패: {e}")))?;
        let data = BASE64
            .decode(&envelope.data)
            .map_err(|e| CoreError::Crypto(format!("data base64 디코딩 실패: {e}")))?;

        let key_bytes = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), &wrapped_key)
            .map_err(|e| CoreError::Crypto(format!("RSA 키 언래핑 실패: {e}")))?;
        if key_bytes.len() != AES_KEY_LEN {
            return Err(CoreError::Crypto(format!(
                "AES 키 길이 오류: {} bytes",
                key_bytes.len()
            )));
        }

        if data.len() <= NONCE_LEN {
            return Err(CoreError::Crypto("암호문이 너무 짧음".to_string()));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::Crypto("AES-GCM 인증 실패".to_string()))
    }
}

fn read_pem(path: &Path) -> Result<String, CoreError> {
    std::fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("키 파일 읽기 실패 {}: {e}", path.display())))
}
