//! 압축 포트.
//!
//! 구현: `metrix-codec` crate (flate2 gzip)

use crate::error::CoreError;

/// 압축 알고리즘 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    /// gzip (flate2)
    Gzip,
}

impl CompressionAlgorithm {
    /// `Content-Encoding` 헤더 값
    pub fn content_encoding(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Gzip => "gzip",
        }
    }
}

/// 데이터 압축/해제 인터페이스
pub trait Compressor: Send + Sync {
    /// 사용하는 알고리즘
    fn algorithm(&self) -> CompressionAlgorithm;

    /// 데이터 압축
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;

    /// 데이터 해제
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError>;
}
