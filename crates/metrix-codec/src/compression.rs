//! gzip 압축 어댑터.
//!
//! `Compressor` 포트 구현. 전송 지연을 줄이기 위해 가장 빠른 압축 레벨을 쓴다.

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use metrix_core::error::CoreError;
use metrix_core::ports::compressor::{CompressionAlgorithm, Compressor};
use std::io::Read;

/// gzip 압축기
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// 가장 빠른 레벨의 압축기 생성
    pub fn new() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Gzip
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut encoder = GzEncoder::new(data, self.level);
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| CoreError::Compression(format!("gzip 압축 실패: {e}")))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CoreError::Compression(format!("gzip 해제 실패: {e}")))?;
        Ok(decompressed)
    }
}
