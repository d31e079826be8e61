//! 파일 기반 저장소.
//!
//! 메모리 저장소와 같은 맵을 쓰고, 변경이 성공할 때마다 전체 스냅샷을 JSON 파일로 기록한다.
//! 기록에 실패하면 메모리 상태도 바뀌지 않는다.
//!
//! 파일 기록은 블로킹 풀에서 돌린다. 맵 잠금은 기록이 끝날 때까지 유지되므로
//! 스냅샷이 파일에 쓰이는 순서는 변경 순서와 같다.

use async_trait::async_trait;
use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use metrix_core::ports::storage::MetricStorage;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::merge;

/// 파일 기반 저장소
#[derive(Debug)]
pub struct FileStorage {
    path: Arc<PathBuf>,
    metrics: Mutex<HashMap<String, Metric>>,
}

impl FileStorage {
    /// 저장 파일 열기
    ///
    /// 상위 디렉토리와 파일이 없으면 만든다. `restore`가 참이면 기존 내용을 불러온다.
    pub fn open(path: impl Into<PathBuf>, restore: bool) -> Result<Self, CoreError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error("디렉토리 생성", &path, e))?;
        }
        if !path.exists() {
            std::fs::write(&path, b"").map_err(|e| io_error("파일 생성", &path, e))?;
        }

        let metrics = if restore {
            let loaded = load_snapshot(&path)?;
            info!(count = loaded.len(), "파일 저장소 복원: {}", path.display());
            loaded
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: Arc::new(path),
            metrics: Mutex::new(metrics),
        })
    }

    /// 변경 적용 → 파일 기록 → 메모리 반영
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Metric>) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut map = self.metrics.lock().await;
        let mut next = map.clone();
        let result = f(&mut next)?;

        let json = encode_snapshot(&next)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &json))
            .await
            .map_err(|e| CoreError::Storage(format!("파일 기록 태스크 실패: {e}")))??;

        debug!(count = next.len(), "파일 저장소 기록");
        *map = next;
        Ok(result)
    }
}

#[async_trait]
impl MetricStorage for FileStorage {
    async fn upsert(&self, metric: &Metric) -> Result<Metric, CoreError> {
        self.mutate(|map| merge::apply_one(map, metric)).await
    }

    async fn upsert_batch(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        self.mutate(|map| merge::apply_batch(map, metrics)).await
    }

    async fn get(&self, id: &str) -> Result<Metric, CoreError> {
        self.metrics
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::metric_not_found(id))
    }

    async fn get_all(&self) -> Result<Vec<Metric>, CoreError> {
        Ok(self.metrics.lock().await.values().cloned().collect())
    }
}

fn load_snapshot(path: &Path) -> Result<HashMap<String, Metric>, CoreError> {
    let raw = std::fs::read(path).map_err(|e| io_error("파일 읽기", path, e))?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }

    let metrics: Vec<Metric> = serde_json::from_slice(&raw)
        .map_err(|e| CoreError::Storage(format!("저장 파일 파싱 실패 {}: {e}", path.display())))?;
    Ok(metrics.into_iter().map(|m| (m.id.clone(), m)).collect())
}

/// ID 순으로 정렬한 JSON 배열
fn encode_snapshot(map: &HashMap<String, Metric>) -> Result<Vec<u8>, CoreError> {
    let mut metrics: Vec<&Metric> = map.values().collect();
    metrics.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(serde_json::to_vec_pretty(&metrics)?)
}

/// 임시 파일에 쓴 뒤 교체
fn write_snapshot(path: &Path, json: &[u8]) -> Result<(), CoreError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).map_err(|e| io_error("임시 파일 기록", &tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error("파일 교체", path, e))
}

/// 권한/타임아웃 계열은 일시적 에러로 분류
fn io_error(action: &str, path: &Path, e: std::io::Error) -> CoreError {
    let message = format!("{action} 실패 {}: {e}", path.display());
    match e.kind() {
        ErrorKind::PermissionDenied
        | ErrorKind::TimedOut
        | ErrorKind::WouldBlock
        | ErrorKind::Interrupted => CoreError::TransientStorage(message),
        _ => CoreError::Storage(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn creates_parent_directories_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/metrics.json");
        let storage = FileStorage::open(&path, true).unwrap();
        assert!(path.exists());
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_reloads_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        {
            let storage = FileStorage::open(&path, false).unwrap();
            storage.upsert(&Metric::counter("hits", 3)).await.unwrap();
            storage
                .upsert_batch(&[Metric::counter("hits", 4), Metric::gauge("temp", 25.5)])
                .await
                .unwrap();
        }

        let restored = FileStorage::open(&path, true).unwrap();
        assert_eq!(restored.get("hits").await.unwrap().delta, Some(7));
        assert_eq!(restored.get("temp").await.unwrap().value, Some(25.5));

        let fresh = FileStorage::open(&path, false).unwrap();
        assert!(fresh.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let storage = FileStorage::open(&path, false).unwrap();
        storage.upsert(&Metric::gauge("temp", 1.0)).await.unwrap();

        let result = storage
            .upsert_batch(&[Metric::counter("hits", 1), Metric::counter("temp", 1)])
            .await;
        assert_matches!(result, Err(CoreError::KindConflict { .. }));

        let restored = FileStorage::open(&path, true).unwrap();
        assert_eq!(restored.get_all().await.unwrap(), vec![Metric::gauge("temp", 1.0)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_leave_consistent_file() {
        const WRITERS: i64 = 8;
        const ROUNDS: i64 = 25;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let storage = Arc::new(FileStorage::open(&path, false).unwrap());

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    for _ in 0..ROUNDS {
                        storage.upsert(&Metric::counter("hits", 1)).await.unwrap();
                        storage
                            .upsert(&Metric::gauge(format!("g{w}"), w as f64))
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut in_memory = storage.get_all().await.unwrap();
        in_memory.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(
            in_memory.iter().find(|m| m.id == "hits").unwrap().delta,
            Some(WRITERS * ROUNDS)
        );

        // 마지막 기록이 메모리 상태와 같아야 한다
        let restored = FileStorage::open(&path, true).unwrap();
        let mut on_disk = restored.get_all().await.unwrap();
        on_disk.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(on_disk, in_memory);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn unwritable_path_keeps_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let storage = FileStorage::open(&path, false).unwrap();
        storage.upsert(&Metric::gauge("temp", 1.0)).await.unwrap();

        // 파일 자리를 디렉토리로 바꿔 교체가 실패하게 만든다
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(storage.upsert(&Metric::gauge("temp", 2.0)).await.is_err());
        assert_eq!(storage.get("temp").await.unwrap().value, Some(1.0));
    }

    #[test]
    fn corrupt_file_fails_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert_matches!(FileStorage::open(&path, true), Err(CoreError::Storage(_)));
    }

    #[test]
    fn permission_errors_are_transient() {
        let err = io_error(
            "파일 기록",
            Path::new("/x"),
            std::io::Error::from(ErrorKind::PermissionDenied),
        );
        assert!(err.is_transient());
        let err = io_error("파일 기록", Path::new("/x"), std::io::Error::from(ErrorKind::NotFound));
        assert!(!err.is_transient());
    }
}
