//! 메트릭 스토리지 (MetricStorage 포트 구현).
//!
//! ID당 한 행. 종류 검사 후 `ON CONFLICT(id) DO UPDATE`로 병합한다.
//! gauge는 교체, counter는 `metrics.delta + excluded.delta`.

use async_trait::async_trait;
use metrix_core::error::CoreError;
use metrix_core::models::metric::{Metric, MetricKind};
use metrix_core::ports::storage::{Liveness, MetricStorage};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{classify, SqliteStorage};

const UPSERT_SQL: &str = "
    INSERT INTO metrics (id, kind, delta, value, hash, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
    ON CONFLICT(id) DO UPDATE SET
        delta = CASE WHEN excluded.kind = 'counter'
                     THEN COALESCE(metrics.delta, 0) + excluded.delta
                     ELSE NULL END,
        value = CASE WHEN excluded.kind = 'gauge' THEN excluded.value ELSE NULL END,
        hash = excluded.hash,
        updated_at = excluded.updated_at
    WHERE metrics.kind = excluded.kind
    RETURNING id, kind, delta, value, hash";

type MetricRow = (String, String, Option<i64>, Option<f64>, Option<String>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn row_to_metric(row: MetricRow) -> Result<Metric, CoreError> {
    let (id, kind, delta, value, hash) = row;
    let kind: MetricKind = kind
        .parse()
        .map_err(|_| CoreError::Storage(format!("알 수 없는 종류가 저장됨 {id}: {kind}")))?;
    Ok(Metric {
        id,
        kind,
        delta,
        value,
        hash,
    })
}

/// 트랜잭션 안에서 메트릭 하나 병합
///
/// 종류 충돌과 counter 오버플로는 쓰기 전에 확인한다. SQLite 정수 오버플로는 REAL로 바뀌기 때문이다.
fn upsert_in(conn: &Connection, metric: &Metric) -> Result<Metric, CoreError> {
    let existing: Option<(String, Option<i64>)> = conn
        .query_row(
            "SELECT kind, delta FROM metrics WHERE id = ?1",
            params![metric.id],
            |row| -> rusqlite::Result<(String, Option<i64>)> { Ok((row.get(0)?, row.get(1)?)) },
        )
        .optional()
        .map_err(|e| classify("메트릭 조회", e))?;

    if let Some((stored_kind, stored_delta)) = existing {
        if stored_kind != metric.kind.as_str() {
            return Err(CoreError::KindConflict {
                id: metric.id.clone(),
                stored: stored_kind,
                received: metric.kind.to_string(),
            });
        }
        if let (Some(current), Some(added)) = (stored_delta, metric.delta) {
            if current.checked_add(added).is_none() {
                return Err(CoreError::InvalidMetric {
                    id: metric.id.clone(),
                    reason: format!("counter 오버플로: {current} + {added}"),
                });
            }
        }
    }

    let row: MetricRow = conn
        .query_row(
            UPSERT_SQL,
            params![
                metric.id,
                metric.kind.as_str(),
                metric.delta,
                metric.value,
                metric.hash,
            ],
            read_row,
        )
        .map_err(|e| classify("메트릭 upsert", e))?;

    row_to_metric(row)
}

#[async_trait]
impl MetricStorage for SqliteStorage {
    async fn upsert(&self, metric: &Metric) -> Result<Metric, CoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| classify("트랜잭션 시작", e))?;
        let stored = upsert_in(&tx, metric)?;
        tx.commit().map_err(|e| classify("트랜잭션 커밋", e))?;

        debug!(id = %stored.id, kind = %stored.kind, "메트릭 upsert");
        Ok(stored)
    }

    async fn upsert_batch(&self, metrics: &[Metric]) -> Result<(), CoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| classify("트랜잭션 시작", e))?;

        // 실패 시 tx drop으로 롤백
        for metric in metrics {
            upsert_in(&tx, metric)?;
        }

        tx.commit().map_err(|e| classify("트랜잭션 커밋", e))?;
        debug!(count = metrics.len(), "메트릭 배치 upsert");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Metric, CoreError> {
        let conn = self.lock()?;
        let row: Option<MetricRow> = conn
            .query_row(
                "SELECT id, kind, delta, value, hash FROM metrics WHERE id = ?1",
                params![id],
                read_row,
            )
            .optional()
            .map_err(|e| classify("메트릭 조회", e))?;

        match row {
            Some(row) => row_to_metric(row),
            None => Err(CoreError::metric_not_found(id)),
        }
    }

    async fn get_all(&self) -> Result<Vec<Metric>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, kind, delta, value, hash FROM metrics")
            .map_err(|e| classify("쿼리 준비", e))?;

        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| classify("메트릭 목록 조회", e))?;

        let mut result = Vec::new();
        for row in rows {
            let row: MetricRow = row.map_err(|e| classify("행 읽기", e))?;
            result.push(row_to_metric(row)?);
        }
        Ok(result)
    }

    fn liveness(&self) -> Option<&dyn Liveness> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn counter_accumulates_in_database() {
        let storage = storage();
        storage.upsert(&Metric::counter("hits", 3)).await.unwrap();
        let stored = storage.upsert(&Metric::counter("hits", 4)).await.unwrap();
        assert_eq!(stored.delta, Some(7));
        assert_eq!(storage.get("hits").await.unwrap().delta, Some(7));
    }

    #[tokio::test]
    async fn gauge_is_replaced() {
        let storage = storage();
        storage.upsert(&Metric::gauge("temp", 10.0)).await.unwrap();
        let stored = storage.upsert(&Metric::gauge("temp", 25.5)).await.unwrap();
        assert_eq!(stored, Metric::gauge("temp", 25.5));
    }

    #[tokio::test]
    async fn kind_conflict_keeps_row() {
        let storage = storage();
        storage.upsert(&Metric::counter("hits", 3)).await.unwrap();
        let result = storage.upsert(&Metric::gauge("hits", 1.0)).await;
        assert_matches!(result, Err(CoreError::KindConflict { .. }));
        assert_eq!(storage.get("hits").await.unwrap(), Metric::counter("hits", 3));
    }

    #[tokio::test]
    async fn batch_is_atomic() {
        let storage = storage();
        storage.upsert(&Metric::gauge("temp", 1.0)).await.unwrap();

        let result = storage
            .upsert_batch(&[
                Metric::counter("hits", 1),
                Metric::counter("hits", 2),
                Metric::counter("temp", 1),
            ])
            .await;
        assert!(result.is_err());
        assert_matches!(storage.get("hits").await, Err(CoreError::NotFound { .. }));

        storage
            .upsert_batch(&[Metric::counter("hits", 1), Metric::counter("hits", 2)])
            .await
            .unwrap();
        assert_eq!(storage.get("hits").await.unwrap().delta, Some(3));
    }

    #[tokio::test]
    async fn overflow_is_rejected_before_write() {
        let storage = storage();
        storage.upsert(&Metric::counter("big", i64::MAX)).await.unwrap();
        assert!(storage.upsert(&Metric::counter("big", 1)).await.is_err());
        assert_eq!(storage.get("big").await.unwrap().delta, Some(i64::MAX));
    }

    #[tokio::test]
    async fn hash_is_stored() {
        let storage = storage();
        let mut metric = Metric::gauge("temp", 1.0);
        metric.hash = Some("abc".to_string());
        storage.upsert(&metric).await.unwrap();
        assert_eq!(storage.get("temp").await.unwrap().hash.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn get_all_and_liveness() {
        let storage = storage();
        storage
            .upsert_batch(&[Metric::gauge("a", 1.0), Metric::counter("b", 2)])
            .await
            .unwrap();
        assert_eq!(storage.get_all().await.unwrap().len(), 2);

        let liveness = storage.liveness().unwrap();
        assert!(liveness.ping().await.is_ok());
    }
}
