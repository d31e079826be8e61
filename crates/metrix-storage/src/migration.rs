//! 스키마 마이그레이션.
//!
//! 단계 목록을 순서대로 적용한다. 각 단계는 트랜잭션 하나 안에서 스키마 변경과 버전 기록을 함께 커밋한다.

use rusqlite::Connection;
use tracing::{debug, info};

/// 마이그레이션 단계 (버전, 설명, SQL)
const STEPS: &[(u32, &str, &str)] = &[
    (
        1,
        "metrics 테이블 (ID당 한 행)",
        "CREATE TABLE IF NOT EXISTS metrics (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('gauge', 'counter')),
            delta INTEGER,
            value REAL,
            hash TEXT
        );",
    ),
    (
        2,
        "updated_at 컬럼",
        "ALTER TABLE metrics ADD COLUMN updated_at TEXT;
         UPDATE metrics SET updated_at = datetime('now');",
    ),
];

/// 최신 스키마 버전
pub fn latest_version() -> u32 {
    STEPS.last().map(|(v, _, _)| *v).unwrap_or(0)
}

/// 적용되지 않은 단계를 모두 적용
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = applied_version(conn)?;
    let pending: Vec<_> = STEPS.iter().filter(|(v, _, _)| *v > applied).collect();
    if pending.is_empty() {
        debug!("스키마 최신 상태: v{applied}");
        return Ok(());
    }

    for (version, description, sql) in pending {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
        info!("스키마 v{version} 적용: {description}");
    }
    Ok(())
}

fn applied_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_exists(conn: &Connection, column: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('metrics') WHERE name = ?1",
            [column],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn fresh_database_reaches_latest() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert!(column_exists(&conn, "kind"));
        assert!(column_exists(&conn, "updated_at"));
        assert_eq!(applied_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn rerun_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, STEPS.len() as i64);
    }

    #[test]
    fn v1_database_is_upgraded_with_data() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .unwrap();
        conn.execute_batch(STEPS[0].2).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO metrics (id, kind, delta) VALUES ('hits', 'counter', 3)",
            [],
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let updated_at: Option<String> = conn
            .query_row("SELECT updated_at FROM metrics WHERE id = 'hits'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(updated_at.is_some());
    }
}
