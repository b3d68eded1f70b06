// SQLite-backed cache store for per-instrument price tables. The external
// retrieval collaborator writes through this interface; the analysis run
// only reads. Freshness is explicit: every series carries a cached_at
// timestamp checked against a max age.
use crate::model::{RawBar, RawSeries, StorageError};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and runs migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS series_meta (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bars (
                code TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume REAL,
                amount REAL,
                PRIMARY KEY (code, trade_date)
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Upserts a whole series and stamps its metadata with the current time.
    pub fn save_series(&self, code: &str, series: &RawSeries) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO series_meta (code, name, cached_at) VALUES (?1, ?2, ?3)",
            params![code, &series.name, Utc::now().to_rfc3339()],
        )?;

        for bar in &series.bars {
            self.conn.execute(
                "INSERT OR REPLACE INTO bars (
                    code, trade_date, open, high, low, close, volume, amount
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    code, &bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume,
                    bar.amount,
                ],
            )?;
        }
        Ok(())
    }

    /// Loads a cached series, bars ordered by trade date.
    pub fn load_series(&self, code: &str) -> Result<RawSeries, StorageError> {
        let name: String = self
            .conn
            .query_row(
                "SELECT name FROM series_meta WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StorageError::NotFound(code.to_string()),
                other => StorageError::Database(other),
            })?;

        let mut stmt = self.conn.prepare(
            "SELECT trade_date, open, high, low, close, volume, amount
             FROM bars WHERE code = ?1 ORDER BY trade_date",
        )?;
        let rows = stmt.query_map(params![code], |row| {
            Ok(RawBar {
                date: row.get(0)?,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: row.get(5)?,
                amount: row.get(6)?,
            })
        })?;

        let mut bars = Vec::new();
        for bar in rows {
            bars.push(bar?);
        }

        Ok(RawSeries { name, bars })
    }

    /// Whether the cached series is younger than `max_age`. A missing series
    /// counts as stale.
    pub fn is_fresh(&self, code: &str, max_age: Duration) -> Result<bool, StorageError> {
        let cached_at: Option<String> = self
            .conn
            .query_row(
                "SELECT cached_at FROM series_meta WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StorageError::Database(other)),
            })?;

        let Some(cached_at) = cached_at else {
            return Ok(false);
        };
        let Ok(cached_at) = DateTime::parse_from_rfc3339(&cached_at) else {
            return Ok(false);
        };
        Ok(Utc::now() - cached_at.with_timezone(&Utc) <= max_age)
    }

    /// All cached instruments as (code, name) pairs.
    pub fn list_cached(&self) -> Result<Vec<(String, String)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT code, name FROM series_meta ORDER BY code")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_series() -> RawSeries {
        RawSeries {
            name: "BYD".into(),
            bars: vec![
                RawBar {
                    date: "20240102".into(),
                    close: Some(101.0),
                    volume: Some(1100.0),
                    ..RawBar::default()
                },
                RawBar {
                    date: "20240101".into(),
                    close: Some(100.0),
                    volume: Some(1000.0),
                    ..RawBar::default()
                },
            ],
        }
    }

    #[test]
    fn save_and_load_roundtrip_orders_by_date() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage.save_series("002594.SZ", &sample_series()).unwrap();

        let loaded = storage.load_series("002594.SZ").unwrap();
        assert_eq!(loaded.name, "BYD");
        assert_eq!(loaded.bars.len(), 2);
        assert_eq!(loaded.bars[0].date, "20240101");
        assert_eq!(loaded.bars[0].close, Some(100.0));
        assert_eq!(loaded.bars[1].volume, Some(1100.0));
    }

    #[test]
    fn missing_series_is_not_found() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        assert!(matches!(
            storage.load_series("nope"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn saved_series_is_fresh_and_missing_one_is_stale() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage.save_series("002594.SZ", &sample_series()).unwrap();

        assert!(storage.is_fresh("002594.SZ", Duration::days(1)).unwrap());
        assert!(!storage.is_fresh("missing", Duration::days(1)).unwrap());
    }

    #[test]
    fn backdated_series_is_stale() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage.save_series("002594.SZ", &sample_series()).unwrap();
        storage
            .conn
            .execute(
                "UPDATE series_meta SET cached_at = ?1 WHERE code = ?2",
                params![(Utc::now() - Duration::days(3)).to_rfc3339(), "002594.SZ"],
            )
            .unwrap();

        assert!(!storage.is_fresh("002594.SZ", Duration::days(1)).unwrap());
    }

    #[test]
    fn list_cached_returns_codes_and_names() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage.save_series("002594.SZ", &sample_series()).unwrap();
        let cached = storage.list_cached().unwrap();
        assert_eq!(cached, vec![("002594.SZ".to_string(), "BYD".to_string())]);
    }
}
