use crate::error::DataError;
use confluence_core::{CoverageReport, CoverageStatus, OHLCVBar, Symbol, Timeframe};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use std::sync::Arc;
use tracing::warn;

/// Outcome of a single `append` call.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct InsertStats {
    pub inserted: u64,
    pub duplicates_ignored: u64,
}

/// SQLite-backed OHLCV store: one table per `(symbol, timeframe)` for write
/// locality and cheap drop-for-repair, grounded on the schema/pragma style
/// of `cooprefr-bettersys`'s `DbSignalStorage` — WAL mode, a single
/// `parking_lot::Mutex`-guarded connection, `prepare_cached` statements.
/// Single-writer per `(symbol, timeframe)`; reads never error, per §4.1.
#[derive(Clone)]
pub struct TimeSeriesStore {
    conn: Arc<Mutex<Connection>>,
}

fn table_name(symbol: &Symbol, timeframe: Timeframe) -> String {
    let sanitized: String = symbol
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("ohlcv_{}_{}", sanitized, timeframe.as_token())
}

impl TimeSeriesStore {
    pub fn open(db_path: &str) -> Result<Self, DataError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, DataError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn ensure_table(conn: &Connection, table: &str) -> Result<(), DataError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                timestamp_ms INTEGER PRIMARY KEY,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL
            ) WITHOUT ROWID;"
        ))?;
        Ok(())
    }

    /// Idempotent on `(symbol, timeframe, timestamp)` — duplicates are
    /// silently dropped.
    pub fn append(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        bars: &[OHLCVBar],
    ) -> Result<InsertStats, DataError> {
        if bars.is_empty() {
            return Ok(InsertStats::default());
        }
        let table = table_name(symbol, timeframe);
        let conn = self.conn.lock();
        Self::ensure_table(&conn, &table)?;

        conn.execute("BEGIN IMMEDIATE", [])?;
        let mut stats = InsertStats::default();
        {
            let mut stmt = conn.prepare_cached(&format!(
                "INSERT OR IGNORE INTO {table}
                 (timestamp_ms, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for bar in bars {
                let changed = stmt.execute(params![
                    bar.timestamp_ms,
                    bar.open.to_string(),
                    bar.high.to_string(),
                    bar.low.to_string(),
                    bar.close.to_string(),
                    bar.volume.to_string(),
                ])?;
                if changed > 0 {
                    stats.inserted += 1;
                } else {
                    stats.duplicates_ignored += 1;
                }
            }
        }
        conn.execute("COMMIT", [])?;
        Ok(stats)
    }

    /// Bars in `[from_ts, to_ts]`, ascending timestamp order. Unknown
    /// `(symbol, timeframe)` pairs return an empty vector, never an error.
    pub fn range(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<OHLCVBar>, DataError> {
        let table = table_name(symbol, timeframe);
        let conn = self.conn.lock();
        if !Self::table_exists(&conn, &table)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT timestamp_ms, open, high, low, close, volume
             FROM {table}
             WHERE timestamp_ms >= ?1 AND timestamp_ms <= ?2
             ORDER BY timestamp_ms ASC"
        ))?;
        let rows = stmt.query_map(params![from_ts, to_ts], Self::row_to_bar)?;
        let mut bars = Vec::new();
        for row in rows {
            match row {
                Ok(bar) => bars.push(bar),
                Err(e) => warn!("dropping malformed bar row: {e}"),
            }
        }
        Ok(bars)
    }

    pub fn last_timestamp(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Option<i64>, DataError> {
        let table = table_name(symbol, timeframe);
        let conn = self.conn.lock();
        if !Self::table_exists(&conn, &table)? {
            return Ok(None);
        }
        let ts: Option<i64> = conn.query_row(
            &format!("SELECT MAX(timestamp_ms) FROM {table}"),
            [],
            |row| row.get(0),
        )?;
        Ok(ts)
    }

    /// Gaps are timestamp deltas exceeding the timeframe's canonical
    /// interval; expected records = `(last_ts - first_ts) / interval + 1`.
    pub fn coverage(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<CoverageReport, DataError> {
        let table = table_name(symbol, timeframe);
        let conn = self.conn.lock();
        if !Self::table_exists(&conn, &table)? {
            return Ok(CoverageReport::empty());
        }

        let records: u64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        if records == 0 {
            return Ok(CoverageReport::empty());
        }

        let mut stmt =
            conn.prepare_cached(&format!("SELECT timestamp_ms FROM {table} ORDER BY timestamp_ms ASC"))?;
        let timestamps: Vec<i64> = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let interval_ms = timeframe.interval_ms();
        let mut gaps = Vec::new();
        let mut duplicates = 0u64;
        for pair in timestamps.windows(2) {
            let delta = pair[1] - pair[0];
            if delta == 0 {
                duplicates += 1;
            } else if delta > interval_ms {
                gaps.push(pair[0]..pair[1]);
            }
        }

        let first_ts = timestamps.first().copied();
        let last_ts = timestamps.last().copied();
        let status = if gaps.is_empty() {
            CoverageStatus::Complete
        } else {
            CoverageStatus::Insufficient
        };

        Ok(CoverageReport {
            records,
            first_ts,
            last_ts,
            gaps,
            duplicates,
            status,
        })
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool, DataError> {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(exists > 0)
    }

    fn row_to_bar(row: &rusqlite::Row) -> rusqlite::Result<OHLCVBar> {
        let timestamp_ms: i64 = row.get(0)?;
        let parse = |s: String| -> rusqlite::Result<rust_decimal::Decimal> {
            s.parse()
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        };
        let open = parse(row.get(1)?)?;
        let high = parse(row.get(2)?)?;
        let low = parse(row.get(3)?)?;
        let close = parse(row.get(4)?)?;
        let volume = parse(row.get(5)?)?;
        Ok(OHLCVBar {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}
