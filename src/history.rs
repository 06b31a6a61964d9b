use chrono::{DateTime, Datelike, Duration, Local};
use rusqlite::{params, Connection, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::metrics::Tier;

/// One persisted row per successful trial. The core only ever writes
/// these; nothing in trial logic reads them back.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub timestamp: DateTime<Local>,
    pub reaction_time_ms: f64,
    pub tier: Tier,
}

/// Personal bests over calendar windows, mirroring the history panel's
/// summary cards.
#[derive(Debug, Clone, Default)]
pub struct BestSummary {
    pub day: Option<TrialRecord>,
    pub week: Option<TrialRecord>,
    pub month: Option<TrialRecord>,
    pub year: Option<TrialRecord>,
    pub all_time: Option<TrialRecord>,
}

/// Database manager for the trial history
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Opens the default per-user database, creating the schema if
    /// needed. Callers treat a failure as "no history" and carry on.
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("refleks_history.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS trial_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                reaction_time_ms REAL NOT NULL,
                tier TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trial_history_timestamp ON trial_history(timestamp)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    /// Record one successful trial
    pub fn record(&self, record: &TrialRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO trial_history (timestamp, reaction_time_ms, tier)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                record.timestamp.to_rfc3339(),
                record.reaction_time_ms,
                record.tier.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Most recent trials, newest first. Rows with unparsable
    /// timestamps are dropped rather than failing the load.
    pub fn recent(&self, limit: usize) -> Result<Vec<TrialRecord>> {
        self.query(limit.min(i64::MAX as usize) as i64)
    }

    /// The entire history, newest first.
    pub fn all(&self) -> Result<Vec<TrialRecord>> {
        // A negative LIMIT disables it in SQLite
        self.query(-1)
    }

    fn query(&self, limit: i64) -> Result<Vec<TrialRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, reaction_time_ms, tier FROM trial_history
             ORDER BY timestamp DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let timestamp: String = row.get(0)?;
            let reaction_time_ms: f64 = row.get(1)?;
            let tier: String = row.get(2)?;
            Ok((timestamp, reaction_time_ms, tier))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, reaction_time_ms, tier) = row?;
            match DateTime::parse_from_rfc3339(&timestamp) {
                Ok(ts) => records.push(TrialRecord {
                    timestamp: ts.with_timezone(&Local),
                    reaction_time_ms,
                    tier: Tier::from_label(&tier),
                }),
                Err(e) => {
                    warn!(row_timestamp = %timestamp, error = %e, "dropping corrupt history row");
                }
            }
        }
        Ok(records)
    }

    /// Fastest reaction per calendar window relative to `now`.
    pub fn bests(&self, now: DateTime<Local>) -> Result<BestSummary> {
        let all = self.all()?;

        let best_of = |records: Vec<&TrialRecord>| -> Option<TrialRecord> {
            records
                .into_iter()
                .min_by(|a, b| {
                    a.reaction_time_ms
                        .partial_cmp(&b.reaction_time_ms)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned()
        };

        let same_day = |r: &&TrialRecord| {
            r.timestamp.date_naive() == now.date_naive()
        };
        let same_week =
            |r: &&TrialRecord| (now - r.timestamp).abs() < Duration::days(7);
        let same_month = |r: &&TrialRecord| {
            r.timestamp.month() == now.month() && r.timestamp.year() == now.year()
        };
        let same_year = |r: &&TrialRecord| r.timestamp.year() == now.year();

        Ok(BestSummary {
            day: best_of(all.iter().filter(same_day).collect()),
            week: best_of(all.iter().filter(same_week).collect()),
            month: best_of(all.iter().filter(same_month).collect()),
            year: best_of(all.iter().filter(same_year).collect()),
            all_time: best_of(all.iter().collect()),
        })
    }

    /// Wipe the history
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM trial_history", [])?;
        Ok(())
    }

    /// Appends the full history to a CSV file, emitting a header when
    /// the file is new.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let records = self
            .all()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let needs_header = !path.as_ref().exists();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)?;

        if needs_header {
            writeln!(file, "date,reaction_time_ms,tier")?;
        }
        for r in records {
            writeln!(
                file,
                "{},{:.1},{}",
                r.timestamp.format("%c"),
                r.reaction_time_ms,
                r.tier,
            )?;
        }
        Ok(())
    }
}
