//! SQLite persistence layer: settings source, completion history and the
//! focus tip cache.

use crate::models::{CompletedInterval, DailyFocus, Mode, Preferences, Settings};
use chrono::{Days, NaiveDate};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const SETTINGS_KEY: &str = "config";
const PREFERENCES_KEY: &str = "preferences";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens the database in the platform data directory, creating it if needed.
    pub fn new() -> Result<Self, DatabaseError> {
        let db_path = Self::db_path();

        // Ensure directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| DatabaseError::DirectoryCreation)?;
        }

        Self::open(&db_path)
    }

    /// Opens (or creates) a database file at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS completed_intervals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mode TEXT NOT NULL,
                duration_mins INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                completed_date TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_completed_date
                ON completed_intervals (completed_date);

            CREATE TABLE IF NOT EXISTS focus_tips (
                date TEXT PRIMARY KEY,
                tip TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    fn db_path() -> PathBuf {
        ProjectDirs::from("com", "pomocycle", "Pomocycle")
            .map(|dirs| dirs.data_dir().join("pomocycle.db"))
            .unwrap_or_else(|| PathBuf::from("pomocycle.db"))
    }

    fn load_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save_value(&self, key: &str, json: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            [key, json],
        )?;
        Ok(())
    }

    /// Loads timing settings, falling back to defaults when nothing valid is stored.
    pub fn load_settings(&self) -> Result<Settings, DatabaseError> {
        let Some(json) = self.load_value(SETTINGS_KEY)? else {
            return Ok(Settings::default());
        };
        let settings: Settings = match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "stored settings unreadable, using defaults");
                return Ok(Settings::default());
            }
        };
        match settings.validate() {
            Ok(()) => Ok(settings),
            Err(e) => {
                warn!(error = %e, "stored settings invalid, using defaults");
                Ok(Settings::default())
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(settings)?;
        self.save_value(SETTINGS_KEY, &json)
    }

    /// Loads preferences, falling back to defaults when the stored row is unreadable.
    pub fn load_preferences(&self) -> Result<Preferences, DatabaseError> {
        let Some(json) = self.load_value(PREFERENCES_KEY)? else {
            return Ok(Preferences::default());
        };
        match serde_json::from_str(&json) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                warn!(error = %e, "stored preferences unreadable, using defaults");
                Ok(Preferences::default())
            }
        }
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(prefs)?;
        self.save_value(PREFERENCES_KEY, &json)
    }

    /// Appends a finished interval to the history.
    pub fn record_completion(&self, interval: &CompletedInterval) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO completed_intervals
                (mode, duration_mins, started_at, completed_at, completed_date)
             VALUES (?, ?, ?, ?, ?)",
            params![
                interval.mode.as_str(),
                interval.duration_minutes,
                interval.started_at.to_rfc3339(),
                interval.completed_at.to_rfc3339(),
                interval.completed_at.date_naive().to_string(),
            ],
        )?;
        Ok(())
    }

    /// Focus totals for a single day.
    pub fn focus_on(&self, date: NaiveDate) -> Result<DailyFocus, DatabaseError> {
        let (count, minutes): (u32, u32) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_mins), 0)
             FROM completed_intervals
             WHERE mode = ? AND completed_date = ?",
            params![Mode::Focus.as_str(), date.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DailyFocus {
            date,
            focus_intervals: count,
            focus_minutes: minutes,
        })
    }

    /// Focus totals for the `days` days ending at `today`, oldest first.
    /// Days without focus intervals are present with zero totals.
    pub fn focus_by_day(&self, today: NaiveDate, days: u32) -> Result<Vec<DailyFocus>, DatabaseError> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let first = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);

        let mut stmt = self.conn.prepare(
            "SELECT completed_date, COUNT(*), SUM(duration_mins)
             FROM completed_intervals
             WHERE mode = ? AND completed_date >= ? AND completed_date <= ?
             GROUP BY completed_date",
        )?;
        let rows = stmt.query_map(
            params![Mode::Focus.as_str(), first.to_string(), today.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            },
        )?;

        let mut totals = HashMap::new();
        for row in rows {
            let (date, count, minutes) = row?;
            if let Ok(date) = date.parse::<NaiveDate>() {
                totals.insert(date, (count, minutes));
            }
        }

        Ok(first
            .iter_days()
            .take(days as usize)
            .map(|date| match totals.get(&date) {
                Some(&(count, minutes)) => DailyFocus {
                    date,
                    focus_intervals: count,
                    focus_minutes: minutes,
                },
                None => DailyFocus::new(date),
            })
            .collect())
    }

    pub fn cached_tip(&self, date: NaiveDate) -> Result<Option<String>, DatabaseError> {
        let tip = self
            .conn
            .query_row(
                "SELECT tip FROM focus_tips WHERE date = ?",
                [date.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(tip)
    }

    pub fn cache_tip(&self, date: NaiveDate, tip: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO focus_tips (date, tip) VALUES (?, ?)",
            params![date.to_string(), tip],
        )?;
        Ok(())
    }
}
