//! Data models for the Pomocycle application.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which kind of interval is being counted down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Mode {
    /// Stable identifier used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "shortBreak",
            Self::LongBreak => "longBreak",
        }
    }

    /// Human readable label for menus and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Focus => "Focus",
            Self::ShortBreak => "Short break",
            Self::LongBreak => "Long break",
        }
    }
}

/// Longest interval a user can configure, one day.
pub const MAX_MINUTES: u32 = 24 * 60;
/// Largest number of focus intervals before a long break.
pub const MAX_SESSIONS_BEFORE_LONG_BREAK: u32 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be at least 1 (got 0)")]
    Zero { field: &'static str },
    #[error("{field} must be at most {max} (got {value})")]
    TooLarge {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

/// Interval durations in minutes. Replaced wholesale on every update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Duration of a focus interval in minutes.
    pub focus_minutes: u32,
    /// Duration of a short break in minutes.
    pub short_break_minutes: u32,
    /// Duration of a long break in minutes.
    pub long_break_minutes: u32,
    /// Number of focus intervals per long break.
    pub sessions_before_long_break: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_before_long_break: 4,
        }
    }
}

impl Settings {
    /// Rejects zero and out-of-range values. The state machine assumes
    /// settings passed this check.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let fields = [
            ("focus_minutes", self.focus_minutes, MAX_MINUTES),
            ("short_break_minutes", self.short_break_minutes, MAX_MINUTES),
            ("long_break_minutes", self.long_break_minutes, MAX_MINUTES),
            (
                "sessions_before_long_break",
                self.sessions_before_long_break,
                MAX_SESSIONS_BEFORE_LONG_BREAK,
            ),
        ];
        for (field, value, max) in fields {
            if value == 0 {
                return Err(SettingsError::Zero { field });
            }
            if value > max {
                return Err(SettingsError::TooLarge { field, value, max });
            }
        }
        Ok(())
    }

    /// Configured length of an interval in `mode`, in minutes.
    pub fn minutes_for(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Focus => self.focus_minutes,
            Mode::ShortBreak => self.short_break_minutes,
            Mode::LongBreak => self.long_break_minutes,
        }
    }
}

/// Presentation preferences. They never influence timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub auto_start_next: bool,
    pub sound_enabled: bool,
    pub volume: f32,
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_start_next: true,
            sound_enabled: true,
            volume: 0.5,
            dark_mode: true,
        }
    }
}

/// A finished interval handed to the completion sink.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedInterval {
    pub mode: Mode,
    pub duration_minutes: u32,
    pub started_at: DateTime<Local>,
    pub completed_at: DateTime<Local>,
}

/// Focus totals for a single day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyFocus {
    pub date: NaiveDate,
    pub focus_intervals: u32,
    pub focus_minutes: u32,
}

impl DailyFocus {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            focus_intervals: 0,
            focus_minutes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.focus_minutes, 25);
        assert_eq!(settings.short_break_minutes, 5);
        assert_eq!(settings.long_break_minutes, 15);
        assert_eq!(settings.sessions_before_long_break, 4);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validate_rejects_zero() {
        let settings = Settings {
            short_break_minutes: 0,
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::Zero {
                field: "short_break_minutes"
            })
        );

        let settings = Settings {
            sessions_before_long_break: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_validate_rejects_too_large() {
        let settings = Settings {
            focus_minutes: 80_000_000,
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::TooLarge {
                field: "focus_minutes",
                value: 80_000_000,
                max: MAX_MINUTES,
            })
        );

        let settings = Settings {
            sessions_before_long_break: MAX_SESSIONS_BEFORE_LONG_BREAK + 1,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            long_break_minutes: MAX_MINUTES,
            sessions_before_long_break: MAX_SESSIONS_BEFORE_LONG_BREAK,
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_minutes_for_each_mode() {
        let settings = Settings {
            focus_minutes: 50,
            short_break_minutes: 10,
            long_break_minutes: 30,
            sessions_before_long_break: 3,
        };
        assert_eq!(settings.minutes_for(Mode::Focus), 50);
        assert_eq!(settings.minutes_for(Mode::ShortBreak), 10);
        assert_eq!(settings.minutes_for(Mode::LongBreak), 30);
    }

    #[test]
    fn test_mode_str_matches_serde_name() {
        for mode in [Mode::Focus, Mode::ShortBreak, Mode::LongBreak] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn test_settings_json_uses_camel_case() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"focusMinutes\":25"));
        assert!(json.contains("\"sessionsBeforeLongBreak\":4"));
    }

    #[test]
    fn test_preferences_fill_missing_fields_with_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"volume":0.8}"#).unwrap();
        assert_eq!(prefs.volume, 0.8);
        assert!(prefs.auto_start_next);
        assert!(prefs.sound_enabled);
        assert!(prefs.dark_mode);
    }

    #[test]
    fn test_daily_focus_new() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let day = DailyFocus::new(date);
        assert_eq!(day.date, date);
        assert_eq!(day.focus_intervals, 0);
        assert_eq!(day.focus_minutes, 0);
    }
}
