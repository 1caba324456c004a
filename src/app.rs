//! Main application state and event dispatch.
//!
//! [`App`] is the single writer of the [`Session`]. Every input, from the
//! clock or the menu, goes through [`App::dispatch`] on the main thread, one
//! at a time and in arrival order.

use crate::models::{CompletedInterval, DailyFocus, Mode};
use crate::persistence::{Database, DatabaseError};
use crate::session::{Event, Session};
use chrono::{DateTime, Duration, Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Emitted once for every interval that counts down to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionEvent {
    /// Mode of the interval that just ended.
    pub finished: Mode,
    /// Mode the session moved into.
    pub next: Mode,
    pub focus_count: u32,
    /// Sound preferences at the moment of completion.
    pub sound_enabled: bool,
    pub volume: f32,
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dispatch {
    pub changed: bool,
    pub completion: Option<CompletionEvent>,
}

/// Receives every new session after a change.
pub trait SessionObserver {
    fn session_changed(&mut self, session: &Session);
}

pub struct App {
    session: Session,
    db: Database,
    observers: Vec<Box<dyn SessionObserver>>,
    interval_started_at: Option<DateTime<Local>>,
}

/// Events after which the countdown starts over from a full duration.
fn restarts_interval(event: &Event, prev: &Session) -> bool {
    match event {
        Event::Complete | Event::Skip | Event::Reset | Event::ResetSettings => true,
        Event::ApplyPendingSettings => prev.pending_settings.is_some(),
        Event::UpdateSettings(_) => !prev.running,
        _ => false,
    }
}

impl App {
    /// Creates a new application instance backed by the default database.
    pub fn new() -> Result<Self, AppError> {
        Self::with_db(Database::new()?)
    }

    /// Creates an application from stored settings and preferences in `db`.
    pub fn with_db(db: Database) -> Result<Self, AppError> {
        let settings = db.load_settings()?;
        let prefs = db.load_preferences()?;
        Ok(Self {
            session: Session::with_preferences(settings, prefs),
            db,
            observers: Vec::new(),
            interval_started_at: None,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Registers an observer and sends it the current session right away.
    pub fn subscribe(&mut self, mut observer: Box<dyn SessionObserver>) {
        observer.session_changed(&self.session);
        self.observers.push(observer);
    }

    /// Applies `event` now. See [`App::dispatch_at`].
    pub fn dispatch(&mut self, event: Event) -> Dispatch {
        self.dispatch_at(event, Local::now())
    }

    /// Applies `event` as if it happened at `now`.
    ///
    /// A tick that takes a running countdown to zero is followed by a
    /// `Complete` in the same call, after the finished interval has been
    /// recorded. This is the only place `Complete` is synthesized, so it
    /// fires exactly once per interval and a pause at zero is never
    /// mistaken for a completion.
    pub fn dispatch_at(&mut self, event: Event, now: DateTime<Local>) -> Dispatch {
        let prev = self.session.clone();
        let mut next = prev.clone().apply(event);
        let mut completion = None;

        if restarts_interval(&event, &prev) {
            self.interval_started_at = next.running.then_some(now);
        } else if matches!(event, Event::Start) && self.interval_started_at.is_none() {
            self.interval_started_at = Some(now);
        }

        let reached_zero = matches!(event, Event::Tick)
            && prev.running
            && prev.seconds_left > 0
            && next.seconds_left == 0;

        if reached_zero {
            let finished = next.mode;
            self.record_completion(&next, now);
            next = next.apply(Event::Complete);
            self.interval_started_at = next.running.then_some(now);
            completion = Some(CompletionEvent {
                finished,
                next: next.mode,
                focus_count: next.focus_count,
                sound_enabled: next.sound_enabled,
                volume: next.volume,
            });
        }

        if next.mode != prev.mode {
            info!(
                from = prev.mode.as_str(),
                to = next.mode.as_str(),
                focus_count = next.focus_count,
                running = next.running,
                "interval advanced"
            );
        }

        self.persist_changes(&prev, &next);

        let changed = next != prev;
        self.session = next;
        if changed {
            for observer in &mut self.observers {
                observer.session_changed(&self.session);
            }
        } else {
            debug!(?event, "event left session unchanged");
        }

        Dispatch {
            changed,
            completion,
        }
    }

    fn record_completion(&self, finished: &Session, now: DateTime<Local>) {
        let duration_minutes = finished.settings.minutes_for(finished.mode);
        let started_at = self
            .interval_started_at
            .unwrap_or_else(|| now - Duration::minutes(i64::from(duration_minutes)));
        let interval = CompletedInterval {
            mode: finished.mode,
            duration_minutes,
            started_at,
            completed_at: now,
        };
        info!(
            mode = interval.mode.as_str(),
            minutes = duration_minutes,
            "interval completed"
        );
        if let Err(e) = self.db.record_completion(&interval) {
            warn!(error = %e, "failed to record completed interval");
        }
    }

    /// Writes changed settings and preferences. Failures never undo the transition.
    fn persist_changes(&self, prev: &Session, next: &Session) {
        if next.settings != prev.settings {
            if let Err(e) = self.db.save_settings(&next.settings) {
                warn!(error = %e, "failed to save settings");
            }
        }
        if next.preferences() != prev.preferences() {
            if let Err(e) = self.db.save_preferences(&next.preferences()) {
                warn!(error = %e, "failed to save preferences");
            }
        }
    }

    /// Focus totals for `date`, zero on read failure.
    pub fn focus_on(&self, date: NaiveDate) -> DailyFocus {
        self.db.focus_on(date).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read focus stats");
            DailyFocus::new(date)
        })
    }

    /// Focus totals for the last `days` days ending at `today`.
    pub fn focus_by_day(&self, today: NaiveDate, days: u32) -> Vec<DailyFocus> {
        self.db.focus_by_day(today, days).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read focus history");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Preferences, Settings};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn create_test_app() -> App {
        let db = Database::new_in_memory().unwrap();
        App::with_db(db).unwrap()
    }

    fn at(minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 4, 9, minute, 0).unwrap()
    }

    fn one_minute_settings() -> Settings {
        Settings {
            focus_minutes: 1,
            short_break_minutes: 1,
            long_break_minutes: 2,
            sessions_before_long_break: 2,
        }
    }

    /// Runs ticks until a completion is reported, returning it.
    fn tick_to_completion(app: &mut App, now: DateTime<Local>) -> (u32, CompletionEvent) {
        for n in 1..=10_000 {
            if let Some(event) = app.dispatch_at(Event::Tick, now).completion {
                return (n, event);
            }
        }
        panic!("interval never completed");
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Session>>>);

    impl SessionObserver for Recorder {
        fn session_changed(&mut self, session: &Session) {
            self.0.borrow_mut().push(session.clone());
        }
    }

    #[test]
    fn test_app_initial_state() {
        let app = create_test_app();
        assert_eq!(app.session().settings, Settings::default());
        assert_eq!(app.session().mode, Mode::Focus);
        assert!(!app.session().running);
    }

    #[test]
    fn test_app_loads_stored_preferences() {
        let db = Database::new_in_memory().unwrap();
        let prefs = Preferences {
            auto_start_next: false,
            volume: 0.9,
            ..Preferences::default()
        };
        db.save_preferences(&prefs).unwrap();
        let app = App::with_db(db).unwrap();
        assert!(!app.session().auto_start_next);
        assert_eq!(app.session().volume, 0.9);
    }

    #[test]
    fn test_app_starts_with_defaults_over_unreadable_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pomocycle.db");
        drop(Database::open(&path).unwrap());

        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES ('config', '{not json')",
            [],
        )
        .unwrap();
        drop(conn);

        let app = App::with_db(Database::open(&path).unwrap()).unwrap();
        assert_eq!(app.session().settings, Settings::default());
        assert_eq!(app.session().seconds_left, 25 * 60);
    }

    #[test]
    fn test_app_starts_with_defaults_over_oversized_settings() {
        let db = Database::new_in_memory().unwrap();
        db.save_settings(&Settings {
            focus_minutes: 80_000_000,
            ..Settings::default()
        })
        .unwrap();

        let app = App::with_db(db).unwrap();
        assert_eq!(app.session().settings, Settings::default());
        assert_eq!(app.session().seconds_left, 25 * 60);
    }

    #[test]
    fn test_countdown_completes_exactly_once() {
        let mut app = create_test_app();
        app.dispatch_at(Event::UpdateSettings(one_minute_settings()), at(0));
        app.dispatch_at(Event::Start, at(0));

        let (ticks, event) = tick_to_completion(&mut app, at(1));
        assert_eq!(ticks, 60);
        assert_eq!(event.finished, Mode::Focus);
        assert_eq!(event.next, Mode::ShortBreak);
        assert_eq!(event.focus_count, 1);
        assert_eq!(app.session().mode, Mode::ShortBreak);
        assert_eq!(app.session().seconds_left, 60);
        assert!(app.session().running);

        // The next tick belongs to the break, not a second completion.
        let dispatch = app.dispatch_at(Event::Tick, at(1));
        assert!(dispatch.completion.is_none());
        assert_eq!(app.session().seconds_left, 59);
    }

    #[test]
    fn test_completion_is_recorded() {
        let mut app = create_test_app();
        app.dispatch_at(Event::UpdateSettings(one_minute_settings()), at(0));
        app.dispatch_at(Event::Start, at(0));
        tick_to_completion(&mut app, at(1));

        let day = app.focus_on(at(1).date_naive());
        assert_eq!(day.focus_intervals, 1);
        assert_eq!(day.focus_minutes, 1);
    }

    #[test]
    fn test_skip_is_not_recorded() {
        let mut app = create_test_app();
        app.dispatch_at(Event::Start, at(0));
        let dispatch = app.dispatch_at(Event::Skip, at(5));

        assert!(dispatch.completion.is_none());
        assert_eq!(app.session().mode, Mode::ShortBreak);
        assert_eq!(app.focus_on(at(5).date_naive()).focus_intervals, 0);
    }

    #[test]
    fn test_pause_at_zero_does_not_complete() {
        let mut app = create_test_app();
        app.dispatch_at(Event::Start, at(0));
        app.session.seconds_left = 0;
        let dispatch = app.dispatch_at(Event::Pause, at(0));
        assert!(dispatch.completion.is_none());
        let dispatch = app.dispatch_at(Event::Tick, at(0));
        assert!(dispatch.completion.is_none());
        assert_eq!(app.session().mode, Mode::Focus);
    }

    #[test]
    fn test_completion_without_auto_start_stops() {
        let mut app = create_test_app();
        app.dispatch_at(Event::UpdateSettings(one_minute_settings()), at(0));
        app.dispatch_at(Event::ToggleAutoStart, at(0));
        app.dispatch_at(Event::Start, at(0));
        tick_to_completion(&mut app, at(1));
        assert!(!app.session().running);

        // Ticking a stopped session does nothing.
        let dispatch = app.dispatch_at(Event::Tick, at(2));
        assert!(!dispatch.changed);
    }

    #[test]
    fn test_long_break_after_cycle() {
        let mut app = create_test_app();
        app.dispatch_at(Event::UpdateSettings(one_minute_settings()), at(0));
        app.dispatch_at(Event::Start, at(0));

        let mut finished = Vec::new();
        for _ in 0..4 {
            let (_, event) = tick_to_completion(&mut app, at(1));
            finished.push((event.finished, event.next));
        }
        assert_eq!(
            finished,
            vec![
                (Mode::Focus, Mode::ShortBreak),
                (Mode::ShortBreak, Mode::Focus),
                (Mode::Focus, Mode::LongBreak),
                (Mode::LongBreak, Mode::Focus),
            ]
        );
    }

    #[test]
    fn test_pending_settings_survive_until_completion() {
        let mut app = create_test_app();
        app.dispatch_at(Event::UpdateSettings(one_minute_settings()), at(0));
        app.dispatch_at(Event::Start, at(0));

        let longer = Settings {
            short_break_minutes: 3,
            ..one_minute_settings()
        };
        app.dispatch_at(Event::UpdateSettings(longer), at(0));
        assert_eq!(app.session().pending_settings, Some(longer));

        let (ticks, _) = tick_to_completion(&mut app, at(1));
        assert_eq!(ticks, 60);
        assert_eq!(app.session().settings, longer);
        assert_eq!(app.session().pending_settings, None);
        assert_eq!(app.session().seconds_left, 180);
    }

    #[test]
    fn test_settings_are_saved_when_applied() {
        let mut app = create_test_app();
        let custom = Settings {
            focus_minutes: 40,
            ..Settings::default()
        };
        app.dispatch(Event::UpdateSettings(custom));
        assert_eq!(app.db.load_settings().unwrap(), custom);
    }

    #[test]
    fn test_pending_settings_are_not_saved() {
        let mut app = create_test_app();
        app.dispatch(Event::Start);
        app.dispatch(Event::UpdateSettings(Settings {
            focus_minutes: 40,
            ..Settings::default()
        }));
        assert_eq!(app.db.load_settings().unwrap(), Settings::default());

        app.dispatch(Event::ApplyPendingSettings);
        assert_eq!(app.db.load_settings().unwrap().focus_minutes, 40);
    }

    #[test]
    fn test_preferences_are_saved() {
        let mut app = create_test_app();
        app.dispatch(Event::ToggleSound);
        app.dispatch(Event::SetVolume(0.75));
        let prefs = app.db.load_preferences().unwrap();
        assert!(!prefs.sound_enabled);
        assert_eq!(prefs.volume, 0.75);
    }

    #[test]
    fn test_start_time_comes_from_start_event() {
        let mut app = create_test_app();
        app.dispatch_at(Event::UpdateSettings(one_minute_settings()), at(0));
        app.dispatch_at(Event::Start, at(10));
        app.dispatch_at(Event::Pause, at(11));
        app.dispatch_at(Event::Start, at(12));
        assert_eq!(app.interval_started_at, Some(at(10)));

        app.dispatch_at(Event::Reset, at(13));
        assert_eq!(app.interval_started_at, None);
    }

    #[test]
    fn test_observers_see_every_change() {
        let mut app = create_test_app();
        let recorder = Recorder::default();
        app.subscribe(Box::new(recorder.clone()));
        assert_eq!(recorder.0.borrow().len(), 1);

        app.dispatch(Event::Start);
        app.dispatch(Event::Tick);
        // Unchanged session is not broadcast.
        app.dispatch(Event::ApplyPendingSettings);

        let seen = recorder.0.borrow();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].running);
        assert_eq!(seen[2].seconds_left, 25 * 60 - 1);
    }

    #[test]
    fn test_dispatch_reports_change() {
        let mut app = create_test_app();
        assert!(app.dispatch(Event::Start).changed);
        assert!(!app.dispatch(Event::Start).changed);
    }
}
