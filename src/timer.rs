//! Session clock: a 1 Hz tick driver plus tray title formatting.

use crate::models::Mode;
use crate::session::Session;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Interval between ticks in production.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Fires a callback once per period on a background thread while started.
///
/// The clock keeps no timer state of its own. Each `start` schedules ticks
/// against a fresh deadline, so stopping and restarting never accumulates
/// drift. Ticks missed while the host was suspended are dropped, not
/// replayed.
pub struct SessionClock {
    period: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            stop_tx: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Starts ticking. `on_tick` returns false once nobody is listening,
    /// which ends the thread. Starting a running clock does nothing.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if self.is_running() {
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let period = self.period;

        let handle = thread::spawn(move || {
            let mut next = Instant::now() + period;
            loop {
                let wait = next.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !on_tick() {
                            break;
                        }
                        next += period;
                        let now = Instant::now();
                        if now > next {
                            // Fell behind (sleep/suspend): skip rather than burst.
                            next = now + period;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        debug!(period_ms = self.period.as_millis() as u64, "clock started");
        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
    }

    /// Stops ticking. No tick is delivered after this returns.
    pub fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        drop(stop_tx);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        debug!("clock stopped");
    }

    /// Starts or stops the clock to match the session's `running` flag.
    pub fn sync<F>(&mut self, running: bool, on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if running {
            self.start(on_tick);
        } else {
            self.stop();
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Formats the tray title based on the current session.
pub fn format_tray_title(session: &Session) -> String {
    let icon = if session.is_paused() {
        "⏸"
    } else {
        match session.mode {
            Mode::Focus => "🍅",
            Mode::ShortBreak => "☕",
            Mode::LongBreak => "🌴",
        }
    };
    format!("{} {}", icon, format_time(session.seconds_left))
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
