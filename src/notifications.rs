//! System notifications for interval completion.

use crate::models::Mode;
use notify_rust::Notification;
use std::thread;
use tracing::warn;

/// Title and body shown when an interval of `finished` mode completes.
pub fn completion_message(finished: Mode) -> (&'static str, &'static str) {
    match finished {
        Mode::Focus => ("Focus complete 🍅", "Time for a break"),
        Mode::ShortBreak | Mode::LongBreak => ("Break over ☕", "Back to focus"),
    }
}

/// Shows a notification for a finished interval.
/// Runs in a background thread to avoid blocking; a denied or missing
/// notification service is logged and otherwise ignored.
pub fn notify_completion(finished: Mode) {
    let (summary, body) = completion_message(finished);
    thread::spawn(move || {
        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .sound_name("default")
            .show()
        {
            warn!(error = %e, "failed to show notification");
        }
    });
}
