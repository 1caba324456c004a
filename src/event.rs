//! Menu and host message handling.

use crate::app::{App, Dispatch};
use crate::menu::{
    ID_APPLY_PENDING, ID_AUTO_START_TOGGLE, ID_DARK_MODE_TOGGLE, ID_PAUSE, ID_QUIT, ID_RESET,
    ID_RESET_SETTINGS, ID_SKIP, ID_SOUND_TOGGLE, ID_START, PREFIX_CYCLE, PREFIX_FOCUS,
    PREFIX_LONG, PREFIX_SHORT, PREFIX_VOLUME,
};
use crate::models::Settings;
use crate::session::{Event, Session};
use tracing::{debug, warn};

/// Messages delivered to the main thread. Clock ticks, menu clicks and the
/// focus tip share one channel so they are handled in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// One second elapsed on the session clock.
    Tick,
    /// A menu item with this id was clicked.
    Menu(String),
    /// Today's focus tip is available.
    Tip(String),
}

/// Result of handling a menu event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Event ignored, nothing to do.
    Continue,
    /// User requested quit.
    Quit,
    /// An event went through the state machine.
    Dispatched(Dispatch),
    /// A focus tip to show. The session is untouched.
    Tip(String),
}

/// Handles one message from the host queue.
pub fn handle_host_message(app: &mut App, msg: HostMessage) -> EventResult {
    match msg {
        HostMessage::Tick => EventResult::Dispatched(app.dispatch(Event::Tick)),
        HostMessage::Menu(id) => handle_menu_event(app, &id),
        HostMessage::Tip(tip) => EventResult::Tip(tip),
    }
}

/// Handles a menu click by id and updates the app accordingly.
pub fn handle_menu_event(app: &mut App, id: &str) -> EventResult {
    if id == ID_QUIT {
        return EventResult::Quit;
    }
    match event_for_menu_id(app.session(), id) {
        Some(event) => EventResult::Dispatched(app.dispatch(event)),
        None => EventResult::Continue,
    }
}

/// Maps a menu id to the state machine event it stands for.
pub fn event_for_menu_id(session: &Session, id: &str) -> Option<Event> {
    let event = match id {
        ID_START => Event::Start,
        ID_PAUSE => Event::Pause,
        ID_RESET => Event::Reset,
        ID_SKIP => Event::Skip,
        ID_APPLY_PENDING => Event::ApplyPendingSettings,
        ID_RESET_SETTINGS => Event::ResetSettings,
        ID_AUTO_START_TOGGLE => Event::ToggleAutoStart,
        ID_SOUND_TOGGLE => Event::ToggleSound,
        ID_DARK_MODE_TOGGLE => Event::ToggleDarkMode,
        _ => {
            if let Some(volume) = parse_value(id, PREFIX_VOLUME) {
                return Some(Event::SetVolume(volume as f32 / 100.0));
            }
            let settings = settings_for_menu_id(session.effective_settings(), id)?;
            if let Err(e) = settings.validate() {
                warn!(error = %e, id, "rejected settings change");
                return None;
            }
            Event::UpdateSettings(settings)
        }
    };
    Some(event)
}

fn parse_value(id: &str, prefix: &str) -> Option<u32> {
    id.strip_prefix(prefix)?.parse().ok()
}

/// Builds a complete settings value from `base` with the picked field replaced.
/// `base` is the effective settings so a second change while running builds
/// on the first one.
pub fn settings_for_menu_id(base: Settings, id: &str) -> Option<Settings> {
    if let Some(mins) = parse_value(id, PREFIX_FOCUS) {
        return Some(Settings {
            focus_minutes: mins,
            ..base
        });
    }
    if let Some(mins) = parse_value(id, PREFIX_SHORT) {
        return Some(Settings {
            short_break_minutes: mins,
            ..base
        });
    }
    if let Some(mins) = parse_value(id, PREFIX_LONG) {
        return Some(Settings {
            long_break_minutes: mins,
            ..base
        });
    }
    if let Some(count) = parse_value(id, PREFIX_CYCLE) {
        return Some(Settings {
            sessions_before_long_break: count,
            ..base
        });
    }
    debug!(id, "unhandled menu id");
    None
}
