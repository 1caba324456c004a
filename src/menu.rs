//! Menu building and updating for the tray dropdown.

use crate::models::{DailyFocus, Settings};
use crate::session::Session;
use crate::timer::format_time;
use muda::accelerator::Accelerator;
use muda::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};
use std::collections::BTreeMap;
use thiserror::Error;

// Menu item IDs as constants
pub const ID_STATUS: &str = "status";
pub const ID_PROGRESS: &str = "progress";
pub const ID_STATS: &str = "stats";
pub const ID_WEEK: &str = "week";
pub const ID_TIP: &str = "tip";
pub const ID_START: &str = "start";
pub const ID_PAUSE: &str = "pause";
pub const ID_RESET: &str = "reset";
pub const ID_SKIP: &str = "skip";
pub const ID_APPLY_PENDING: &str = "apply_pending";
pub const ID_RESET_SETTINGS: &str = "reset_settings";
pub const ID_AUTO_START_TOGGLE: &str = "auto_start_toggle";
pub const ID_SOUND_TOGGLE: &str = "sound_toggle";
pub const ID_DARK_MODE_TOGGLE: &str = "dark_mode_toggle";
pub const ID_QUIT: &str = "quit";

// Prefixes for picker items, followed by the value.
pub const PREFIX_FOCUS: &str = "focus_";
pub const PREFIX_SHORT: &str = "short_";
pub const PREFIX_LONG: &str = "long_";
pub const PREFIX_CYCLE: &str = "cycle_";
pub const PREFIX_VOLUME: &str = "vol_";

const FOCUS_CHOICES: [u32; 6] = [15, 20, 25, 30, 45, 60];
const SHORT_CHOICES: [u32; 4] = [3, 5, 10, 15];
const LONG_CHOICES: [u32; 4] = [10, 15, 20, 30];
const CYCLE_CHOICES: [u32; 5] = [2, 3, 4, 5, 6];
const VOLUME_CHOICES: [u32; 5] = [0, 25, 50, 75, 100];

/// Days covered by the history line.
pub const HISTORY_DAYS: u32 = 7;

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Menu error: {0}")]
    Muda(#[from] muda::Error),
}

/// A submenu of mutually exclusive values.
pub struct Picker {
    pub submenu: Submenu,
    pub checks: BTreeMap<u32, CheckMenuItem>,
}

impl Picker {
    fn build(title: String, prefix: &str, choices: &[u32], unit: &str) -> Result<Self, MenuError> {
        let submenu = Submenu::new(title, true);
        let mut checks = BTreeMap::new();
        for &value in choices {
            let item = CheckMenuItem::with_id(
                MenuId::new(format!("{}{}", prefix, value)),
                format!("{} {}", value, unit),
                true,
                false,
                None::<Accelerator>,
            );
            submenu.append(&item)?;
            checks.insert(value, item);
        }
        Ok(Self { submenu, checks })
    }

    fn select(&self, title: String, selected: u32) {
        self.submenu.set_text(title);
        for (&value, check) in &self.checks {
            check.set_checked(value == selected);
        }
    }
}

/// Holds references to menu items that need dynamic updates.
pub struct MenuItems {
    pub status: MenuItem,
    pub progress: MenuItem,
    pub stats: MenuItem,
    pub week: MenuItem,
    pub tip: MenuItem,
    pub start: MenuItem,
    pub pause: MenuItem,
    pub reset: MenuItem,
    pub skip: MenuItem,
    pub apply_pending: MenuItem,
    pub auto_start_toggle: CheckMenuItem,
    pub sound_toggle: CheckMenuItem,
    pub dark_mode_toggle: CheckMenuItem,
    pub focus: Picker,
    pub short_break: Picker,
    pub long_break: Picker,
    pub cycle: Picker,
    pub volume: Picker,
}

fn info_item(id: &str, text: impl AsRef<str>) -> MenuItem {
    MenuItem::with_id(MenuId::new(id), text, false, None::<Accelerator>)
}

fn action_item(id: &str, text: &str) -> MenuItem {
    MenuItem::with_id(MenuId::new(id), text, true, None::<Accelerator>)
}

fn toggle_item(id: &str, text: &str) -> CheckMenuItem {
    CheckMenuItem::with_id(MenuId::new(id), text, true, false, None::<Accelerator>)
}

/// Builds the complete menu structure. Dynamic values are filled in by
/// [`update_menu_items`], [`update_stats`] and [`set_tip`].
pub fn build_menu(session: &Session) -> Result<(Menu, MenuItems), MenuError> {
    let menu = Menu::new();

    let status = info_item(ID_STATUS, format_status(session));
    let progress = info_item(ID_PROGRESS, format_progress(session.progress_percent()));
    let stats = info_item(ID_STATS, "Today: —");
    let week = info_item(ID_WEEK, "");
    let tip = info_item(ID_TIP, "💡 …");
    menu.append(&status)?;
    menu.append(&progress)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&stats)?;
    menu.append(&week)?;
    menu.append(&tip)?;
    menu.append(&PredefinedMenuItem::separator())?;

    // Control buttons
    let start = action_item(ID_START, "▶  Start");
    let pause = action_item(ID_PAUSE, "⏸  Pause");
    let reset = action_item(ID_RESET, "↺  Reset");
    let skip = action_item(ID_SKIP, "⏭  Skip");
    menu.append(&start)?;
    menu.append(&pause)?;
    menu.append(&reset)?;
    menu.append(&skip)?;
    menu.append(&PredefinedMenuItem::separator())?;

    // Settings submenu
    let settings_menu = Submenu::new("⚙  Settings", true);
    let focus = Picker::build(String::new(), PREFIX_FOCUS, &FOCUS_CHOICES, "min")?;
    let short_break = Picker::build(String::new(), PREFIX_SHORT, &SHORT_CHOICES, "min")?;
    let long_break = Picker::build(String::new(), PREFIX_LONG, &LONG_CHOICES, "min")?;
    let cycle = Picker::build(String::new(), PREFIX_CYCLE, &CYCLE_CHOICES, "focus intervals")?;
    settings_menu.append(&focus.submenu)?;
    settings_menu.append(&short_break.submenu)?;
    settings_menu.append(&long_break.submenu)?;
    settings_menu.append(&cycle.submenu)?;
    settings_menu.append(&PredefinedMenuItem::separator())?;

    let apply_pending = action_item(ID_APPLY_PENDING, "Apply Pending Changes Now");
    let reset_settings = action_item(ID_RESET_SETTINGS, "Restore Default Durations");
    settings_menu.append(&apply_pending)?;
    settings_menu.append(&reset_settings)?;
    settings_menu.append(&PredefinedMenuItem::separator())?;

    let auto_start_toggle = toggle_item(ID_AUTO_START_TOGGLE, "Auto-start Next Interval");
    let sound_toggle = toggle_item(ID_SOUND_TOGGLE, "Sound Enabled");
    let volume = Picker::build(String::new(), PREFIX_VOLUME, &VOLUME_CHOICES, "%")?;
    let dark_mode_toggle = toggle_item(ID_DARK_MODE_TOGGLE, "Dark Mode");
    settings_menu.append(&auto_start_toggle)?;
    settings_menu.append(&sound_toggle)?;
    settings_menu.append(&volume.submenu)?;
    settings_menu.append(&dark_mode_toggle)?;
    menu.append(&settings_menu)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Quit
    let quit = action_item(ID_QUIT, "Quit Pomocycle");
    menu.append(&quit)?;

    let items = MenuItems {
        status,
        progress,
        stats,
        week,
        tip,
        start,
        pause,
        reset,
        skip,
        apply_pending,
        auto_start_toggle,
        sound_toggle,
        dark_mode_toggle,
        focus,
        short_break,
        long_break,
        cycle,
        volume,
    };
    update_menu_items(&items, session);

    Ok((menu, items))
}

/// Updates the menu items based on the current session.
pub fn update_menu_items(items: &MenuItems, session: &Session) {
    items.status.set_text(format_status(session));
    items
        .progress
        .set_text(format_progress(session.progress_percent()));

    items.start.set_enabled(!session.running);
    items.pause.set_enabled(session.running);
    items.apply_pending.set_enabled(session.pending_settings.is_some());

    // Pickers show what the next interval will use.
    let shown = session.effective_settings();
    update_pickers(items, &shown);

    items.auto_start_toggle.set_checked(session.auto_start_next);
    items.sound_toggle.set_checked(session.sound_enabled);
    items.dark_mode_toggle.set_checked(session.dark_mode);
    let percent = volume_percent(session.volume);
    items
        .volume
        .select(format!("Volume: {}%", percent), percent);
}

fn update_pickers(items: &MenuItems, settings: &Settings) {
    items.focus.select(
        format!("Focus: {} min", settings.focus_minutes),
        settings.focus_minutes,
    );
    items.short_break.select(
        format!("Short Break: {} min", settings.short_break_minutes),
        settings.short_break_minutes,
    );
    items.long_break.select(
        format!("Long Break: {} min", settings.long_break_minutes),
        settings.long_break_minutes,
    );
    items.cycle.select(
        format!(
            "Long Break After: {} focus intervals",
            settings.sessions_before_long_break
        ),
        settings.sessions_before_long_break,
    );
}

/// Refreshes the focus statistics lines.
pub fn update_stats(items: &MenuItems, today: &DailyFocus, history: &[DailyFocus]) {
    items.stats.set_text(format_stats(today));
    items.week.set_text(format_history(history));
}

pub fn set_tip(items: &MenuItems, tip: &str) {
    items.tip.set_text(format!("💡 {}", tip));
}

/// Rounds a 0.0..=1.0 volume to a whole percentage.
pub fn volume_percent(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Formats the status line for the menu.
pub fn format_status(session: &Session) -> String {
    let label = session.mode.label();
    let time = format_time(session.seconds_left);
    let mut status = if session.running {
        format!("⏱  {} - {} remaining", label, time)
    } else if session.is_paused() {
        format!("⏸  {} - {} (paused)", label, time)
    } else {
        format!("Ready: {} - {}", label, time)
    };
    if session.pending_settings.is_some() {
        status.push_str("  (changes pending)");
    }
    status
}

/// Formats the progress bar for the menu.
pub fn format_progress(pct: f32) -> String {
    let pct = pct.clamp(0.0, 1.0);
    let filled = (pct * 20.0).round() as usize;
    let empty = 20 - filled;
    format!(
        "{}{}  {}%",
        "█".repeat(filled),
        "░".repeat(empty),
        (pct * 100.0).round() as u32
    )
}

/// Formats today's focus stats for the menu.
pub fn format_stats(today: &DailyFocus) -> String {
    let count = today.focus_intervals;
    if count == 0 {
        return "Today: —  0 (0 min)".to_string();
    }
    let tomatoes = "🍅".repeat(count.min(10) as usize);
    let extra = if count > 10 {
        format!("+{}", count - 10)
    } else {
        String::new()
    };
    format!(
        "Today: {}{}  {} ({} min)",
        tomatoes, extra, count, today.focus_minutes
    )
}

/// Formats the focus history as a small bar chart, oldest day first.
pub fn format_history(days: &[DailyFocus]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max = days.iter().map(|d| d.focus_minutes).max().unwrap_or(0);
    let total: u32 = days.iter().map(|d| d.focus_minutes).sum();
    let chart: String = days
        .iter()
        .map(|d| {
            if max == 0 || d.focus_minutes == 0 {
                ' '
            } else {
                let idx = (d.focus_minutes * (BARS.len() as u32 - 1)).div_ceil(max) as usize;
                BARS[idx.min(BARS.len() - 1)]
            }
        })
        .collect();
    format!("Last {} days: [{}] {} min", days.len(), chart, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;
    use chrono::NaiveDate;

    fn day(n: u32, minutes: u32) -> DailyFocus {
        DailyFocus {
            date: NaiveDate::from_ymd_opt(2024, 3, n).unwrap(),
            focus_intervals: minutes / 25,
            focus_minutes: minutes,
        }
    }

    #[test]
    fn test_format_status_ready() {
        let session = Session::new(Settings::default());
        assert_eq!(format_status(&session), "Ready: Focus - 25:00");
    }

    #[test]
    fn test_format_status_running() {
        let session = Session {
            running: true,
            seconds_left: 1432,
            ..Session::new(Settings::default())
        };
        assert_eq!(format_status(&session), "⏱  Focus - 23:52 remaining");
    }

    #[test]
    fn test_format_status_paused() {
        let session = Session {
            seconds_left: 600,
            ..Session::new(Settings::default())
        };
        assert_eq!(format_status(&session), "⏸  Focus - 10:00 (paused)");
    }

    #[test]
    fn test_format_status_long_break_with_pending() {
        let session = Session {
            mode: Mode::LongBreak,
            seconds_left: 600,
            running: true,
            pending_settings: Some(Settings::default()),
            ..Session::new(Settings::default())
        };
        assert_eq!(
            format_status(&session),
            "⏱  Long break - 10:00 remaining  (changes pending)"
        );
    }

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0.0), "░░░░░░░░░░░░░░░░░░░░  0%");
        assert_eq!(format_progress(0.5), "██████████░░░░░░░░░░  50%");
        assert_eq!(format_progress(1.0), "████████████████████  100%");
    }

    #[test]
    fn test_format_stats_empty() {
        assert_eq!(format_stats(&day(4, 0)), "Today: —  0 (0 min)");
    }

    #[test]
    fn test_format_stats_with_intervals() {
        assert_eq!(format_stats(&day(4, 100)), "Today: 🍅🍅🍅🍅  4 (100 min)");
    }

    #[test]
    fn test_format_stats_many_intervals() {
        let result = format_stats(&day(4, 375));
        assert!(result.contains("+5"));
        assert!(result.contains("15"));
        assert!(result.contains("375 min"));
    }

    #[test]
    fn test_format_history() {
        let days = vec![day(1, 0), day(2, 50), day(3, 100)];
        assert_eq!(format_history(&days), "Last 3 days: [ ▅█] 150 min");
        assert_eq!(format_history(&[]), "Last 0 days: [] 0 min");
    }

    #[test]
    fn test_volume_percent() {
        assert_eq!(volume_percent(0.0), 0);
        assert_eq!(volume_percent(0.5), 50);
        assert_eq!(volume_percent(0.754), 75);
        assert_eq!(volume_percent(1.0), 100);
    }
}
