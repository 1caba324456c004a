//! Session state machine.
//!
//! [`Session::apply`] is the only way a session changes. It is pure: the
//! same session and event always produce the same next session, and it
//! never performs I/O. Completion side effects (sound, notification, the
//! history record) are the caller's business, see `app::App::dispatch`.

use crate::models::{Mode, Preferences, Settings};

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Start,
    Pause,
    Reset,
    /// One second of elapsed countdown.
    Tick,
    /// The countdown reached zero.
    Complete,
    /// Manual early end of the current interval.
    Skip,
    UpdateSettings(Settings),
    ResetSettings,
    ApplyPendingSettings,
    ToggleAutoStart,
    ToggleSound,
    ToggleDarkMode,
    SetVolume(f32),
}

/// The whole timer state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub mode: Mode,
    pub seconds_left: u32,
    /// Focus intervals finished since start. Compared modulo
    /// `sessions_before_long_break` to pick the next break.
    pub focus_count: u32,
    pub running: bool,
    pub settings: Settings,
    pub default_settings: Settings,
    /// A change requested while running, held until the interval resolves.
    pub pending_settings: Option<Settings>,
    pub auto_start_next: bool,
    pub sound_enabled: bool,
    pub volume: f32,
    pub dark_mode: bool,
}

/// Length of an interval of `mode` under `settings`, in seconds.
pub fn duration(mode: Mode, settings: &Settings) -> u32 {
    settings.minutes_for(mode).saturating_mul(60)
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

impl Session {
    /// Creates an idle session at the start of a focus interval.
    pub fn new(settings: Settings) -> Self {
        Self::with_preferences(settings, Preferences::default())
    }

    pub fn with_preferences(settings: Settings, prefs: Preferences) -> Self {
        Self {
            mode: Mode::Focus,
            seconds_left: duration(Mode::Focus, &settings),
            focus_count: 0,
            running: false,
            settings,
            default_settings: Settings::default(),
            pending_settings: None,
            auto_start_next: prefs.auto_start_next,
            sound_enabled: prefs.sound_enabled,
            volume: clamp_volume(prefs.volume),
            dark_mode: prefs.dark_mode,
        }
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            auto_start_next: self.auto_start_next,
            sound_enabled: self.sound_enabled,
            volume: self.volume,
            dark_mode: self.dark_mode,
        }
    }

    /// Pending settings if any, else the active ones.
    pub fn effective_settings(&self) -> Settings {
        self.pending_settings.unwrap_or(self.settings)
    }

    /// Full length of the current interval under the active settings.
    pub fn total_secs(&self) -> u32 {
        duration(self.mode, &self.settings)
    }

    /// Returns true if the countdown is stopped part way through an interval.
    pub fn is_paused(&self) -> bool {
        !self.running && self.seconds_left < self.total_secs()
    }

    /// Fraction of the current interval already elapsed, 0.0 to 1.0.
    pub fn progress_percent(&self) -> f32 {
        let total = self.total_secs();
        if total == 0 {
            return 1.0;
        }
        let remaining = self.seconds_left.min(total);
        1.0 - (remaining as f32 / total as f32)
    }

    /// Applies one event and returns the next session.
    pub fn apply(self, event: Event) -> Self {
        match event {
            Event::Start => Self {
                running: true,
                ..self
            },
            Event::Pause => Self {
                running: false,
                ..self
            },
            Event::Tick => self.tick(),
            Event::Complete | Event::Skip => {
                let running = self.auto_start_next;
                Self {
                    running,
                    ..self.advance()
                }
            }
            Event::Reset => {
                let effective = self.effective_settings();
                let resolved = self.resolve_settings(effective);
                Self {
                    running: false,
                    ..resolved
                }
            }
            Event::UpdateSettings(settings) => {
                if self.running {
                    Self {
                        pending_settings: Some(settings),
                        ..self
                    }
                } else {
                    self.resolve_settings(settings)
                }
            }
            Event::ApplyPendingSettings => match self.pending_settings {
                Some(pending) => self.resolve_settings(pending),
                None => self,
            },
            Event::ResetSettings => {
                let defaults = self.default_settings;
                self.resolve_settings(defaults)
            }
            Event::ToggleAutoStart => Self {
                auto_start_next: !self.auto_start_next,
                ..self
            },
            Event::ToggleSound => Self {
                sound_enabled: !self.sound_enabled,
                ..self
            },
            Event::ToggleDarkMode => Self {
                dark_mode: !self.dark_mode,
                ..self
            },
            Event::SetVolume(volume) => Self {
                volume: clamp_volume(volume),
                ..self
            },
        }
    }

    fn tick(self) -> Self {
        if !self.running {
            return self;
        }
        let seconds_left = if self.seconds_left > 1 {
            self.seconds_left - 1
        } else {
            0
        };
        Self {
            seconds_left,
            ..self
        }
    }

    /// Moves to the next interval. Shared by completion and skip.
    fn advance(self) -> Self {
        let effective = self.effective_settings();
        let (mode, focus_count) = match self.mode {
            Mode::Focus => {
                let next_focus = self.focus_count + 1;
                let cycle = effective.sessions_before_long_break.max(1);
                let next_mode = if next_focus % cycle == 0 {
                    Mode::LongBreak
                } else {
                    Mode::ShortBreak
                };
                (next_mode, next_focus)
            }
            Mode::ShortBreak | Mode::LongBreak => (Mode::Focus, self.focus_count),
        };
        Self {
            mode,
            focus_count,
            settings: effective,
            pending_settings: None,
            seconds_left: duration(mode, &effective),
            ..self
        }
    }

    /// Installs `settings` as active, clears the pending slot and restarts
    /// the current mode's countdown from the new duration.
    fn resolve_settings(self, settings: Settings) -> Self {
        Self {
            settings,
            pending_settings: None,
            seconds_left: duration(self.mode, &settings),
            ..self
        }
    }
}
