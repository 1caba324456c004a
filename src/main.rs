//! Pomocycle - a menubar Pomodoro timer.
//!
//! Cycles through focus and break intervals. Duration changes made while an
//! interval is running are held back until that interval ends, so a running
//! countdown never changes length underfoot.

use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use chrono::Local;
use muda::MenuEvent;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tray_icon::{TrayIcon, TrayIconBuilder};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

mod advice;
mod app;
mod audio;
mod event;
mod menu;
mod models;
mod notifications;
mod persistence;
mod session;
mod timer;

use app::{App, CompletionEvent, Dispatch, SessionObserver};
use audio::SoundEngine;
use event::{EventResult, HostMessage};
use menu::MenuItems;
use models::Mode;
use session::Session;
use timer::SessionClock;

/// How often the event loop wakes to drain the host queue.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Keeps the tray title and menu in step with the session.
struct TrayView {
    tray: TrayIcon,
    items: Rc<MenuItems>,
}

impl SessionObserver for TrayView {
    fn session_changed(&mut self, session: &Session) {
        self.tray
            .set_title(Some(timer::format_tray_title(session)));
        menu::update_menu_items(&self.items, session);
    }
}

/// Application handler for the winit event loop.
struct Pomocycle {
    app: App,
    items: Rc<MenuItems>,
    clock: SessionClock,
    sound: SoundEngine,
    tx: Sender<HostMessage>,
    rx: Receiver<HostMessage>,
}

impl Pomocycle {
    fn new(app: App, items: Rc<MenuItems>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            app,
            items,
            clock: SessionClock::new(),
            sound: SoundEngine::new(),
            tx,
            rx,
        }
    }

    fn sender(&self) -> Sender<HostMessage> {
        self.tx.clone()
    }

    /// Starts or stops the clock to follow the session's running flag.
    fn sync_clock(&mut self) {
        let tx = self.tx.clone();
        self.clock.sync(self.app.session().running, move || {
            tx.send(HostMessage::Tick).is_ok()
        });
    }

    fn after_dispatch(&mut self, dispatch: Dispatch) {
        if let Some(completion) = dispatch.completion {
            self.handle_completion(completion);
        }
        if dispatch.changed {
            self.sync_clock();
        }
    }

    fn handle_completion(&mut self, event: CompletionEvent) {
        info!(
            finished = event.finished.as_str(),
            next = event.next.as_str(),
            focus_count = event.focus_count,
            "notifying completion"
        );
        self.sound.play_chime(event.sound_enabled, event.volume);
        notifications::notify_completion(event.finished);
        if event.finished == Mode::Focus {
            self.refresh_stats();
        }
    }

    fn refresh_stats(&self) {
        let today = Local::now().date_naive();
        menu::update_stats(
            &self.items,
            &self.app.focus_on(today),
            &self.app.focus_by_day(today, menu::HISTORY_DAYS),
        );
    }

    fn process_host_messages(&mut self, event_loop: &ActiveEventLoop) {
        while let Ok(msg) = self.rx.try_recv() {
            match event::handle_host_message(&mut self.app, msg) {
                EventResult::Quit => {
                    event_loop.exit();
                    return;
                }
                EventResult::Dispatched(dispatch) => self.after_dispatch(dispatch),
                EventResult::Tip(tip) => menu::set_tip(&self.items, &tip),
                EventResult::Continue => {}
            }
        }
    }
}

impl ApplicationHandler for Pomocycle {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {
        // Nothing to do on resume for a tray-only app
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        _event: WindowEvent,
    ) {
        // No window events for a tray-only app
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));

        self.process_host_messages(event_loop);
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.clock.stop();
        self.sound.shutdown();
        info!("pomocycle exiting");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut app = App::new()?;

    // Create event loop (required for tray on macOS)
    let event_loop = EventLoop::new()?;

    let (built_menu, items) = menu::build_menu(app.session())?;
    let items = Rc::new(items);

    // Create tray icon (no icon image, just use title text on macOS)
    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(built_menu))
        .with_title(timer::format_tray_title(app.session()))
        .with_tooltip("Pomocycle - Pomodoro Timer")
        .build()?;

    app.subscribe(Box::new(TrayView {
        tray,
        items: Rc::clone(&items),
    }));

    let mut pomocycle = Pomocycle::new(app, items);
    pomocycle.refresh_stats();

    // Clicks join the clock's queue instead of muda's own receiver
    let menu_tx = pomocycle.sender();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        let _ = menu_tx.send(HostMessage::Menu(event.id.0));
    }));

    let tip_tx = pomocycle.sender();
    advice::spawn_tip_fetch(move |tip| {
        let _ = tip_tx.send(HostMessage::Tip(tip));
    });

    info!("pomocycle started");
    event_loop.run_app(&mut pomocycle)?;

    Ok(())
}
