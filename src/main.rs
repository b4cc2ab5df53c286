use aether_shell::config::{load_last_document, load_profiles, load_settings, save_document, ConfigPaths, Settings};
use aether_shell::core::feed::FeedBatch;
use aether_shell::core::menu::AppId;
use aether_shell::core::input::{RawInput, TouchPoint};
use aether_shell::core::pattern::{LockSetting, MatchOutcome};
use aether_shell::core::shell::LIBRARY_CATEGORY;
use aether_shell::core::window::{WindowId, WindowMetrics};
use aether_shell::core::{Host, Outcome, SessionPhase, Shell};
use aether_shell::logging::{self, LogOptions};
use anyhow::Result;
use clap::Parser;
use crossbeam_channel::Receiver;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Frame};
use std::collections::HashMap;
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

mod actions;
mod apps;
mod gamepad;
mod library;
mod system;
mod telemetry;
mod ui;

use apps::{AppView, Roster, ViewContext, ViewEffect};
use gamepad::GilrsPad;
use system::SystemHost;
use telemetry::{Telemetry, TelemetrySampler};
use ui::{Palette, Term, TitleButton};

const FRAME: Duration = Duration::from_millis(16);
const MESSAGE_FOR: Duration = Duration::from_millis(2500);
// Mouse cells become pointer pixels for touch emulation.
const CELL_W: f32 = 8.0;
const CELL_H: f32 = 16.0;
const WHEEL_STEP: f32 = 10.0;

const TERMINAL_METRICS: WindowMetrics = WindowMetrics {
    default_w: 60,
    default_h: 16,
    min_w: 30,
    min_h: 8,
    cascade_origin: 2,
    cascade_step: 2,
};

#[derive(Parser, Debug)]
#[command(name = "aether", version, about = "Gamepad-first console shell for the terminal")]
struct Cli {
    /// Directory holding settings.json, profiles.json and library.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,
    /// Skip the boot splash
    #[arg(long)]
    no_boot: bool,
    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
    /// Disable the log file
    #[arg(long)]
    no_logs: bool,
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn init_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(ratatui::Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Leaves the alternate screen until the user presses Enter.
fn suspend(terminal: &mut Term) -> Result<()> {
    std::thread::sleep(Duration::from_millis(80));
    disable_raw_mode()?;
    execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen)?;

    println!("aether is minimized. Press Enter to return.");
    let mut buf = String::new();
    let result = std::io::stdin().read_line(&mut buf);

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    terminal.clear()?;
    drain_pending_input(Duration::from_millis(80));
    result?;
    Ok(())
}

fn drain_pending_input(max_for: Duration) {
    let deadline = Instant::now() + max_for;
    while Instant::now() < deadline {
        match event::poll(Duration::from_millis(0)) {
            Ok(true) => {
                let _ = event::read();
            }
            _ => break,
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::F(10)
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q'))
}

// ── Front-end state ───────────────────────────────────────────────────────────

struct App {
    shell: Shell,
    host: SystemHost,
    pad: Option<GilrsPad>,
    paths: ConfigPaths,
    settings: Settings,
    palette: Palette,
    views: HashMap<WindowId, AppView>,
    sampler: TelemetrySampler,
    feed: Receiver<FeedBatch>,
    message: Option<(String, Instant)>,
    press: Option<(u16, u16)>,
    screen: Rect,
    started: Instant,
    quit: bool,
}

impl App {
    fn flash(&mut self, msg: impl Into<String>, now: Instant) {
        self.message = Some((msg.into(), now));
    }

    fn on_desktop(&self) -> bool {
        matches!(self.shell.phase(), SessionPhase::Ready | SessionPhase::Running(_))
    }

    /// The focused window when its view takes raw keys.
    fn text_entry_window(&self) -> Option<WindowId> {
        if !self.on_desktop() {
            return None;
        }
        let id = self.shell.windows().focused()?;
        self.views.get(&id).filter(|v| v.is_text_entry()).map(|_| id)
    }

    fn open_view(&self, app: &AppId) -> AppView {
        match app.as_str() {
            "notepad" => AppView::notepad(load_last_document(&self.paths)),
            _ => AppView::for_app(app),
        }
    }

    fn prune_views(&mut self) {
        let windows = self.shell.windows();
        self.views.retain(|id, _| windows.get(*id).is_some());
    }

    fn submit(&mut self, raw: RawInput, now: Instant) {
        let outcome = self.shell.submit(&raw, now, &mut self.host);
        self.react(outcome, now);
    }

    fn react(&mut self, outcome: Outcome, now: Instant) {
        match outcome {
            Outcome::Invoke(action) => {
                if !actions::run_action(&action, &mut self.shell, &mut self.host, now) {
                    self.flash(format!("unknown action: {}", action.as_str()), now);
                }
                self.prune_views();
            }
            Outcome::Opened(id) => {
                let Some(app) = self.shell.windows().get(id).map(|w| w.app.clone()) else {
                    return;
                };
                if !self.views.contains_key(&id) {
                    let view = self.open_view(&app);
                    self.views.insert(id, view);
                }
            }
            Outcome::ClosedApp(_) => self.prune_views(),
            Outcome::SignedOut => {
                self.prune_views();
                self.flash("signed out", now);
            }
            Outcome::SignedIn => {
                let name = self
                    .shell
                    .session()
                    .active_profile()
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                self.flash(format!("welcome, {name}"), now);
            }
            Outcome::Launched(target) => {
                let what = target.source.unwrap_or_else(|| target.launch_ref.clone());
                self.flash(format!("launching {what}"), now);
            }
            Outcome::Routed { window, action } => {
                let roster = roster(&self.shell);
                let effect = self
                    .views
                    .get_mut(&window)
                    .map_or(ViewEffect::None, |v| v.on_action(action, roster));
                self.apply_effect(window, effect, now);
            }
            Outcome::Auth(result) => {
                // Lock-out signs out, which closes every window.
                if result == MatchOutcome::LockedOut {
                    self.prune_views();
                }
                if let Some(msg) = auth_message(&result) {
                    self.flash(msg, now);
                }
            }
            Outcome::Ignored
            | Outcome::Navigated
            | Outcome::Authenticating
            | Outcome::TaskbarToggled(_) => {}
        }
    }

    fn apply_effect(&mut self, window: WindowId, effect: ViewEffect, now: Instant) {
        match effect {
            ViewEffect::None => {}
            ViewEffect::Leave => self.shell.windows_mut().minimize(window),
            ViewEffect::OpenUrl(url) => self.host.open_external_url(&url),
            ViewEffect::AddProfile { name, accent } => {
                match self.shell.add_profile(&name, &accent, &mut self.host) {
                    Ok(_) => self.flash(format!("registered {name}"), now),
                    Err(e) => self.flash(e.to_string(), now),
                }
            }
            ViewEffect::RemoveProfile(id) => match self.shell.remove_profile(&id, &mut self.host) {
                Ok(profile) => self.flash(format!("deleted {}", profile.name), now),
                Err(e) => self.flash(e.to_string(), now),
            },
            ViewEffect::SetLock(lock) => match self.shell.set_active_lock(lock, &mut self.host) {
                Ok(()) => self.flash("pattern updated", now),
                Err(e) => self.flash(e.to_string(), now),
            },
            ViewEffect::SaveDocument { name, text } => match save_document(&self.paths, &name, &text) {
                Ok(path) => self.flash(format!("saved {}", path.display()), now),
                Err(e) => {
                    warn!(document = %name, error = %format!("{e:#}"), "document not saved");
                    self.flash(format!("save failed: {e}"), now);
                }
            },
            ViewEffect::Status(msg) => self.flash(msg, now),
        }
    }

    // ── Events ───────────────────────────────────────────────────────────────

    fn on_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if is_quit(&key) {
            self.quit = true;
            return;
        }
        if let Some(id) = self.text_entry_window() {
            let roster = roster(&self.shell);
            let effect = self.views.get_mut(&id).map_or(ViewEffect::None, |v| v.on_key(&key, roster));
            self.apply_effect(id, effect, now);
            return;
        }
        self.submit(RawInput::Key(key), now);
    }

    fn on_mouse(&mut self, m: MouseEvent, now: Instant) {
        let (x, y) = (m.column, m.row);
        match m.kind {
            MouseEventKind::ScrollUp => self.submit(RawInput::Wheel { dx: 0.0, dy: -WHEEL_STEP }, now),
            MouseEventKind::ScrollDown => self.submit(RawInput::Wheel { dx: 0.0, dy: WHEEL_STEP }, now),
            MouseEventKind::ScrollLeft => self.submit(RawInput::Wheel { dx: -WHEEL_STEP, dy: 0.0 }, now),
            MouseEventKind::ScrollRight => self.submit(RawInput::Wheel { dx: WHEEL_STEP, dy: 0.0 }, now),
            MouseEventKind::Down(MouseButton::Left) => {
                self.press = None;
                if self.on_desktop() && self.press_window(x, y) {
                    return;
                }
                self.press = Some((x, y));
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.shell.windows().is_grabbing() {
                    self.shell.windows_mut().drag_to(i32::from(x), i32::from(y));
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if self.shell.windows().is_grabbing() {
                    self.shell.windows_mut().end_grab();
                } else if let Some((sx, sy)) = self.press.take() {
                    let start = TouchPoint::new(f32::from(sx) * CELL_W, f32::from(sy) * CELL_H);
                    let end = TouchPoint::new(f32::from(x) * CELL_W, f32::from(y) * CELL_H);
                    self.submit(RawInput::Touch { start, end }, now);
                }
            }
            _ => {}
        }
    }

    /// Taskbar and window chrome. Returns true when the press was consumed.
    fn press_window(&mut self, x: u16, y: u16) -> bool {
        let bar = ui::bottom_bar_area(self.screen);
        if self.shell.taskbar_visible() && bar.height > 0 && y == bar.y {
            let hit = ui::taskbar_buttons(self.shell.windows(), bar)
                .into_iter()
                .find(|(_, r)| x >= r.x && x < r.x + r.width)
                .map(|(id, _)| id);
            if let Some(id) = hit {
                let windows = self.shell.windows_mut();
                let showing = windows.get(id).is_some_and(|w| !w.minimized) && windows.focused() == Some(id);
                if showing {
                    windows.minimize(id);
                } else {
                    windows.focus(id);
                }
            }
            return true;
        }

        let (px, py) = (i32::from(x), i32::from(y));
        let Some(id) = self.shell.windows().hit(px, py) else {
            return false;
        };
        let Some(rect) = self.shell.windows().get(id).map(|w| w.rect) else {
            return false;
        };
        let windows = self.shell.windows_mut();
        match ui::title_button_at(rect, px, py) {
            Some(TitleButton::Close) => {
                windows.close(id);
                self.prune_views();
            }
            Some(TitleButton::Maximize) => windows.toggle_maximize(id),
            Some(TitleButton::Minimize) => windows.minimize(id),
            None if ui::is_resize_handle(rect, px, py) => windows.begin_resize(id, px, py),
            None if py == rect.y => windows.begin_move(id, px, py),
            None => windows.focus(id),
        }
        true
    }

    fn on_resize(&mut self, w: u16, h: u16) {
        self.screen = Rect::new(0, 0, w, h);
        let desk = ui::desk_area(self.screen);
        self.shell.windows_mut().set_desktop(ui::to_win_rect(desk));
    }

    // ── Frame ────────────────────────────────────────────────────────────────

    fn before_frame(&mut self, now: Instant) {
        if self.shell.tick(now) {
            if self.shell.phase() == &SessionPhase::Locked {
                self.flash("locked after inactivity", now);
            }
            self.prune_views();
        }
        if let Some(pad) = self.pad.as_mut() {
            let outcome = self.shell.poll_gamepad(pad, now, &mut self.host);
            self.react(outcome, now);
        }
        self.host.reap();
        while let Ok(batch) = self.feed.try_recv() {
            self.shell.apply_feed(batch);
        }
        let typing = self.text_entry_window().is_some();
        self.shell.set_text_entry_focused(typing);
        if self
            .message
            .as_ref()
            .is_some_and(|(_, at)| now.saturating_duration_since(*at) >= MESSAGE_FOR)
        {
            self.message = None;
        }
    }

    fn draw(&self, f: &mut Frame, telemetry: Telemetry, now: Instant) {
        let session = self.shell.session();
        let library = session
            .grid()
            .position(LIBRARY_CATEGORY)
            .and_then(|i| session.grid().column(i))
            .map(|c| c.items.as_slice())
            .unwrap_or_default();
        let boot = self.settings.boot_ms.max(1) as f32;
        let screen = ui::Screen {
            shell: &self.shell,
            palette: &self.palette,
            views: &self.views,
            ctx: ViewContext {
                palette: &self.palette,
                telemetry,
                settings: &self.settings,
                roster: roster(&self.shell),
                library,
            },
            message: self.message.as_ref().map(|(m, _)| m.as_str()),
            boot_progress: now.saturating_duration_since(self.started).as_millis() as f32 / boot,
        };
        ui::draw(f, &screen);
    }
}

fn roster(shell: &Shell) -> Roster<'_> {
    let session = shell.session();
    Roster {
        profiles: session.profiles(),
        active: session.active_profile().map(|p| p.id.as_str()),
    }
}

fn auth_message(result: &MatchOutcome) -> Option<String> {
    let msg = match result {
        MatchOutcome::Mismatch { failures } => format!("wrong pattern ({failures} failed)"),
        MatchOutcome::LockedOut => "too many attempts".to_string(),
        MatchOutcome::TooShort => "pattern too short".to_string(),
        MatchOutcome::Recorded(LockSetting::Disabled) => "lock disabled".to_string(),
        MatchOutcome::Recorded(_) => "pattern saved".to_string(),
        MatchOutcome::Cleared => "cleared".to_string(),
        _ => return None,
    };
    Some(msg)
}

// ── Main loop ─────────────────────────────────────────────────────────────────

fn run(terminal: &mut Term, app: &mut App) -> Result<()> {
    loop {
        let now = Instant::now();
        app.before_frame(now);
        let telemetry = app.sampler.sample(now);
        terminal.draw(|f| app.draw(f, telemetry, now))?;

        if event::poll(FRAME)? {
            let now = Instant::now();
            match event::read()? {
                Event::Key(key) => app.on_key(key, now),
                Event::Mouse(m) => app.on_mouse(m, now),
                Event::Resize(w, h) => app.on_resize(w, h),
                _ => {}
            }
        }

        let requests = app.host.take_requests();
        if requests.quit || app.quit {
            info!("leaving shell");
            return Ok(());
        }
        if requests.haptic {
            if let Some(pad) = app.pad.as_mut() {
                pad.rumble();
            }
        }
        if requests.suspend {
            info!("suspending to host terminal");
            suspend(terminal)?;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_file = logging::init(LogOptions {
        verbose: cli.verbose,
        disabled: cli.no_logs,
    });

    let paths = ConfigPaths::new(cli.config_dir);
    if let Err(e) = paths.ensure() {
        warn!(error = %format!("{e:#}"), "config directory unavailable");
    }
    let settings = load_settings(&paths);
    let profiles = load_profiles(&paths);
    info!(root = %paths.root().display(), profiles = profiles.len(), "starting");

    let mut terminal = init_terminal()?;
    let size = terminal.size()?;
    let screen = Rect::new(0, 0, size.width, size.height);
    let mut config = settings.shell_config();
    config.desk = ui::to_win_rect(ui::desk_area(screen));
    config.metrics = TERMINAL_METRICS;

    let now = Instant::now();
    let mut shell = Shell::new(config, profiles, actions::default_grid(), now);
    if cli.no_boot {
        shell.skip_boot(now);
    }

    let mut app = App {
        shell,
        host: SystemHost::new(paths.clone()),
        pad: GilrsPad::new(),
        paths: paths.clone(),
        palette: Palette::from_hue(settings.theme_hue),
        settings,
        views: HashMap::new(),
        sampler: TelemetrySampler::new(),
        feed: library::spawn_scan(paths),
        message: None,
        press: None,
        screen,
        started: now,
        quit: false,
    };

    let result = run(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    if let Some(path) = log_file {
        eprintln!("log written to {}", path.display());
    }
    result
}
