//! Composition root: owns the dispatcher, session, windows and library feed,
//! and drives the timers (boot splash, idle lock) from injected timestamps.

use super::feed::{FeedBatch, LibraryFeed};
use super::host::Host;
use super::input::{Dispatched, GamepadSource, InputConfig, InputDispatcher, RawInput, ShellSignal};
use super::menu::MenuGrid;
use super::pattern::LockSetting;
use super::profile::{Profile, ProfileError};
use super::session::{Outcome, Session, SessionPhase};
use super::window::{WinRect, WindowManager, WindowMetrics};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const LIBRARY_CATEGORY: &str = "game";

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub input: InputConfig,
    pub boot: Duration,
    pub idle_lock: Option<Duration>,
    pub default_column: usize,
    pub show_taskbar: bool,
    pub desk: WinRect,
    pub metrics: WindowMetrics,
    pub library_category: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            boot: Duration::from_millis(1500),
            idle_lock: Some(Duration::from_secs(300)),
            default_column: 2,
            show_taskbar: false,
            desk: WinRect::new(0, 0, 1920, 1080),
            metrics: WindowMetrics::default(),
            library_category: LIBRARY_CATEGORY.to_string(),
        }
    }
}

pub struct Shell {
    dispatcher: InputDispatcher,
    session: Session,
    windows: WindowManager,
    feed: LibraryFeed,
    boot_deadline: Option<Instant>,
    idle_lock: Option<Duration>,
    last_activity: Instant,
    taskbar: bool,
}

impl Shell {
    pub fn new(config: ShellConfig, profiles: Vec<Profile>, grid: MenuGrid, now: Instant) -> Self {
        let mut dispatcher = InputDispatcher::new(config.input);
        dispatcher.set_blocked(true);
        Self {
            dispatcher,
            session: Session::new(profiles, grid, config.default_column),
            windows: WindowManager::new(config.desk, config.metrics),
            feed: LibraryFeed::new(&config.library_category),
            boot_deadline: Some(now + config.boot),
            idle_lock: config.idle_lock,
            last_activity: now,
            taskbar: config.show_taskbar,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> &SessionPhase {
        self.session.phase()
    }

    pub fn windows(&self) -> &WindowManager {
        &self.windows
    }

    pub fn windows_mut(&mut self) -> &mut WindowManager {
        &mut self.windows
    }

    pub fn taskbar_visible(&self) -> bool {
        self.taskbar
    }

    pub fn set_text_entry_focused(&mut self, focused: bool) {
        self.dispatcher.set_text_entry_focused(focused);
    }

    // ── Timers ───────────────────────────────────────────────────────────────

    /// Advances the boot splash and the idle lock. Returns true when the
    /// phase changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.boot_deadline {
            if now >= deadline {
                self.finish_boot(now);
                return true;
            }
            return false;
        }
        let Some(idle) = self.idle_lock else {
            return false;
        };
        if now.saturating_duration_since(self.last_activity) >= idle && self.session.lock() {
            info!(idle_secs = idle.as_secs(), "idle timeout");
            self.dispatcher.invalidate(now);
            return true;
        }
        false
    }

    pub fn skip_boot(&mut self, now: Instant) {
        if self.boot_deadline.is_some() {
            self.finish_boot(now);
        }
    }

    fn finish_boot(&mut self, now: Instant) {
        self.boot_deadline = None;
        self.session.finish_boot();
        self.dispatcher.set_blocked(false);
        self.dispatcher.invalidate(now);
        self.last_activity = now;
    }

    // ── Input ────────────────────────────────────────────────────────────────

    pub fn submit(&mut self, raw: &RawInput, now: Instant, host: &mut dyn Host) -> Outcome {
        match self.dispatcher.submit(raw, now) {
            Some(dispatched) => self.dispatch(dispatched, now, host),
            None => Outcome::Ignored,
        }
    }

    pub fn poll_gamepad(&mut self, pad: &mut dyn GamepadSource, now: Instant, host: &mut dyn Host) -> Outcome {
        match self.dispatcher.poll(pad, now) {
            Some(dispatched) => self.dispatch(dispatched, now, host),
            None => Outcome::Ignored,
        }
    }

    fn dispatch(&mut self, dispatched: Dispatched, now: Instant, host: &mut dyn Host) -> Outcome {
        self.last_activity = now;
        let before = self.identity();
        let outcome = match dispatched {
            Dispatched::Signal(ShellSignal::ToggleTaskbar) => {
                self.taskbar = !self.taskbar;
                debug!(visible = self.taskbar, "taskbar toggled");
                Outcome::TaskbarToggled(self.taskbar)
            }
            Dispatched::Signal(signal) => self.session.signal(signal, host, &self.windows),
            Dispatched::Action { action, haptic, .. } => {
                if haptic {
                    host.haptic_pulse();
                }
                self.session.handle(action, &mut self.windows, host)
            }
        };
        if self.identity() != before {
            self.dispatcher.invalidate(now);
        }
        outcome
    }

    /// Phase kind plus signed-in profile; a change invalidates queued input.
    fn identity(&self) -> (std::mem::Discriminant<SessionPhase>, Option<String>) {
        (
            std::mem::discriminant(self.session.phase()),
            self.session.active_profile().map(|p| p.id.clone()),
        )
    }

    // ── Session commands ─────────────────────────────────────────────────────

    pub fn sign_out(&mut self, now: Instant) {
        self.session.sign_out(&mut self.windows);
        self.dispatcher.invalidate(now);
    }

    pub fn lock(&mut self, now: Instant) -> bool {
        let locked = self.session.lock();
        if locked {
            self.dispatcher.invalidate(now);
        }
        locked
    }

    pub fn add_profile(&mut self, name: &str, accent: &str, host: &mut dyn Host) -> Result<String, ProfileError> {
        self.session.add_profile(name, accent, host)
    }

    pub fn remove_profile(&mut self, id: &str, host: &mut dyn Host) -> Result<Profile, ProfileError> {
        self.session.remove_profile(id, host)
    }

    pub fn set_active_lock(&mut self, lock: LockSetting, host: &mut dyn Host) -> Result<(), ProfileError> {
        self.session.set_active_lock(lock, host)
    }

    // ── Library ──────────────────────────────────────────────────────────────

    pub fn apply_feed(&mut self, batch: FeedBatch) {
        let items = self.feed.apply(batch);
        self.session.replace_column_items(self.feed.category_id(), items);
    }

    pub fn record_activity(&mut self, game_id: &str, minutes_played: u64) -> bool {
        match self.feed.record_activity(game_id, minutes_played) {
            Some(items) => self.session.replace_column_items(self.feed.category_id(), items),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::GameRecord;
    use crate::core::host::NullHost;
    use crate::core::input::{CanonicalAction, GamepadState};
    use crate::core::menu::{MenuCategory, MenuItem};
    use crate::core::profile::default_profiles;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> RawInput {
        RawInput::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn grid() -> MenuGrid {
        MenuGrid::new(vec![
            MenuCategory::new(
                "user",
                "USERS",
                "users",
                240,
                vec![MenuItem::action("lock", "Standby", "lock", "session.lock")],
            ),
            MenuCategory::new("settings", "SETTINGS", "gear", 60, Vec::new()),
            MenuCategory::dynamic(LIBRARY_CATEGORY, "GAMES", "gamepad", 210),
        ])
    }

    fn booted(now: Instant) -> Shell {
        let mut shell = Shell::new(ShellConfig::default(), default_profiles(), grid(), now);
        shell.skip_boot(now);
        shell
    }

    /// Feeds keys 200ms apart, starting one debounce window after `start`.
    fn type_keys(shell: &mut Shell, start: Instant, codes: &[KeyCode]) -> Instant {
        let mut at = start;
        for code in codes {
            at += Duration::from_millis(200);
            shell.submit(&key(*code), at, &mut NullHost);
        }
        at
    }

    #[test]
    fn boot_blocks_input_until_deadline() {
        let t0 = Instant::now();
        let mut shell = Shell::new(ShellConfig::default(), default_profiles(), grid(), t0);
        assert_eq!(
            shell.submit(&key(KeyCode::Enter), t0 + Duration::from_millis(500), &mut NullHost),
            Outcome::Ignored
        );
        assert!(!shell.tick(t0 + Duration::from_millis(1499)));
        assert!(shell.tick(t0 + Duration::from_millis(1500)));
        assert_eq!(shell.phase(), &SessionPhase::Login);
    }

    #[test]
    fn keyboard_and_wheel_share_one_debounce_window() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let t = type_keys(&mut shell, t0, &[KeyCode::Enter]);
        assert_eq!(shell.phase(), &SessionPhase::Authenticating);
        let t = t + Duration::from_millis(200);
        assert!(matches!(
            shell.submit(&key(KeyCode::Up), t, &mut NullHost),
            Outcome::Auth(_)
        ));
        let wheel = RawInput::Wheel { dx: 0.0, dy: -40.0 };
        assert_eq!(
            shell.submit(&wheel, t + Duration::from_millis(50), &mut NullHost),
            Outcome::Ignored
        );
        assert_eq!(shell.session().matcher().entered().len(), 1);
    }

    #[test]
    fn phase_change_drops_inputs_stamped_before_it() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let t = type_keys(&mut shell, t0, &[KeyCode::Enter]);
        // Stamped before the transition that just happened.
        assert_eq!(
            shell.submit(&key(KeyCode::Up), t - Duration::from_millis(1), &mut NullHost),
            Outcome::Ignored
        );
    }

    #[test]
    fn idle_timeout_locks_signed_in_session() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let t = type_keys(
            &mut shell,
            t0,
            &[KeyCode::Enter, KeyCode::Up, KeyCode::Up, KeyCode::Down, KeyCode::Down],
        );
        assert_eq!(shell.phase(), &SessionPhase::Ready);
        assert!(!shell.tick(t + Duration::from_secs(299)));
        assert!(shell.tick(t + Duration::from_secs(300)));
        assert_eq!(shell.phase(), &SessionPhase::Locked);
        assert!(!shell.tick(t + Duration::from_secs(900)));
    }

    #[test]
    fn idle_lock_drops_input_stamped_before_it() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let t = type_keys(
            &mut shell,
            t0,
            &[KeyCode::Enter, KeyCode::Up, KeyCode::Up, KeyCode::Down, KeyCode::Down],
        );
        let lock_at = t + Duration::from_secs(300);
        assert!(shell.tick(lock_at));
        // Queued while the timer fired: past the debounce window but older
        // than the lock.
        assert_eq!(
            shell.submit(&key(KeyCode::Enter), lock_at - Duration::from_secs(1), &mut NullHost),
            Outcome::Ignored
        );
        assert_eq!(shell.phase(), &SessionPhase::Locked);
        assert_eq!(
            shell.submit(&key(KeyCode::Enter), lock_at + Duration::from_millis(200), &mut NullHost),
            Outcome::Authenticating
        );
    }

    #[test]
    fn idle_timeout_without_profile_is_noop() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        assert!(!shell.tick(t0 + Duration::from_secs(600)));
        assert_eq!(shell.phase(), &SessionPhase::Login);
    }

    #[test]
    fn taskbar_toggle_bypasses_debounce() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let t = type_keys(&mut shell, t0, &[KeyCode::Right]);
        assert_eq!(
            shell.submit(&key(KeyCode::Char('h')), t, &mut NullHost),
            Outcome::TaskbarToggled(true)
        );
        assert!(shell.taskbar_visible());
    }

    #[test]
    fn gamepad_haptics_reach_host() {
        struct Counting(u32);
        impl Host for Counting {
            fn launch(&mut self, _: &crate::core::menu::ExternalRef) {}
            fn open_external_url(&mut self, _: &str) {}
            fn shutdown(&mut self) {}
            fn reboot(&mut self) {}
            fn minimize_host_window(&mut self) {}
            fn persist_profile(&mut self, _: &Profile) {}
            fn haptic_pulse(&mut self) {
                self.0 += 1;
            }
        }
        struct OnePress(Option<GamepadState>);
        impl GamepadSource for OnePress {
            fn poll(&mut self) -> Option<GamepadState> {
                self.0.take()
            }
        }
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let mut host = Counting(0);
        let mut buttons = vec![false; 17];
        buttons[crate::core::input::BUTTON_RIGHT] = true;
        let mut pad = OnePress(Some(GamepadState { buttons, axes: Vec::new() }));
        let out = shell.poll_gamepad(&mut pad, t0 + Duration::from_millis(200), &mut host);
        assert_eq!(out, Outcome::Navigated);
        assert_eq!(shell.session().login_cursor(), 1);
        assert_eq!(host.0, 1);
        assert_eq!(
            shell.poll_gamepad(&mut pad, t0 + Duration::from_millis(400), &mut host),
            Outcome::Ignored
        );
        assert_eq!(host.0, 1);
    }

    #[test]
    fn feed_batches_land_in_library_column() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        shell.apply_feed(FeedBatch::Games(vec![GameRecord {
            id: "620".into(),
            name: "Portal 2".into(),
            source: "Steam".into(),
            launch_ref: "steam://run/620".into(),
            minutes_played: 0,
            last_played_at: None,
        }]));
        assert_eq!(shell.session().grid().item_count(2), 1);
        assert!(shell.record_activity("620", 90));
        let item = shell.session().grid().column(2).map(|c| c.items[0].clone());
        assert_eq!(item.and_then(|i| i.subtext).as_deref(), Some("1h 30m played"));
        assert!(!shell.record_activity("missing", 1));
    }

    #[test]
    fn direction_keys_route_to_focused_window() {
        let t0 = Instant::now();
        let mut shell = booted(t0);
        let t = type_keys(
            &mut shell,
            t0,
            &[KeyCode::Enter, KeyCode::Up, KeyCode::Up, KeyCode::Down, KeyCode::Down],
        );
        let id = shell.windows_mut().open(
            crate::core::menu::AppId::new("notepad"),
            "Text Editor",
            crate::core::window::ContentRef("notepad".into()),
        );
        assert_eq!(
            shell.submit(&key(KeyCode::Left), t + Duration::from_millis(200), &mut NullHost),
            Outcome::Routed {
                window: id,
                action: CanonicalAction::Left
            }
        );
    }
}
