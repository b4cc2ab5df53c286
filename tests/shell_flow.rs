use aether_shell::config::{load_profiles, upsert_profile, ConfigPaths};
use aether_shell::core::feed::{FeedBatch, GameRecord};
use aether_shell::core::input::RawInput;
use aether_shell::core::menu::{ExternalRef, MenuCategory, MenuGrid, MenuItem};
use aether_shell::core::pattern::{LockSetting, MatchOutcome};
use aether_shell::core::profile::{default_profiles, Profile};
use aether_shell::core::shell::LIBRARY_CATEGORY;
use aether_shell::core::{Host, Outcome, SessionPhase, Shell, ShellConfig};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

/// Records every request and persists profiles like the real host does.
#[derive(Default)]
struct RecordingHost {
    calls: Vec<String>,
    paths: Option<ConfigPaths>,
}

impl Host for RecordingHost {
    fn launch(&mut self, target: &ExternalRef) {
        self.calls.push(format!("launch {}", target.launch_ref));
    }
    fn open_external_url(&mut self, url: &str) {
        self.calls.push(format!("url {url}"));
    }
    fn shutdown(&mut self) {
        self.calls.push("shutdown".into());
    }
    fn reboot(&mut self) {
        self.calls.push("reboot".into());
    }
    fn minimize_host_window(&mut self) {
        self.calls.push("minimize".into());
    }
    fn persist_profile(&mut self, profile: &Profile) {
        self.calls.push(format!("persist {}", profile.id));
        if let Some(paths) = &self.paths {
            upsert_profile(paths, profile).unwrap();
        }
    }
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
        MenuCategory::new(
            "settings",
            "SETTINGS",
            "gear",
            60,
            vec![MenuItem::app("config", "Configuration", "gear", "settings")],
        ),
        MenuCategory::dynamic(LIBRARY_CATEGORY, "LIBRARY", "gamepad", 210),
    ])
}

/// Drives a shell with keys spaced past the debounce window.
struct Driver {
    shell: Shell,
    host: RecordingHost,
    now: Instant,
}

impl Driver {
    fn booted(profiles: Vec<Profile>) -> Self {
        let t0 = Instant::now();
        let mut shell = Shell::new(ShellConfig::default(), profiles, grid(), t0);
        let now = t0 + Duration::from_millis(1500);
        assert!(shell.tick(now));
        assert_eq!(shell.phase(), &SessionPhase::Login);
        Self {
            shell,
            host: RecordingHost::default(),
            now,
        }
    }

    fn key(&mut self, code: KeyCode) -> Outcome {
        self.now += Duration::from_millis(200);
        let raw = RawInput::Key(KeyEvent::new(code, KeyModifiers::NONE));
        self.shell.submit(&raw, self.now, &mut self.host)
    }

    fn keys(&mut self, codes: &[KeyCode]) -> Outcome {
        codes.iter().fold(Outcome::Ignored, |_, code| self.key(*code))
    }
}

const USER1: [KeyCode; 4] = [KeyCode::Up, KeyCode::Up, KeyCode::Down, KeyCode::Down];

#[test]
fn boot_login_launch_lock_and_sign_out() {
    let mut d = Driver::booted(default_profiles());

    assert_eq!(d.key(KeyCode::Enter), Outcome::Authenticating);
    assert_eq!(d.keys(&USER1), Outcome::SignedIn);
    assert_eq!(d.shell.phase(), &SessionPhase::Ready);
    assert_eq!(d.shell.session().selection().column, 2);

    d.shell.apply_feed(FeedBatch::Games(vec![GameRecord {
        id: "620".into(),
        name: "Portal 2".into(),
        source: "Steam".into(),
        launch_ref: "steam://run/620".into(),
        minutes_played: 90,
        last_played_at: None,
    }]));
    assert_eq!(d.key(KeyCode::Down), Outcome::Navigated);
    assert!(matches!(d.key(KeyCode::Enter), Outcome::Launched(_)));
    assert_eq!(d.host.calls, vec!["launch steam://run/620".to_string()]);

    assert_eq!(d.key(KeyCode::Left), Outcome::Navigated);
    let Outcome::Opened(window) = d.key(KeyCode::Enter) else {
        panic!("settings should open a window");
    };
    assert_eq!(d.shell.windows().focused(), Some(window));
    assert_eq!(
        d.key(KeyCode::Down),
        Outcome::Routed {
            window,
            action: aether_shell::core::input::CanonicalAction::Down
        }
    );

    d.now += Duration::from_millis(200);
    assert!(d.shell.lock(d.now));
    assert_eq!(d.key(KeyCode::Up), Outcome::Ignored);
    assert_eq!(d.key(KeyCode::Enter), Outcome::Authenticating);
    assert_eq!(d.keys(&USER1), Outcome::SignedIn);
    assert_eq!(d.shell.phase(), &SessionPhase::Ready);
    assert!(d.shell.windows().get(window).is_some());

    d.now += Duration::from_millis(200);
    d.shell.sign_out(d.now);
    assert_eq!(d.shell.phase(), &SessionPhase::Login);
    assert!(d.shell.windows().windows().is_empty());
    assert!(d.shell.session().active_profile().is_none());
}

#[test]
fn idle_timeout_locks_a_signed_in_session() {
    let mut d = Driver::booted(default_profiles());
    // Nothing to lock at the login screen.
    assert!(!d.shell.tick(d.now + Duration::from_secs(600)));

    d.key(KeyCode::Enter);
    d.keys(&USER1);
    assert!(!d.shell.tick(d.now + Duration::from_secs(299)));
    assert!(d.shell.tick(d.now + Duration::from_secs(300)));
    assert_eq!(d.shell.phase(), &SessionPhase::Locked);
}

#[test]
fn first_run_pattern_is_persisted_and_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::new(Some(dir.path().to_path_buf()));

    let mut d = Driver::booted(vec![Profile::new("guest", "Guest")]);
    d.host.paths = Some(paths.clone());
    assert_eq!(d.key(KeyCode::Enter), Outcome::Authenticating);
    d.keys(&[KeyCode::Right, KeyCode::Down, KeyCode::Left, KeyCode::Up]);
    assert_eq!(d.key(KeyCode::Char(' ')), Outcome::SignedIn);
    assert_eq!(d.host.calls, vec!["persist guest".to_string()]);

    let stored = load_profiles(&paths);
    let guest = stored.iter().find(|p| p.id == "guest").unwrap();
    let LockSetting::Pattern(pattern) = &guest.lock else {
        panic!("expected a stored pattern, got {:?}", guest.lock);
    };
    assert_eq!(pattern.to_string(), "right,down,left,up");

    // A fresh shell with the stored profiles enforces it.
    let cursor = stored.iter().position(|p| p.id == "guest").unwrap();
    let mut d = Driver::booted(stored.clone());
    for _ in 0..cursor {
        d.key(KeyCode::Right);
    }
    assert_eq!(d.key(KeyCode::Enter), Outcome::Authenticating);
    let wrong = [KeyCode::Up, KeyCode::Up, KeyCode::Up, KeyCode::Up];
    assert_eq!(d.keys(&wrong), Outcome::Auth(MatchOutcome::Mismatch { failures: 1 }));
    assert_eq!(d.keys(&wrong), Outcome::Auth(MatchOutcome::Mismatch { failures: 2 }));
    assert_eq!(d.keys(&wrong), Outcome::Auth(MatchOutcome::LockedOut));
    assert_eq!(d.shell.phase(), &SessionPhase::Login);
}

#[test]
fn registered_profile_records_its_pattern_at_first_sign_in() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::new(Some(dir.path().to_path_buf()));

    let mut d = Driver::booted(default_profiles());
    d.host.paths = Some(paths.clone());
    d.key(KeyCode::Enter);
    assert_eq!(d.keys(&USER1), Outcome::SignedIn);
    let id = d.shell.add_profile("Eve", "#8b5cf6", &mut d.host).unwrap();
    assert_eq!(d.host.calls, vec![format!("persist {id}")]);

    let stored = load_profiles(&paths);
    assert_eq!(stored.len(), 3);
    let mut d = Driver::booted(stored);
    d.key(KeyCode::Right);
    d.key(KeyCode::Right);
    assert_eq!(d.key(KeyCode::Enter), Outcome::Authenticating);
    assert_eq!(d.shell.session().active_profile().map(|p| p.name.as_str()), Some("Eve"));
    d.keys(&[KeyCode::Left, KeyCode::Left, KeyCode::Right, KeyCode::Right]);
    assert_eq!(d.key(KeyCode::Char(' ')), Outcome::SignedIn);
}
