//! Session phase and grid navigation.
//!
//! Phases run `Booting → Login → Authenticating → Ready ⇄ Running(app)`, with
//! `Locked` reachable from any signed-in phase. The machine owns the grid and
//! the selection; the window set is borrowed from the caller per action.

use super::host::Host;
use super::input::{CanonicalAction, ShellSignal};
use super::menu::{ActionRef, AppId, ExternalRef, GridCoordinate, ItemPayload, LaunchMode, MenuGrid, MenuItem};
use super::pattern::{LockSetting, MatchOutcome, PatternMatcher};
use super::profile::{next_profile_id, Profile, ProfileError};
use super::window::{ContentRef, WindowId, WindowManager};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Booting,
    Login,
    Authenticating,
    Ready,
    Locked,
    Running(AppId),
}

/// What a single action did, for the presentation layer to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Navigated,
    Authenticating,
    Auth(MatchOutcome),
    SignedIn,
    SignedOut,
    Invoke(ActionRef),
    Opened(WindowId),
    Launched(ExternalRef),
    Routed {
        window: WindowId,
        action: CanonicalAction,
    },
    ClosedApp(WindowId),
    TaskbarToggled(bool),
}

#[derive(Debug, Clone)]
pub struct Session {
    phase: SessionPhase,
    profiles: Vec<Profile>,
    login_cursor: usize,
    profile: Option<usize>,
    grid: MenuGrid,
    selection: GridCoordinate,
    default_column: usize,
    matcher: PatternMatcher,
    resume: Option<AppId>,
}

impl Session {
    pub fn new(profiles: Vec<Profile>, grid: MenuGrid, default_column: usize) -> Self {
        let default_column = default_column.min(grid.len().saturating_sub(1));
        Self {
            phase: SessionPhase::Booting,
            profiles,
            login_cursor: 0,
            profile: None,
            grid,
            selection: GridCoordinate::new(default_column, None),
            default_column,
            matcher: PatternMatcher::default(),
            resume: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn accepts_input(&self) -> bool {
        self.phase != SessionPhase::Booting
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn login_cursor(&self) -> usize {
        self.login_cursor
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        self.profile.and_then(|idx| self.profiles.get(idx))
    }

    pub fn grid(&self) -> &MenuGrid {
        &self.grid
    }

    pub fn default_column(&self) -> usize {
        self.default_column
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Always in range, even if the column shrank since the last action.
    pub fn selection(&self) -> GridCoordinate {
        self.selection
            .clamped(self.grid.item_count(self.selection.column))
    }

    pub fn selected_item(&self) -> Option<&MenuItem> {
        self.grid.item(self.selection())
    }

    // ── Phase transitions ────────────────────────────────────────────────────

    pub fn finish_boot(&mut self) {
        if self.phase == SessionPhase::Booting {
            info!("boot finished");
            self.phase = SessionPhase::Login;
        }
    }

    /// Idle timeout. Without a signed-in profile there is nothing to lock.
    pub fn lock(&mut self) -> bool {
        if self.profile.is_none() || self.phase == SessionPhase::Locked {
            return false;
        }
        if let SessionPhase::Running(app) = &self.phase {
            self.resume = Some(app.clone());
        }
        info!(from = ?self.phase, "session locked");
        self.phase = SessionPhase::Locked;
        true
    }

    pub fn sign_out(&mut self, windows: &mut WindowManager) {
        info!(profile = ?self.active_profile().map(|p| &p.id), "signed out");
        self.phase = SessionPhase::Login;
        self.profile = None;
        self.login_cursor = 0;
        self.selection = GridCoordinate::new(self.default_column, None);
        self.matcher.reset();
        self.resume = None;
        windows.close_all();
    }

    fn begin_auth(&mut self) -> Outcome {
        let Some(lock) = self.active_profile().map(|p| p.lock.clone()) else {
            return Outcome::Ignored;
        };
        self.matcher.arm(&lock);
        self.phase = SessionPhase::Authenticating;
        Outcome::Authenticating
    }

    fn enter_ready(&mut self, windows: &WindowManager) -> Outcome {
        self.phase = match self.resume.take() {
            Some(app) if windows.window_for_app(&app).is_some() => SessionPhase::Running(app),
            _ => SessionPhase::Ready,
        };
        info!(phase = ?self.phase, "signed in");
        Outcome::SignedIn
    }

    // ── Roster ───────────────────────────────────────────────────────────────

    /// Registers a profile with no lock yet; it records one at first sign-in.
    pub fn add_profile(&mut self, name: &str, accent: &str, host: &mut dyn Host) -> Result<String, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if self.profiles.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(ProfileError::DuplicateName);
        }
        let profile = Profile {
            accent: accent.to_string(),
            ..Profile::new(&next_profile_id(&self.profiles), name)
        };
        info!(profile = %profile.id, name, "profile registered");
        host.persist_profile(&profile);
        let id = profile.id.clone();
        self.profiles.push(profile);
        Ok(id)
    }

    /// The signed-in profile and the last remaining one cannot be removed.
    pub fn remove_profile(&mut self, id: &str, host: &mut dyn Host) -> Result<Profile, ProfileError> {
        let idx = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or(ProfileError::UnknownProfile)?;
        if self.profile == Some(idx) {
            return Err(ProfileError::ActiveProfile);
        }
        if self.profiles.len() == 1 {
            return Err(ProfileError::LastProfile);
        }
        let removed = self.profiles.remove(idx);
        if let Some(active) = self.profile.as_mut() {
            if *active > idx {
                *active -= 1;
            }
        }
        self.login_cursor = self.login_cursor.min(self.profiles.len() - 1);
        info!(profile = %removed.id, "profile removed");
        host.remove_profile(&removed.id);
        Ok(removed)
    }

    /// Replaces the signed-in profile's lock.
    pub fn set_active_lock(&mut self, lock: LockSetting, host: &mut dyn Host) -> Result<(), ProfileError> {
        if self.profile.is_none() {
            return Err(ProfileError::NotSignedIn);
        }
        self.store_lock(lock, host);
        Ok(())
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    pub fn handle(
        &mut self,
        action: CanonicalAction,
        windows: &mut WindowManager,
        host: &mut dyn Host,
    ) -> Outcome {
        self.sync_running(windows);
        match self.phase.clone() {
            SessionPhase::Booting => Outcome::Ignored,
            SessionPhase::Login => self.handle_login(action),
            SessionPhase::Authenticating => self.handle_auth(action, windows),
            SessionPhase::Locked => {
                if action == CanonicalAction::Enter {
                    self.begin_auth()
                } else {
                    Outcome::Ignored
                }
            }
            SessionPhase::Ready => match windows.focused() {
                Some(window) => Outcome::Routed { window, action },
                None => self.handle_grid(action, windows, host),
            },
            SessionPhase::Running(app) => self.handle_running(&app, action, windows),
        }
    }

    pub fn signal(&mut self, signal: ShellSignal, host: &mut dyn Host, windows: &WindowManager) -> Outcome {
        if self.phase != SessionPhase::Authenticating {
            return Outcome::Ignored;
        }
        let result = match signal {
            ShellSignal::CommitPattern => self.matcher.commit(),
            ShellSignal::DisableLock => self.matcher.disable(),
            ShellSignal::ToggleTaskbar => return Outcome::Ignored,
        };
        match result {
            MatchOutcome::Recorded(lock) => {
                self.store_lock(lock, host);
                self.enter_ready(windows)
            }
            MatchOutcome::Ignored => Outcome::Ignored,
            other => Outcome::Auth(other),
        }
    }

    fn store_lock(&mut self, lock: LockSetting, host: &mut dyn Host) {
        let Some(profile) = self.profile.and_then(|idx| self.profiles.get_mut(idx)) else {
            return;
        };
        profile.lock = lock;
        host.persist_profile(profile);
    }

    fn handle_login(&mut self, action: CanonicalAction) -> Outcome {
        match action {
            CanonicalAction::Left if self.login_cursor > 0 => {
                self.login_cursor -= 1;
                Outcome::Navigated
            }
            CanonicalAction::Right if self.login_cursor + 1 < self.profiles.len() => {
                self.login_cursor += 1;
                Outcome::Navigated
            }
            CanonicalAction::Enter if self.login_cursor < self.profiles.len() => {
                self.profile = Some(self.login_cursor);
                info!(profile = %self.profiles[self.login_cursor].id, "profile selected");
                self.begin_auth()
            }
            _ => Outcome::Ignored,
        }
    }

    fn handle_auth(&mut self, action: CanonicalAction, windows: &mut WindowManager) -> Outcome {
        if action == CanonicalAction::Back && self.matcher.entered().is_empty() {
            self.sign_out(windows);
            return Outcome::SignedOut;
        }
        match self.matcher.feed(action) {
            MatchOutcome::Accepted => self.enter_ready(windows),
            MatchOutcome::LockedOut => {
                warn!("too many failed unlock attempts; returning to profile selection");
                self.sign_out(windows);
                Outcome::Auth(MatchOutcome::LockedOut)
            }
            other => Outcome::Auth(other),
        }
    }

    fn handle_running(
        &mut self,
        app: &AppId,
        action: CanonicalAction,
        windows: &mut WindowManager,
    ) -> Outcome {
        let Some(window) = windows.window_for_app(app).map(|w| w.id) else {
            self.phase = SessionPhase::Ready;
            return Outcome::Ignored;
        };
        if action == CanonicalAction::Back {
            windows.close(window);
            self.phase = SessionPhase::Ready;
            info!(%app, "full-screen app closed");
            return Outcome::ClosedApp(window);
        }
        Outcome::Routed { window, action }
    }

    /// A full-screen app closed through another path falls back to the grid.
    fn sync_running(&mut self, windows: &WindowManager) {
        if let SessionPhase::Running(app) = &self.phase {
            if windows.window_for_app(app).is_none() {
                debug!(%app, "running app vanished");
                self.phase = SessionPhase::Ready;
            }
        }
    }

    fn handle_grid(
        &mut self,
        action: CanonicalAction,
        windows: &mut WindowManager,
        host: &mut dyn Host,
    ) -> Outcome {
        let before = self.selection();
        let mut sel = before;
        match action {
            CanonicalAction::Left if sel.column > 0 => {
                sel.column -= 1;
                sel = sel.clamped(self.grid.item_count(sel.column));
            }
            CanonicalAction::Right if sel.column + 1 < self.grid.len() => {
                sel.column += 1;
                sel = sel.clamped(self.grid.item_count(sel.column));
            }
            CanonicalAction::Down => {
                let count = self.grid.item_count(sel.column);
                sel.row = match sel.row {
                    None if count > 0 => Some(0),
                    None => None,
                    Some(r) => Some((r + 1).min(count.saturating_sub(1))),
                };
            }
            CanonicalAction::Up => {
                sel.row = match sel.row {
                    Some(0) | None => None,
                    Some(r) => Some(r - 1),
                };
            }
            CanonicalAction::Back => {
                if sel.row.is_some() {
                    sel.row = None;
                } else {
                    sel.column = self.default_column;
                }
            }
            CanonicalAction::Enter => return self.activate(windows, host),
            _ => {}
        }
        self.selection = sel;
        if sel == before {
            Outcome::Ignored
        } else {
            debug!(column = sel.column, row = ?sel.row, "selection moved");
            Outcome::Navigated
        }
    }

    fn activate(&mut self, windows: &mut WindowManager, host: &mut dyn Host) -> Outcome {
        let Some(item) = self.selected_item().cloned() else {
            return Outcome::Ignored;
        };
        match item.payload {
            ItemPayload::Action(action) => {
                debug!(action = action.as_str(), "invoking item action");
                Outcome::Invoke(action)
            }
            ItemPayload::OpenApp { app, mode } => {
                let id = windows.open(app.clone(), &item.label, ContentRef(app.0.clone()));
                if mode == LaunchMode::Fullscreen {
                    if windows.get(id).is_some_and(|w| !w.maximized) {
                        windows.toggle_maximize(id);
                    }
                    self.phase = SessionPhase::Running(app);
                }
                Outcome::Opened(id)
            }
            ItemPayload::LaunchExternal(target) => {
                info!(launch_ref = %target.launch_ref, "launching external");
                host.launch(&target);
                Outcome::Launched(target)
            }
        }
    }

    // ── Feed updates ─────────────────────────────────────────────────────────

    /// Replaces a dynamic column. A selection inside it follows its item by
    /// id when the item survives, otherwise it is clamped.
    pub fn replace_column_items(&mut self, category_id: &str, items: Vec<MenuItem>) -> bool {
        let Some(column) = self.grid.position(category_id) else {
            warn!(category_id, "feed update for unknown category");
            return false;
        };
        let followed = (self.selection.column == column)
            .then(|| self.selected_item().map(|i| i.id.clone()))
            .flatten();
        if !self.grid.replace_items(column, items) {
            return false;
        }
        if self.selection.column == column {
            let moved_to = followed.and_then(|id| {
                self.grid
                    .column(column)
                    .and_then(|c| c.items.iter().position(|i| i.id == id))
            });
            self.selection.row = moved_to.or(self.selection.row);
            self.reclamp();
        }
        true
    }

    pub fn reclamp(&mut self) {
        self.selection = self.selection();
    }
}
