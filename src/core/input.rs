//! Canonical input dispatcher.
//!
//! Keyboard, polled gamepad, wheel and touch all collapse into the same six
//! canonical actions. Every action passes one shared debounce timestamp, so
//! two sources can never fire inside the same window.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tracing::trace;

// ── Vocabulary ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalAction {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Back,
}

impl CanonicalAction {
    pub fn is_direction(self) -> bool {
        matches!(self, Self::Up | Self::Down | Self::Left | Self::Right)
    }
}

/// Signals that travel outside the canonical vocabulary and are never debounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSignal {
    CommitPattern,
    DisableLock,
    ToggleTaskbar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Gamepad,
    Wheel,
    Touch,
}

// ── Raw events ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One animation-frame snapshot of a gamepad.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadState {
    pub buttons: Vec<bool>,
    pub axes: Vec<f32>,
}

impl GamepadState {
    pub fn pressed(&self, idx: usize) -> bool {
        self.buttons.get(idx).copied().unwrap_or(false)
    }

    fn axis(&self, idx: usize) -> f32 {
        self.axes.get(idx).copied().unwrap_or(0.0)
    }
}

/// Anything that can be polled once per frame for a gamepad snapshot.
pub trait GamepadSource {
    fn poll(&mut self) -> Option<GamepadState>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Key(KeyEvent),
    Gamepad(GamepadState),
    Wheel { dx: f32, dy: f32 },
    Touch { start: TouchPoint, end: TouchPoint },
}

impl RawInput {
    pub fn source(&self) -> InputSource {
        match self {
            Self::Key(_) => InputSource::Keyboard,
            Self::Gamepad(_) => InputSource::Gamepad,
            Self::Wheel { .. } => InputSource::Wheel,
            Self::Touch { .. } => InputSource::Touch,
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

pub const BUTTON_ENTER: usize = 0;
pub const BUTTON_BACK: usize = 1;
pub const BUTTON_UP: usize = 12;
pub const BUTTON_DOWN: usize = 13;
pub const BUTTON_LEFT: usize = 14;
pub const BUTTON_RIGHT: usize = 15;
const BUTTONS_TASKBAR: [usize; 2] = [8, 16];

const BUTTON_MAP: [(usize, CanonicalAction); 6] = [
    (BUTTON_ENTER, CanonicalAction::Enter),
    (BUTTON_BACK, CanonicalAction::Back),
    (BUTTON_UP, CanonicalAction::Up),
    (BUTTON_DOWN, CanonicalAction::Down),
    (BUTTON_LEFT, CanonicalAction::Left),
    (BUTTON_RIGHT, CanonicalAction::Right),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputConfig {
    pub debounce: Duration,
    pub dead_zone: f32,
    pub wheel_threshold: f32,
    pub tap_slop: f32,
    pub swipe_min: f32,
    pub haptics: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            dead_zone: 0.5,
            wheel_threshold: 5.0,
            tap_slop: 10.0,
            swipe_min: 50.0,
            haptics: true,
        }
    }
}

// ── Classification ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIntent {
    Action(CanonicalAction),
    Signal(ShellSignal),
}

pub fn classify_key(key: &KeyEvent) -> Option<KeyIntent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let intent = match key.code {
        KeyCode::Up => KeyIntent::Action(CanonicalAction::Up),
        KeyCode::Down => KeyIntent::Action(CanonicalAction::Down),
        KeyCode::Left => KeyIntent::Action(CanonicalAction::Left),
        KeyCode::Right => KeyIntent::Action(CanonicalAction::Right),
        KeyCode::Enter => KeyIntent::Action(CanonicalAction::Enter),
        KeyCode::Backspace | KeyCode::Esc => KeyIntent::Action(CanonicalAction::Back),
        KeyCode::Char(' ') => KeyIntent::Signal(ShellSignal::CommitPattern),
        KeyCode::Char('n') | KeyCode::Char('N') => KeyIntent::Signal(ShellSignal::DisableLock),
        KeyCode::Char('h') | KeyCode::Char('H') => KeyIntent::Signal(ShellSignal::ToggleTaskbar),
        _ => return None,
    };
    Some(intent)
}

/// Buttons win over the stick; the stick is only a fallback for directions.
pub fn classify_gamepad(pad: &GamepadState, dead_zone: f32) -> Option<CanonicalAction> {
    if let Some((_, action)) = BUTTON_MAP.iter().find(|(idx, _)| pad.pressed(*idx)) {
        return Some(*action);
    }
    let x = pad.axis(0);
    let y = pad.axis(1);
    if y < -dead_zone {
        Some(CanonicalAction::Up)
    } else if y > dead_zone {
        Some(CanonicalAction::Down)
    } else if x < -dead_zone {
        Some(CanonicalAction::Left)
    } else if x > dead_zone {
        Some(CanonicalAction::Right)
    } else {
        None
    }
}

pub fn classify_wheel(dx: f32, dy: f32, threshold: f32) -> Option<CanonicalAction> {
    let (ax, ay) = (dx.abs(), dy.abs());
    if ay > ax && ay > threshold {
        Some(if dy > 0.0 { CanonicalAction::Down } else { CanonicalAction::Up })
    } else if ax > threshold {
        Some(if dx > 0.0 { CanonicalAction::Right } else { CanonicalAction::Left })
    } else {
        None
    }
}

pub fn classify_touch(
    start: TouchPoint,
    end: TouchPoint,
    tap_slop: f32,
    swipe_min: f32,
) -> Option<CanonicalAction> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    if dx.abs() < tap_slop && dy.abs() < tap_slop {
        return Some(CanonicalAction::Enter);
    }
    if dx.abs() > dy.abs() {
        if dx.abs() < swipe_min {
            return None;
        }
        Some(if dx > 0.0 { CanonicalAction::Right } else { CanonicalAction::Left })
    } else {
        if dy.abs() < swipe_min {
            return None;
        }
        Some(if dy > 0.0 { CanonicalAction::Down } else { CanonicalAction::Up })
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Action {
        action: CanonicalAction,
        source: InputSource,
        haptic: bool,
    },
    Signal(ShellSignal),
}

#[derive(Debug, Clone)]
pub struct InputDispatcher {
    config: InputConfig,
    last_accepted: Option<Instant>,
    barrier: Option<Instant>,
    text_entry_focused: bool,
    blocked: bool,
    taskbar_button_held: bool,
}

impl InputDispatcher {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            last_accepted: None,
            barrier: None,
            text_entry_focused: false,
            blocked: false,
            taskbar_button_held: false,
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Keyboard is ignored entirely while a text-entry control owns focus.
    pub fn set_text_entry_focused(&mut self, focused: bool) {
        self.text_entry_focused = focused;
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Drops every candidate stamped before `now` and restarts the debounce
    /// window there, so nothing queued before a lock or profile switch lands.
    pub fn invalidate(&mut self, now: Instant) {
        self.barrier = Some(now);
        self.last_accepted = Some(now);
        trace!("input debounce invalidated");
    }

    pub fn submit(&mut self, raw: &RawInput, at: Instant) -> Option<Dispatched> {
        if self.barrier.is_some_and(|b| at < b) {
            trace!(source = ?raw.source(), "dropping stale input");
            return None;
        }
        let source = raw.source();
        let action = match raw {
            RawInput::Key(key) => {
                if self.text_entry_focused {
                    return None;
                }
                match classify_key(key)? {
                    KeyIntent::Signal(signal) => {
                        return (!self.blocked).then_some(Dispatched::Signal(signal));
                    }
                    KeyIntent::Action(action) => action,
                }
            }
            RawInput::Gamepad(pad) => {
                let toggle = BUTTONS_TASKBAR.iter().any(|idx| pad.pressed(*idx));
                let rising = toggle && !self.taskbar_button_held;
                self.taskbar_button_held = toggle;
                if rising && !self.blocked {
                    return Some(Dispatched::Signal(ShellSignal::ToggleTaskbar));
                }
                classify_gamepad(pad, self.config.dead_zone)?
            }
            RawInput::Wheel { dx, dy } => classify_wheel(*dx, *dy, self.config.wheel_threshold)?,
            RawInput::Touch { start, end } => {
                classify_touch(*start, *end, self.config.tap_slop, self.config.swipe_min)?
            }
        };
        if self.blocked {
            return None;
        }
        if let Some(last) = self.last_accepted {
            if at.saturating_duration_since(last) < self.config.debounce {
                return None;
            }
        }
        self.last_accepted = Some(at);
        let haptic = self.config.haptics
            && source == InputSource::Gamepad
            && action != CanonicalAction::Back;
        trace!(?action, ?source, "accepted input");
        Some(Dispatched::Action {
            action,
            source,
            haptic,
        })
    }

    /// One animation-frame tick of a polled source.
    pub fn poll(&mut self, pad: &mut dyn GamepadSource, at: Instant) -> Option<Dispatched> {
        let state = pad.poll()?;
        self.submit(&RawInput::Gamepad(state), at)
    }
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new(InputConfig::default())
    }
}
