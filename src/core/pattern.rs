//! Gesture lock patterns and the matcher that verifies or records them.

use super::input::CanonicalAction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub const MIN_PATTERN_LEN: usize = 4;
pub const MAX_RECORD_LEN: usize = 8;
pub const MAX_STORED_LEN: usize = 10;
pub const MAX_FAILURES: u32 = 3;

const NO_LOCK: &str = "none";

// ── Tokens ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

impl Gesture {
    pub fn from_action(action: CanonicalAction) -> Option<Self> {
        match action {
            CanonicalAction::Up => Some(Self::Up),
            CanonicalAction::Down => Some(Self::Down),
            CanonicalAction::Left => Some(Self::Left),
            CanonicalAction::Right => Some(Self::Right),
            CanonicalAction::Enter => Some(Self::Enter),
            CanonicalAction::Back => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Enter => "enter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternParseError {
    UnknownToken(String),
    TooLong(usize),
}

impl fmt::Display for PatternParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToken(t) => write!(f, "unknown gesture token `{t}`"),
            Self::TooLong(n) => write!(f, "pattern has {n} moves, at most {MAX_STORED_LEN} allowed"),
        }
    }
}

impl std::error::Error for PatternParseError {}

impl FromStr for Gesture {
    type Err = PatternParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "enter" => Ok(Self::Enter),
            other => Err(PatternParseError::UnknownToken(other.to_string())),
        }
    }
}

// ── Patterns ──────────────────────────────────────────────────────────────────

/// Ordered gesture sequence, compared by exact equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GesturePattern(Vec<Gesture>);

impl GesturePattern {
    pub fn new(moves: Vec<Gesture>) -> Self {
        Self(moves)
    }

    pub fn moves(&self) -> &[Gesture] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GesturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(|g| g.as_str()).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for GesturePattern {
    type Err = PatternParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let moves = s
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Gesture>, _>>()?;
        if moves.len() > MAX_STORED_LEN {
            return Err(PatternParseError::TooLong(moves.len()));
        }
        Ok(Self(moves))
    }
}

/// Serialized form on a profile: `"none"`, `""`, or `"up,up,down,down"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LockSetting {
    Disabled,
    #[default]
    Unset,
    Pattern(GesturePattern),
}

impl TryFrom<String> for LockSetting {
    type Error = PatternParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim() {
            NO_LOCK => Ok(Self::Disabled),
            "" => Ok(Self::Unset),
            s => Ok(Self::Pattern(s.parse()?)),
        }
    }
}

impl From<LockSetting> for String {
    fn from(lock: LockSetting) -> Self {
        match lock {
            LockSetting::Disabled => NO_LOCK.to_string(),
            LockSetting::Unset => String::new(),
            LockSetting::Pattern(p) => p.to_string(),
        }
    }
}

// ── Matcher ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    Idle,
    Recording,
    Verifying,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Ignored,
    Progress(usize),
    Cleared,
    Accepted,
    Recorded(LockSetting),
    TooShort,
    Mismatch { failures: u32 },
    LockedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatcher {
    state: MatcherState,
    buffer: Vec<Gesture>,
    expected: Option<GesturePattern>,
    failures: u32,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self {
            state: MatcherState::Idle,
            buffer: Vec::new(),
            expected: None,
            failures: 0,
        }
    }
}

impl PatternMatcher {
    /// Arms the matcher for a profile's lock setting.
    pub fn arm(&mut self, lock: &LockSetting) {
        self.buffer.clear();
        self.expected = None;
        self.state = match lock {
            LockSetting::Disabled => MatcherState::Open,
            LockSetting::Unset => MatcherState::Recording,
            LockSetting::Pattern(p) => {
                self.expected = Some(p.clone());
                MatcherState::Verifying
            }
        };
        debug!(state = ?self.state, "lock matcher armed");
    }

    /// Back to idle, forgetting the failure count.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> MatcherState {
        self.state
    }

    pub fn entered(&self) -> &[Gesture] {
        &self.buffer
    }

    pub fn expected_len(&self) -> Option<usize> {
        self.expected.as_ref().map(GesturePattern::len)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn feed(&mut self, action: CanonicalAction) -> MatchOutcome {
        match self.state {
            MatcherState::Idle => MatchOutcome::Ignored,
            MatcherState::Open => {
                if action == CanonicalAction::Enter {
                    MatchOutcome::Accepted
                } else {
                    MatchOutcome::Ignored
                }
            }
            MatcherState::Recording => self.record(action),
            MatcherState::Verifying => self.verify(action),
        }
    }

    fn record(&mut self, action: CanonicalAction) -> MatchOutcome {
        let Some(gesture) = Gesture::from_action(action) else {
            self.buffer.clear();
            return MatchOutcome::Cleared;
        };
        if self.buffer.len() < MAX_RECORD_LEN {
            self.buffer.push(gesture);
        }
        MatchOutcome::Progress(self.buffer.len())
    }

    fn verify(&mut self, action: CanonicalAction) -> MatchOutcome {
        let Some(gesture) = Gesture::from_action(action) else {
            self.buffer.clear();
            return MatchOutcome::Cleared;
        };
        let Some(expected) = self.expected.as_ref() else {
            return MatchOutcome::Ignored;
        };
        self.buffer.push(gesture);
        if self.buffer.len() < expected.len() {
            return MatchOutcome::Progress(self.buffer.len());
        }
        if self.buffer.len() == expected.len() && self.buffer == expected.moves() {
            info!("lock pattern accepted");
            self.buffer.clear();
            self.failures = 0;
            self.state = MatcherState::Idle;
            return MatchOutcome::Accepted;
        }
        self.fail()
    }

    fn fail(&mut self) -> MatchOutcome {
        self.buffer.clear();
        self.failures += 1;
        info!(failures = self.failures, "lock pattern rejected");
        if self.failures >= MAX_FAILURES {
            self.state = MatcherState::Idle;
            MatchOutcome::LockedOut
        } else {
            MatchOutcome::Mismatch {
                failures: self.failures,
            }
        }
    }

    /// Out-of-band commit while recording.
    pub fn commit(&mut self) -> MatchOutcome {
        if self.state != MatcherState::Recording {
            return MatchOutcome::Ignored;
        }
        if self.buffer.len() < MIN_PATTERN_LEN {
            self.buffer.clear();
            return MatchOutcome::TooShort;
        }
        let pattern = GesturePattern::new(std::mem::take(&mut self.buffer));
        self.state = MatcherState::Idle;
        info!(moves = pattern.len(), "lock pattern recorded");
        MatchOutcome::Recorded(LockSetting::Pattern(pattern))
    }

    /// Opting out of a lock is only offered before any move is recorded.
    pub fn disable(&mut self) -> MatchOutcome {
        if self.state != MatcherState::Recording || !self.buffer.is_empty() {
            return MatchOutcome::Ignored;
        }
        self.state = MatcherState::Idle;
        MatchOutcome::Recorded(LockSetting::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CanonicalAction::*;

    fn verifying(pattern: &str) -> PatternMatcher {
        let mut m = PatternMatcher::default();
        m.arm(&LockSetting::try_from(pattern.to_string()).unwrap());
        m
    }

    fn feed_all(m: &mut PatternMatcher, actions: &[CanonicalAction]) -> MatchOutcome {
        let mut last = MatchOutcome::Ignored;
        for a in actions {
            last = m.feed(*a);
        }
        last
    }

    #[test]
    fn lock_setting_round_trips_through_serialized_form() {
        assert_eq!(LockSetting::try_from("none".to_string()), Ok(LockSetting::Disabled));
        assert_eq!(LockSetting::try_from(String::new()), Ok(LockSetting::Unset));
        let lock = LockSetting::try_from("left,right,enter".to_string()).unwrap();
        assert_eq!(String::from(lock), "left,right,enter");
        assert!(LockSetting::try_from("up,sideways".to_string()).is_err());
    }

    #[test]
    fn verification_is_order_sensitive() {
        let mut m = verifying("up,up,down,down");
        assert_eq!(
            feed_all(&mut m, &[Down, Down, Up, Up]),
            MatchOutcome::Mismatch { failures: 1 }
        );
    }

    #[test]
    fn mismatch_clears_buffer_and_counts() {
        let mut m = verifying("up,up,down,down");
        assert_eq!(m.feed(Up), MatchOutcome::Progress(1));
        assert_eq!(
            feed_all(&mut m, &[Down, Down, Up]),
            MatchOutcome::Mismatch { failures: 1 }
        );
        assert!(m.entered().is_empty());
        assert_eq!(m.failures(), 1);
        assert_eq!(m.state(), MatcherState::Verifying);
    }

    #[test]
    fn third_consecutive_failure_locks_out() {
        let mut m = verifying("up,up,down,down");
        feed_all(&mut m, &[Left, Left, Left, Left]);
        feed_all(&mut m, &[Left, Left, Left, Left]);
        assert_eq!(feed_all(&mut m, &[Left, Left, Left, Left]), MatchOutcome::LockedOut);
    }

    #[test]
    fn success_after_two_failures_is_accepted() {
        let mut m = verifying("up,up,down,down");
        feed_all(&mut m, &[Left, Left, Left, Left]);
        feed_all(&mut m, &[Left, Left, Left, Left]);
        assert_eq!(feed_all(&mut m, &[Up, Up, Down, Down]), MatchOutcome::Accepted);
        assert_eq!(m.failures(), 0);
    }

    #[test]
    fn back_clears_without_counting() {
        let mut m = verifying("up,up,down,down");
        feed_all(&mut m, &[Up, Up]);
        assert_eq!(m.feed(Back), MatchOutcome::Cleared);
        assert!(m.entered().is_empty());
        assert_eq!(m.failures(), 0);
    }

    #[test]
    fn enter_is_a_token_when_verifying() {
        let mut m = verifying("left,right,left,right,up,down,enter");
        assert_eq!(
            feed_all(&mut m, &[Left, Right, Left, Right, Up, Down, Enter]),
            MatchOutcome::Accepted
        );
    }

    #[test]
    fn recording_commit_below_minimum_stays_recording() {
        let mut m = PatternMatcher::default();
        m.arm(&LockSetting::Unset);
        feed_all(&mut m, &[Up, Down, Left]);
        assert_eq!(m.commit(), MatchOutcome::TooShort);
        assert!(m.entered().is_empty());
        assert_eq!(m.state(), MatcherState::Recording);
    }

    #[test]
    fn recording_caps_at_eight_moves_and_commits() {
        let mut m = PatternMatcher::default();
        m.arm(&LockSetting::Unset);
        for _ in 0..12 {
            m.feed(Right);
        }
        assert_eq!(m.entered().len(), MAX_RECORD_LEN);
        match m.commit() {
            MatchOutcome::Recorded(LockSetting::Pattern(p)) => assert_eq!(p.len(), 8),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn disable_only_offered_on_empty_recording() {
        let mut m = PatternMatcher::default();
        m.arm(&LockSetting::Unset);
        m.feed(Up);
        assert_eq!(m.disable(), MatchOutcome::Ignored);
        m.feed(Back);
        assert_eq!(m.disable(), MatchOutcome::Recorded(LockSetting::Disabled));
    }

    #[test]
    fn disabled_lock_accepts_any_enter() {
        let mut m = PatternMatcher::default();
        m.arm(&LockSetting::Disabled);
        assert_eq!(m.feed(Up), MatchOutcome::Ignored);
        assert_eq!(m.feed(Enter), MatchOutcome::Accepted);
    }
}
