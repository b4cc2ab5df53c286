use super::pattern::{Gesture, GesturePattern, LockSetting};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Colours offered when registering a profile.
pub const ACCENTS: [&str; 6] = ["#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default = "default_accent")]
    pub accent: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, rename = "pattern")]
    pub lock: LockSetting,
    #[serde(default)]
    pub is_admin: bool,
}

fn default_accent() -> String {
    "#3b82f6".to_string()
}

impl Profile {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            accent: default_accent(),
            avatar: None,
            lock: LockSetting::Unset,
            is_admin: false,
        }
    }

    pub fn initial(&self) -> char {
        self.name.chars().next().unwrap_or('?')
    }
}

/// Why a roster edit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    EmptyName,
    DuplicateName,
    ActiveProfile,
    LastProfile,
    UnknownProfile,
    NotSignedIn,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyName => "name cannot be empty",
            Self::DuplicateName => "name already taken",
            Self::ActiveProfile => "cannot delete the active user",
            Self::LastProfile => "cannot delete the last user",
            Self::UnknownProfile => "no such user",
            Self::NotSignedIn => "nobody is signed in",
        })
    }
}

impl std::error::Error for ProfileError {}

/// First `u<n>` id not taken by any profile.
pub fn next_profile_id(profiles: &[Profile]) -> String {
    (profiles.len() + 1..)
        .map(|n| format!("u{n}"))
        .find(|id| profiles.iter().all(|p| &p.id != id))
        .unwrap_or_default()
}

/// Seed profiles used when nothing has been persisted yet.
pub fn default_profiles() -> Vec<Profile> {
    use Gesture::*;
    vec![
        Profile {
            lock: LockSetting::Pattern(GesturePattern::new(vec![Up, Up, Down, Down])),
            ..Profile::new("u1", "User 1")
        },
        Profile {
            accent: "#ef4444".to_string(),
            lock: LockSetting::Pattern(GesturePattern::new(vec![
                Left, Right, Left, Right, Up, Down, Enter,
            ])),
            is_admin: true,
            ..Profile::new("u2", "Admin")
        },
    ]
}
