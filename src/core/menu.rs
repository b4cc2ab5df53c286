//! Menu grid model: columns of categories, each holding selectable items.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

// ── Identifiers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppId(pub String);

impl AppId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque action handle; the menu never knows what it does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionRef(pub String);

impl ActionRef {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    pub launch_ref: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl ExternalRef {
    pub fn new(launch_ref: &str) -> Self {
        Self {
            launch_ref: launch_ref.to_string(),
            source: None,
        }
    }
}

// ── Items ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    Windowed,
    Fullscreen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPayload {
    Action(ActionRef),
    OpenApp { app: AppId, mode: LaunchMode },
    LaunchExternal(ExternalRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub subtext: Option<String>,
    pub accent: Option<String>,
    pub payload: ItemPayload,
}

impl MenuItem {
    pub fn new(id: &str, label: &str, icon: &str, payload: ItemPayload) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            subtext: None,
            accent: None,
            payload,
        }
    }

    pub fn action(id: &str, label: &str, icon: &str, action: &str) -> Self {
        Self::new(id, label, icon, ItemPayload::Action(ActionRef::new(action)))
    }

    pub fn app(id: &str, label: &str, icon: &str, app: &str) -> Self {
        Self::new(
            id,
            label,
            icon,
            ItemPayload::OpenApp {
                app: AppId::new(app),
                mode: LaunchMode::Windowed,
            },
        )
    }

    pub fn with_subtext(mut self, subtext: &str) -> Self {
        self.subtext = Some(subtext.to_string());
        self
    }

    pub fn fullscreen(mut self) -> Self {
        if let ItemPayload::OpenApp { mode, .. } = &mut self.payload {
            *mode = LaunchMode::Fullscreen;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuCategory {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub hue: u16,
    pub items: Vec<MenuItem>,
    /// Fed by the library adapter; the only column whose length may change.
    pub dynamic: bool,
}

impl MenuCategory {
    pub fn new(id: &str, label: &str, icon: &str, hue: u16, items: Vec<MenuItem>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            hue,
            items,
            dynamic: false,
        }
    }

    pub fn dynamic(id: &str, label: &str, icon: &str, hue: u16) -> Self {
        Self {
            dynamic: true,
            ..Self::new(id, label, icon, hue, Vec::new())
        }
    }
}

// ── Grid ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuGrid {
    columns: Vec<MenuCategory>,
}

impl MenuGrid {
    pub fn new(columns: Vec<MenuCategory>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[MenuCategory] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, idx: usize) -> Option<&MenuCategory> {
        self.columns.get(idx)
    }

    pub fn position(&self, category_id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == category_id)
    }

    pub fn item_count(&self, column: usize) -> usize {
        self.columns.get(column).map_or(0, |c| c.items.len())
    }

    pub fn item(&self, at: GridCoordinate) -> Option<&MenuItem> {
        self.columns.get(at.column)?.items.get(at.row?)
    }

    /// Swaps a dynamic column's items. Static columns refuse.
    pub fn replace_items(&mut self, column: usize, items: Vec<MenuItem>) -> bool {
        match self.columns.get_mut(column) {
            Some(cat) if cat.dynamic => {
                cat.items = items;
                true
            }
            Some(cat) => {
                warn!(category = %cat.id, "refusing to replace items of a static column");
                false
            }
            None => {
                warn!(column, "replace_items on unknown column");
                false
            }
        }
    }
}

/// `row == None` focuses the category itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridCoordinate {
    pub column: usize,
    pub row: Option<usize>,
}

impl GridCoordinate {
    pub fn new(column: usize, row: Option<usize>) -> Self {
        Self { column, row }
    }

    /// Pulls `row` back inside `[0, count-1]`, or to `None` for an empty column.
    pub fn clamped(self, count: usize) -> Self {
        let row = match self.row {
            Some(_) if count == 0 => None,
            Some(r) => Some(r.min(count - 1)),
            None => None,
        };
        Self { row, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> MenuGrid {
        MenuGrid::new(vec![
            MenuCategory::new(
                "user",
                "USERS",
                "users",
                240,
                vec![MenuItem::action("u1", "Switch User", "refresh", "session.switch_user")],
            ),
            MenuCategory::dynamic("game", "GAMES", "gamepad", 210),
        ])
    }

    #[test]
    fn clamp_handles_shrink_and_empty() {
        assert_eq!(GridCoordinate::new(0, Some(4)).clamped(2).row, Some(1));
        assert_eq!(GridCoordinate::new(0, Some(4)).clamped(0).row, None);
        assert_eq!(GridCoordinate::new(0, None).clamped(3).row, None);
    }

    #[test]
    fn only_dynamic_columns_accept_replacement() {
        let mut g = grid();
        let items = vec![MenuItem::app("x", "X", "x", "x")];
        assert!(!g.replace_items(0, items.clone()));
        assert!(g.replace_items(1, items));
        assert_eq!(g.item_count(1), 1);
        assert!(!g.replace_items(9, Vec::new()));
    }

    #[test]
    fn item_lookup_requires_row() {
        let g = grid();
        assert!(g.item(GridCoordinate::new(0, None)).is_none());
        assert_eq!(
            g.item(GridCoordinate::new(0, Some(0))).map(|i| i.label.as_str()),
            Some("Switch User")
        );
    }

    #[test]
    fn fullscreen_only_applies_to_apps() {
        let item = MenuItem::app("m", "Monitor", "cpu", "monitor").fullscreen();
        assert!(matches!(
            item.payload,
            ItemPayload::OpenApp { mode: LaunchMode::Fullscreen, .. }
        ));
        let item = MenuItem::action("l", "Lock", "lock", "session.lock").fullscreen();
        assert!(matches!(item.payload, ItemPayload::Action(_)));
    }
}
