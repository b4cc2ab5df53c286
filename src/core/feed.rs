//! Library feed adapter.
//!
//! Turns externally scanned records into menu items for the one dynamic
//! column. Item ids derive from record identity so a refresh keeps them stable.

use super::menu::{ExternalRef, ItemPayload, MenuItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub name: String,
    pub launch_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub name: String,
    pub source: String,
    pub launch_ref: String,
    #[serde(default)]
    pub minutes_played: u64,
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedBatch {
    Apps(Vec<InstalledApp>),
    Games(Vec<GameRecord>),
}

#[derive(Debug, Clone)]
pub struct LibraryFeed {
    category_id: String,
    apps: Vec<InstalledApp>,
    games: Vec<GameRecord>,
}

impl LibraryFeed {
    pub fn new(category_id: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            apps: Vec::new(),
            games: Vec::new(),
        }
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    /// Replaces one half of the library and returns the republished column.
    pub fn apply(&mut self, batch: FeedBatch) -> Vec<MenuItem> {
        match batch {
            FeedBatch::Apps(mut apps) => {
                apps.retain(|a| {
                    let lower = a.name.to_lowercase();
                    !lower.contains("uninstall") && !lower.contains("help")
                });
                apps.sort_by_key(|a| a.name.to_lowercase());
                debug!(count = apps.len(), "installed apps refreshed");
                self.apps = apps;
            }
            FeedBatch::Games(mut games) => {
                games.sort_by(compare_games);
                debug!(count = games.len(), "game library refreshed");
                self.games = games;
            }
        }
        self.items()
    }

    /// Updates play time for one game. `None` when the id is unknown.
    pub fn record_activity(&mut self, game_id: &str, minutes_played: u64) -> Option<Vec<MenuItem>> {
        let game = self.games.iter_mut().find(|g| g.id == game_id)?;
        game.minutes_played = minutes_played;
        Some(self.items())
    }

    pub fn items(&self) -> Vec<MenuItem> {
        self.games
            .iter()
            .map(game_item)
            .chain(self.apps.iter().map(app_item))
            .collect()
    }
}

fn compare_games(a: &GameRecord, b: &GameRecord) -> Ordering {
    match (a.last_played_at, b.last_played_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

fn game_item(game: &GameRecord) -> MenuItem {
    let payload = ItemPayload::LaunchExternal(ExternalRef {
        launch_ref: game.launch_ref.clone(),
        source: Some(game.source.clone()),
    });
    let mut item = MenuItem::new(
        &format!("game:{}:{}", game.source.to_lowercase(), game.id),
        &game.name,
        "disc",
        payload,
    );
    item.subtext = Some(format_playtime(game.minutes_played));
    item
}

fn app_item(app: &InstalledApp) -> MenuItem {
    MenuItem::new(
        &format!("app:{}", app.name.to_lowercase()),
        &app.name,
        "package",
        ItemPayload::LaunchExternal(ExternalRef::new(&app.launch_ref)),
    )
    .with_subtext("Installed")
}

pub fn format_playtime(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, 0) => "Not played yet".to_string(),
        (0, m) => format!("{m}m played"),
        (h, m) => format!("{h}h {m}m played"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn game(id: &str, name: &str, played: Option<i64>) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            name: name.to_string(),
            source: "Steam".to_string(),
            launch_ref: format!("steam://run/{id}"),
            minutes_played: 0,
            last_played_at: played.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    fn app(name: &str) -> InstalledApp {
        InstalledApp {
            name: name.to_string(),
            launch_ref: format!("/usr/bin/{}", name.to_lowercase()),
        }
    }

    #[test]
    fn games_come_first_ordered_by_recent_play() {
        let mut feed = LibraryFeed::new("game");
        feed.apply(FeedBatch::Apps(vec![app("Zed"), app("atlas")]));
        let items = feed.apply(FeedBatch::Games(vec![
            game("1", "Old", Some(100)),
            game("2", "Never", None),
            game("3", "Recent", Some(900)),
        ]));
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, ["Recent", "Old", "Never", "atlas", "Zed"]);
    }

    #[test]
    fn uninstallers_and_help_entries_are_dropped() {
        let mut feed = LibraryFeed::new("game");
        let items = feed.apply(FeedBatch::Apps(vec![
            app("Editor"),
            app("Uninstall Editor"),
            app("Editor Help"),
        ]));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn ids_are_stable_across_refreshes() {
        let mut feed = LibraryFeed::new("game");
        let first = feed.apply(FeedBatch::Games(vec![game("7", "Seven", None)]));
        let second = feed.apply(FeedBatch::Games(vec![
            game("1", "One", Some(5)),
            game("7", "Seven", None),
        ]));
        assert_eq!(first[0].id, "game:steam:7");
        assert!(second.iter().any(|i| i.id == first[0].id));
    }

    #[test]
    fn activity_updates_subtext_only() {
        let mut feed = LibraryFeed::new("game");
        feed.apply(FeedBatch::Games(vec![game("7", "Seven", None)]));
        let items = feed.record_activity("7", 724).unwrap();
        assert_eq!(items[0].subtext.as_deref(), Some("12h 4m played"));
        assert!(feed.record_activity("missing", 1).is_none());
    }

    #[test]
    fn playtime_formatting() {
        assert_eq!(format_playtime(0), "Not played yet");
        assert_eq!(format_playtime(45), "45m played");
        assert_eq!(format_playtime(120), "2h 0m played");
    }
}
