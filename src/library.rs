//! Background library scan: installed desktop entries, Steam manifests and
//! the user's catalog file, delivered to the UI thread as feed batches.

use aether_shell::config::{load_library, ConfigPaths};
use aether_shell::core::feed::{FeedBatch, GameRecord, InstalledApp};
use crossbeam_channel::{unbounded, Receiver};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const RESCAN_EVERY: Duration = Duration::from_secs(300);

/// Runs until the receiver is dropped.
pub fn spawn_scan(paths: ConfigPaths) -> Receiver<FeedBatch> {
    let (tx, rx) = unbounded();
    thread::spawn(move || loop {
        let (apps, games) = scan_once(&paths);
        info!(apps = apps.len(), games = games.len(), "library scanned");
        if tx.send(FeedBatch::Apps(apps)).is_err() || tx.send(FeedBatch::Games(games)).is_err() {
            return;
        }
        thread::sleep(RESCAN_EVERY);
    });
    rx
}

fn scan_once(paths: &ConfigPaths) -> (Vec<InstalledApp>, Vec<GameRecord>) {
    let catalog = load_library(paths);

    let mut apps = catalog.apps;
    let mut seen: HashSet<String> = apps.iter().map(|a| a.name.to_lowercase()).collect();
    for dir in application_dirs() {
        for app in scan_desktop_entries(&dir) {
            if seen.insert(app.name.to_lowercase()) {
                apps.push(app);
            }
        }
    }

    let mut games = catalog.games;
    let mut known: HashSet<(String, String)> = games
        .iter()
        .map(|g| (g.source.to_lowercase(), g.id.clone()))
        .collect();
    for dir in steam_dirs() {
        for game in scan_steam_manifests(&dir) {
            if known.insert((game.source.to_lowercase(), game.id.clone())) {
                games.push(game);
            }
        }
    }
    (apps, games)
}

// ── Desktop entries ───────────────────────────────────────────────────────────

fn application_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/applications"),
        PathBuf::from("/usr/local/share/applications"),
    ];
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("applications"));
    }
    dirs
}

fn scan_desktop_entries(dir: &Path) -> Vec<InstalledApp> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "desktop"))
        .filter_map(|p| std::fs::read_to_string(&p).ok())
        .filter_map(|text| parse_desktop_entry(&text))
        .collect()
}

/// `Name=` and `Exec=` from the `[Desktop Entry]` group, field codes removed.
/// Hidden and non-application entries yield `None`.
pub fn parse_desktop_entry(text: &str) -> Option<InstalledApp> {
    let mut in_entry = false;
    let (mut name, mut exec) = (None, None);
    for line in text.lines().map(str::trim) {
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "Name" if name.is_none() => name = Some(value.trim().to_string()),
            "Exec" if exec.is_none() => exec = Some(strip_field_codes(value)),
            "NoDisplay" | "Hidden" if value.trim() == "true" => return None,
            "Type" if value.trim() != "Application" => return None,
            _ => {}
        }
    }
    let launch_ref = exec.filter(|e| !e.is_empty())?;
    Some(InstalledApp {
        name: name.filter(|n| !n.is_empty())?,
        launch_ref,
    })
}

fn strip_field_codes(exec: &str) -> String {
    exec.split_whitespace()
        .filter(|tok| !(tok.len() == 2 && tok.starts_with('%')))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Steam ─────────────────────────────────────────────────────────────────────

fn steam_dirs() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    [".steam/steam/steamapps", ".local/share/Steam/steamapps"]
        .iter()
        .map(|rel| home.join(rel))
        .collect()
}

fn scan_steam_manifests(dir: &Path) -> Vec<GameRecord> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let games: Vec<GameRecord> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("appmanifest_") && n.ends_with(".acf"))
        })
        .filter_map(|p| std::fs::read_to_string(&p).ok())
        .filter_map(|text| parse_app_manifest(&text))
        .collect();
    debug!(dir = %dir.display(), count = games.len(), "steam manifests read");
    games
}

/// Reads the flat `"key" "value"` pairs of an `appmanifest_*.acf`.
pub fn parse_app_manifest(text: &str) -> Option<GameRecord> {
    let mut appid = None;
    let mut name = None;
    for line in text.lines() {
        let parts: Vec<&str> = line.split('"').collect();
        // `\t"key"\t\t"value"` splits into 5 pieces.
        if parts.len() < 5 {
            continue;
        }
        match parts[1] {
            "appid" if appid.is_none() => appid = Some(parts[3].to_string()),
            "name" if name.is_none() => name = Some(parts[3].to_string()),
            _ => {}
        }
    }
    let id = appid?;
    Some(GameRecord {
        launch_ref: format!("steam://run/{id}"),
        id,
        name: name?,
        source: "Steam".to_string(),
        minutes_played: 0,
        last_played_at: None,
    })
}
