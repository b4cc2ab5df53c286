use anyhow::{anyhow, Context, Result};
use aether_shell::config::{remove_profile, upsert_profile, ConfigPaths};
use aether_shell::core::menu::ExternalRef;
use aether_shell::core::profile::Profile;
use aether_shell::core::Host;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

// ── Launch resolution ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCommand {
    /// A `scheme://` reference handed to the desktop opener.
    Url(String),
    Argv(Vec<String>),
}

pub fn resolve_launch(launch_ref: &str) -> Option<LaunchCommand> {
    let trimmed = launch_ref.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        return Some(LaunchCommand::Url(trimmed.to_string()));
    }
    Some(LaunchCommand::Argv(
        trimmed.split_whitespace().map(str::to_string).collect(),
    ))
}

fn opener_argv(url: &str) -> Vec<String> {
    let mut argv: Vec<String> = if cfg!(target_os = "macos") {
        vec!["open".into()]
    } else if cfg!(windows) {
        vec!["cmd".into(), "/C".into(), "start".into(), String::new()]
    } else {
        vec!["xdg-open".into()]
    };
    argv.push(url.to_string());
    argv
}

fn power_argv(reboot: bool) -> Vec<String> {
    let verb = if reboot { "reboot" } else { "poweroff" };
    if cfg!(windows) {
        let flag = if reboot { "/r" } else { "/s" };
        vec!["shutdown".into(), flag.into(), "/t".into(), "0".into()]
    } else {
        vec!["systemctl".into(), verb.into()]
    }
}

/// Starts a process detached from the terminal. The child is handed back so
/// its exit can be collected without blocking.
fn spawn_detached(argv: &[String]) -> Result<Child> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty command"))?;
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawning {program}"))
}

// ── Host ──────────────────────────────────────────────────────────────────────

/// Requests the front-end loop has to act on after an input is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostRequests {
    pub quit: bool,
    pub suspend: bool,
    /// Rumble the active pad.
    pub haptic: bool,
}

pub struct SystemHost {
    paths: ConfigPaths,
    requests: HostRequests,
    children: Vec<Child>,
}

impl SystemHost {
    pub fn new(paths: ConfigPaths) -> Self {
        Self {
            paths,
            requests: HostRequests::default(),
            children: Vec::new(),
        }
    }

    pub fn take_requests(&mut self) -> HostRequests {
        std::mem::take(&mut self.requests)
    }

    /// Collects launched processes that have exited. Returns how many were
    /// reaped.
    pub fn reap(&mut self) -> usize {
        let before = self.children.len();
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "launched process exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "lost track of launched process");
                false
            }
        });
        before - self.children.len()
    }

    fn run(&mut self, what: &str, argv: &[String]) {
        match spawn_detached(argv) {
            Ok(child) => {
                debug!(what, pid = child.id(), "spawned");
                self.children.push(child);
            }
            Err(e) => warn!(what, error = %format!("{e:#}"), "host request failed"),
        }
    }
}

impl Host for SystemHost {
    fn launch(&mut self, target: &ExternalRef) {
        match resolve_launch(&target.launch_ref) {
            Some(LaunchCommand::Url(url)) => self.run("launch", &opener_argv(&url)),
            Some(LaunchCommand::Argv(argv)) => self.run("launch", &argv),
            None => warn!(source = ?target.source, "empty launch reference"),
        }
    }

    fn open_external_url(&mut self, url: &str) {
        self.run("open_url", &opener_argv(url));
    }

    fn shutdown(&mut self) {
        info!("shutdown requested");
        self.run("shutdown", &power_argv(false));
        self.requests.quit = true;
    }

    fn reboot(&mut self) {
        info!("reboot requested");
        self.run("reboot", &power_argv(true));
        self.requests.quit = true;
    }

    fn minimize_host_window(&mut self) {
        self.requests.suspend = true;
    }

    fn persist_profile(&mut self, profile: &Profile) {
        if let Err(e) = upsert_profile(&self.paths, profile) {
            warn!(profile = %profile.id, error = %format!("{e:#}"), "profile not saved");
        }
    }

    fn remove_profile(&mut self, profile_id: &str) {
        if let Err(e) = remove_profile(&self.paths, profile_id) {
            warn!(profile = profile_id, error = %format!("{e:#}"), "profile not removed");
        }
    }

    fn haptic_pulse(&mut self) {
        self.requests.haptic = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_urls_go_through_the_opener() {
        assert_eq!(
            resolve_launch("steam://run/620"),
            Some(LaunchCommand::Url("steam://run/620".into()))
        );
        let argv = opener_argv("steam://run/620");
        assert_eq!(argv.last().map(String::as_str), Some("steam://run/620"));
    }

    #[test]
    fn command_lines_split_into_argv() {
        assert_eq!(
            resolve_launch("  firefox --new-window "),
            Some(LaunchCommand::Argv(vec!["firefox".into(), "--new-window".into()]))
        );
        assert_eq!(resolve_launch("   "), None);
    }

    #[test]
    fn requests_are_consumed_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = SystemHost::new(ConfigPaths::new(Some(dir.path().to_path_buf())));
        host.minimize_host_window();
        assert!(host.take_requests().suspend);
        assert_eq!(host.take_requests(), HostRequests::default());
    }

    #[test]
    fn haptic_pulse_becomes_a_rumble_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = SystemHost::new(ConfigPaths::new(Some(dir.path().to_path_buf())));
        host.haptic_pulse();
        let requests = host.take_requests();
        assert!(requests.haptic);
        assert!(!requests.quit);
        assert!(!host.take_requests().haptic);
    }

    #[cfg(unix)]
    #[test]
    fn exited_children_are_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = SystemHost::new(ConfigPaths::new(Some(dir.path().to_path_buf())));
        host.run("test", &["true".to_string()]);
        assert_eq!(host.children.len(), 1);
        let mut reaped = 0;
        for _ in 0..100 {
            reaped += host.reap();
            if host.children.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(reaped, 1);
        assert!(host.children.is_empty());
    }

    #[test]
    fn failed_spawns_are_not_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = SystemHost::new(ConfigPaths::new(Some(dir.path().to_path_buf())));
        host.run("test", &["aether-no-such-program-xyz".to_string()]);
        assert!(host.children.is_empty());
        assert_eq!(host.reap(), 0);
    }

    #[test]
    fn removed_profiles_leave_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(Some(dir.path().to_path_buf()));
        let mut host = SystemHost::new(paths.clone());
        host.persist_profile(&Profile::new("u9", "Nine"));
        host.remove_profile("u9");
        let stored = aether_shell::config::load_profiles(&paths);
        assert!(stored.iter().all(|p| p.id != "u9"));
        assert!(!stored.is_empty());
    }

    #[test]
    fn persisted_profiles_land_in_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(Some(dir.path().to_path_buf()));
        let mut host = SystemHost::new(paths.clone());
        host.persist_profile(&Profile::new("u9", "Nine"));
        let stored = aether_shell::config::load_profiles(&paths);
        assert!(stored.iter().any(|p| p.id == "u9"));
    }
}
