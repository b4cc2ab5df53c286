use aether_shell::core::menu::{ActionRef, MenuCategory, MenuGrid, MenuItem};
use aether_shell::core::shell::LIBRARY_CATEGORY;
use aether_shell::core::{Host, Shell};
use std::time::Instant;
use tracing::{info, warn};

// ── Built-in actions ──────────────────────────────────────────────────────────

pub const SWITCH_USER: &str = "session.switch_user";
pub const LOCK: &str = "session.lock";
pub const MINIMIZE: &str = "host.minimize";
pub const SHUTDOWN: &str = "host.shutdown";
pub const REBOOT: &str = "host.reboot";
pub const OPEN_URL: &str = "host.open_url";
pub const SHOW_DESKTOP: &str = "desktop.show";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinAction {
    SwitchUser,
    Lock,
    Minimize,
    Shutdown,
    Reboot,
    OpenUrl(String),
    ShowDesktop,
}

/// `name` or `name argument`; unknown names yield `None`.
pub fn parse_action(action: &ActionRef) -> Option<BuiltinAction> {
    let raw = action.as_str().trim();
    let (name, arg) = raw.split_once(' ').unwrap_or((raw, ""));
    let parsed = match name {
        SWITCH_USER => BuiltinAction::SwitchUser,
        LOCK => BuiltinAction::Lock,
        MINIMIZE => BuiltinAction::Minimize,
        SHUTDOWN => BuiltinAction::Shutdown,
        REBOOT => BuiltinAction::Reboot,
        OPEN_URL if !arg.trim().is_empty() => BuiltinAction::OpenUrl(arg.trim().to_string()),
        SHOW_DESKTOP => BuiltinAction::ShowDesktop,
        _ => return None,
    };
    Some(parsed)
}

pub fn run_action(action: &ActionRef, shell: &mut Shell, host: &mut dyn Host, now: Instant) -> bool {
    let Some(builtin) = parse_action(action) else {
        warn!(action = action.as_str(), "unknown menu action");
        return false;
    };
    info!(?builtin, "running menu action");
    match builtin {
        BuiltinAction::SwitchUser => shell.sign_out(now),
        BuiltinAction::Lock => {
            shell.lock(now);
        }
        BuiltinAction::Minimize => host.minimize_host_window(),
        BuiltinAction::Shutdown => host.shutdown(),
        BuiltinAction::Reboot => host.reboot(),
        BuiltinAction::OpenUrl(url) => host.open_external_url(&url),
        BuiltinAction::ShowDesktop => shell.windows_mut().minimize_all(),
    }
    true
}

// ── Default grid ──────────────────────────────────────────────────────────────

pub fn default_grid() -> MenuGrid {
    MenuGrid::new(vec![
        MenuCategory::new(
            "user",
            "USERS",
            "users",
            240,
            vec![
                MenuItem::action("switch", "Switch User", "refresh", SWITCH_USER),
                MenuItem::app("manage", "Manage Users", "users", "users"),
                MenuItem::action("standby", "Standby", "lock", LOCK),
                MenuItem::action("minimize", "Minimize", "min", MINIMIZE),
                MenuItem::action("restart", "Restart", "refresh", REBOOT),
                MenuItem::action("shutdown", "Shutdown", "power", SHUTDOWN),
                MenuItem::app("about", "About", "info", "about"),
            ],
        ),
        MenuCategory::new(
            "settings",
            "SETTINGS",
            "gear",
            60,
            vec![
                MenuItem::app("config", "Configuration", "gear", "settings"),
                MenuItem::app("installed", "Installed Apps", "package", "installed"),
                MenuItem::action("desktop", "Show Desktop", "desktop", SHOW_DESKTOP),
            ],
        ),
        MenuCategory::dynamic(LIBRARY_CATEGORY, "LIBRARY", "gamepad", 210),
        MenuCategory::new(
            "tools",
            "TOOLS",
            "box",
            280,
            vec![
                MenuItem::app("monitor", "System Status", "cpu", "monitor").fullscreen(),
                MenuItem::app("notepad", "Text Editor", "edit", "notepad"),
                MenuItem::app("calc", "Calculator", "calc", "calc"),
            ],
        ),
        MenuCategory::new(
            "network",
            "NETWORK",
            "globe",
            160,
            vec![
                MenuItem::app("url", "Open URL", "link", "url"),
                MenuItem::action(
                    "resources",
                    "Resources",
                    "book",
                    &format!("{OPEN_URL} https://www.rust-lang.org/learn"),
                )
                .with_subtext("rust-lang.org"),
            ],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_shell::core::host::NullHost;
    use aether_shell::core::menu::AppId;
    use aether_shell::core::profile::default_profiles;
    use aether_shell::core::window::ContentRef;
    use aether_shell::core::{SessionPhase, ShellConfig};

    #[test]
    fn builtin_names_parse() {
        assert_eq!(parse_action(&ActionRef::new(LOCK)), Some(BuiltinAction::Lock));
        assert_eq!(
            parse_action(&ActionRef::new("host.open_url https://example.org")),
            Some(BuiltinAction::OpenUrl("https://example.org".into()))
        );
        assert_eq!(parse_action(&ActionRef::new(OPEN_URL)), None);
        assert_eq!(parse_action(&ActionRef::new("host.selfdestruct")), None);
    }

    #[test]
    fn default_grid_puts_library_at_default_column() {
        let grid = default_grid();
        let settings = aether_shell::config::Settings::default();
        assert_eq!(grid.position(LIBRARY_CATEGORY), Some(settings.default_column));
        assert!(grid.column(settings.default_column).is_some_and(|c| c.dynamic));
        for item in grid.columns().iter().flat_map(|c| c.items.iter()) {
            if let aether_shell::core::menu::ItemPayload::Action(action) = &item.payload {
                assert!(parse_action(action).is_some(), "{} has no handler", item.id);
            }
        }
    }

    #[test]
    fn show_desktop_minimizes_everything() {
        let now = Instant::now();
        let mut shell = Shell::new(ShellConfig::default(), default_profiles(), default_grid(), now);
        shell.skip_boot(now);
        shell
            .windows_mut()
            .open(AppId::new("about"), "About", ContentRef("about".into()));
        assert!(run_action(&ActionRef::new(SHOW_DESKTOP), &mut shell, &mut NullHost, now));
        assert!(shell.windows().is_desktop_visible());
        assert!(shell.windows().focused().is_none());
    }

    #[test]
    fn switch_user_returns_to_login() {
        let now = Instant::now();
        let mut shell = Shell::new(ShellConfig::default(), default_profiles(), default_grid(), now);
        shell.skip_boot(now);
        assert!(run_action(&ActionRef::new(SWITCH_USER), &mut shell, &mut NullHost, now));
        assert_eq!(shell.phase(), &SessionPhase::Login);
        assert!(!run_action(&ActionRef::new("nope"), &mut shell, &mut NullHost, now));
    }
}
