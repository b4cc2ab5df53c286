//! Contents of the built-in app windows.

use aether_shell::config::{Settings, DEFAULT_DOCUMENT};
use aether_shell::core::input::CanonicalAction;
use aether_shell::core::menu::{AppId, MenuItem};
use aether_shell::core::pattern::{LockSetting, MatchOutcome, PatternMatcher, MAX_RECORD_LEN, MIN_PATTERN_LEN};
use aether_shell::core::profile::{Profile, ACCENTS};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Wrap},
    Frame,
};

use crate::telemetry::{about_lines, Telemetry};
use crate::ui::{gesture_glyph, parse_hex_color, Palette};

/// What a window asks of the front-end after handling input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEffect {
    None,
    /// Give focus back to the grid.
    Leave,
    OpenUrl(String),
    AddProfile { name: String, accent: String },
    RemoveProfile(String),
    /// New lock for the signed-in profile.
    SetLock(LockSetting),
    SaveDocument { name: String, text: String },
    Status(String),
}

pub struct ViewContext<'a> {
    pub palette: &'a Palette,
    pub telemetry: Telemetry,
    pub settings: &'a Settings,
    pub roster: Roster<'a>,
    pub library: &'a [MenuItem],
}

/// The profile list as the users window sees it.
#[derive(Debug, Clone, Copy)]
pub struct Roster<'a> {
    pub profiles: &'a [Profile],
    pub active: Option<&'a str>,
}

impl Roster<'_> {
    fn is_active(&self, profile: &Profile) -> bool {
        self.active == Some(profile.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsersMode {
    List,
    Add { name: String, accent: usize },
    /// Re-recording the signed-in profile's pattern.
    Pattern(PatternMatcher),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UsersInput {
    Action(CanonicalAction),
    Char(char),
    Erase,
    Delete,
    Commit,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppView {
    About { lines: Vec<String>, scroll: u16 },
    Monitor,
    Settings { scroll: u16 },
    Users { cursor: usize, mode: UsersMode },
    Installed { scroll: u16 },
    Notepad { name: String, text: String, naming: bool },
    Calc { input: String, result: Option<String> },
    Url { input: String },
    Unknown(String),
}

impl AppView {
    pub fn for_app(app: &AppId) -> Self {
        match app.as_str() {
            "about" => Self::About {
                lines: about_lines(),
                scroll: 0,
            },
            "monitor" => Self::Monitor,
            "settings" => Self::Settings { scroll: 0 },
            "users" => Self::Users {
                cursor: 0,
                mode: UsersMode::List,
            },
            "installed" => Self::Installed { scroll: 0 },
            "notepad" => Self::notepad(None),
            "calc" => Self::Calc {
                input: String::new(),
                result: None,
            },
            "url" => Self::Url {
                input: "https://".to_string(),
            },
            other => Self::Unknown(other.to_string()),
        }
    }

    /// An editor opened on `(name, text)`, or a blank default document.
    pub fn notepad(document: Option<(String, String)>) -> Self {
        let (name, text) = document.unwrap_or_else(|| (DEFAULT_DOCUMENT.to_string(), String::new()));
        Self::Notepad {
            name,
            text,
            naming: false,
        }
    }

    /// Keyboard goes straight to these views instead of the dispatcher.
    pub fn is_text_entry(&self) -> bool {
        matches!(
            self,
            Self::Users { .. } | Self::Notepad { .. } | Self::Calc { .. } | Self::Url { .. }
        )
    }

    // ── Input ────────────────────────────────────────────────────────────────

    pub fn on_action(&mut self, action: CanonicalAction, roster: Roster) -> ViewEffect {
        if let Self::Users { cursor, mode } = self {
            return users_input(cursor, mode, UsersInput::Action(action), roster);
        }
        if action == CanonicalAction::Back {
            return ViewEffect::Leave;
        }
        match self {
            Self::About { scroll, .. } | Self::Settings { scroll } | Self::Installed { scroll } => {
                match action {
                    CanonicalAction::Up => *scroll = scroll.saturating_sub(1),
                    CanonicalAction::Down => *scroll = scroll.saturating_add(1),
                    _ => {}
                }
                ViewEffect::None
            }
            Self::Calc { .. } | Self::Url { .. } if action == CanonicalAction::Enter => self.submit(),
            _ => ViewEffect::None,
        }
    }

    pub fn on_key(&mut self, key: &KeyEvent, roster: Roster) -> ViewEffect {
        if key.kind != KeyEventKind::Press {
            return ViewEffect::None;
        }
        match self {
            Self::Users { cursor, mode } => {
                return match users_key(key, mode) {
                    Some(input) => users_input(cursor, mode, input, roster),
                    None => ViewEffect::None,
                };
            }
            Self::Notepad { name, text, naming } => return notepad_key(key, name, text, naming),
            _ => {}
        }
        if key.code == KeyCode::Esc {
            return ViewEffect::Leave;
        }
        if key.code == KeyCode::Enter {
            return self.submit();
        }
        let buffer = match self {
            Self::Calc { input, .. } | Self::Url { input } => input,
            _ => return ViewEffect::None,
        };
        match key.code {
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            _ => {}
        }
        ViewEffect::None
    }

    fn submit(&mut self) -> ViewEffect {
        match self {
            Self::Calc { input, result } => {
                *result = Some(match evaluate(input) {
                    Some(v) => format_number(v),
                    None => "ERROR".to_string(),
                });
                ViewEffect::None
            }
            Self::Url { input } => {
                let url = input.trim();
                if url.is_empty() || url == "https://" {
                    ViewEffect::None
                } else {
                    ViewEffect::OpenUrl(url.to_string())
                }
            }
            _ => ViewEffect::None,
        }
    }

    // ── Rendering ────────────────────────────────────────────────────────────

    pub fn render(&self, f: &mut Frame, area: Rect, ctx: &ViewContext) {
        let p = ctx.palette;
        match self {
            Self::About { lines, scroll } => {
                let text: Vec<Line> = lines
                    .iter()
                    .map(|l| Line::from(Span::styled(l.as_str(), p.normal())))
                    .collect();
                f.render_widget(Paragraph::new(text).scroll((*scroll, 0)), area);
            }
            Self::Monitor => render_monitor(f, area, ctx),
            Self::Settings { scroll } => {
                let s = ctx.settings;
                let idle = s
                    .idle_lock_secs
                    .map(|v| format!("{v}s"))
                    .unwrap_or_else(|| "off".to_string());
                let rows = [
                    format!("Boot splash      {} ms", s.boot_ms),
                    format!("Idle lock        {idle}"),
                    format!("Home column      {}", s.default_column),
                    format!("Taskbar          {}", if s.show_taskbar { "shown" } else { "hidden" }),
                    format!("Theme hue        {}", s.theme_hue),
                    format!("Debounce         {} ms", s.input.debounce_ms),
                    format!("Stick dead zone  {:.2}", s.input.dead_zone),
                    format!("Wheel threshold  {:.1}", s.input.wheel_threshold),
                    format!("Haptics          {}", if s.input.haptics { "on" } else { "off" }),
                ];
                let text: Vec<Line> = rows
                    .into_iter()
                    .map(|r| Line::from(Span::styled(r, p.normal())))
                    .collect();
                f.render_widget(Paragraph::new(text).scroll((*scroll, 0)), area);
            }
            Self::Users { cursor, mode } => render_users(f, area, ctx, *cursor, mode),
            Self::Installed { scroll } => {
                let text: Vec<Line> = if ctx.library.is_empty() {
                    vec![Line::from(Span::styled("Library is still loading...", p.dim()))]
                } else {
                    ctx.library
                        .iter()
                        .map(|item| {
                            let sub = item.subtext.as_deref().unwrap_or("");
                            Line::from(vec![
                                Span::styled(format!("{:<32}", item.label), p.normal()),
                                Span::styled(sub.to_string(), p.dim()),
                            ])
                        })
                        .collect()
                };
                f.render_widget(Paragraph::new(text).scroll((*scroll, 0)), area);
            }
            Self::Notepad { name, text, naming } => {
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
                    .split(area);
                let (name_cursor, body_cursor) = if *naming { ("█", "") } else { ("", "█") };
                f.render_widget(
                    Paragraph::new(Span::styled(format!("File: {name}{name_cursor}"), p.title())),
                    rows[0],
                );
                f.render_widget(
                    Paragraph::new(format!("{text}{body_cursor}"))
                        .style(p.normal())
                        .wrap(Wrap { trim: false }),
                    rows[1],
                );
                f.render_widget(
                    Paragraph::new(Span::styled("Ctrl+S save   Tab rename   Esc leave", p.dim())),
                    rows[2],
                );
            }
            Self::Calc { input, result } => {
                let mut lines = vec![Line::from(Span::styled(format!("> {input}█"), p.normal()))];
                if let Some(r) = result {
                    lines.push(Line::from(Span::styled(format!("= {r}"), p.title())));
                }
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Enter evaluates, Esc leaves", p.dim())));
                f.render_widget(Paragraph::new(lines), area);
            }
            Self::Url { input } => {
                let lines = vec![
                    Line::from(Span::styled("Address:", p.dim())),
                    Line::from(Span::styled(format!("{input}█"), p.normal())),
                    Line::from(""),
                    Line::from(Span::styled("Enter opens in the host browser", p.dim())),
                ];
                f.render_widget(Paragraph::new(lines), area);
            }
            Self::Unknown(app) => {
                f.render_widget(
                    Paragraph::new(Span::styled(format!("No viewer for '{app}'"), p.dim())),
                    area,
                );
            }
        }
    }
}

fn render_users(f: &mut Frame, area: Rect, ctx: &ViewContext, cursor: usize, mode: &UsersMode) {
    let p = ctx.palette;
    let roster = ctx.roster;
    let lines: Vec<Line> = match mode {
        UsersMode::List => {
            let mut lines: Vec<Line> = roster
                .profiles
                .iter()
                .enumerate()
                .map(|(i, profile)| {
                    let lock = match &profile.lock {
                        LockSetting::Disabled => "no lock".to_string(),
                        LockSetting::Unset => "pattern not set".to_string(),
                        LockSetting::Pattern(pat) => format!("{}-move pattern", pat.len()),
                    };
                    let admin = if profile.is_admin { " [admin]" } else { "" };
                    let status = if roster.is_active(profile) { "ACTIVE" } else { "" };
                    let row = format!(" {} {:<16}{admin}  ({lock})  {status}", profile.initial(), profile.name);
                    let style = if i == cursor {
                        p.sel()
                    } else {
                        Style::default().fg(parse_hex_color(&profile.accent).unwrap_or(p.accent()))
                    };
                    Line::from(Span::styled(row, style))
                })
                .collect();
            let add_style = if cursor >= roster.profiles.len() { p.sel() } else { p.normal() };
            lines.push(Line::from(Span::styled(" + Register new user", add_style)));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Enter change own pattern / register   Del delete   Esc leave",
                p.dim(),
            )));
            lines
        }
        UsersMode::Add { name, accent } => {
            let hex = ACCENTS[*accent % ACCENTS.len()];
            let swatch = parse_hex_color(hex).unwrap_or(Color::Gray);
            vec![
                Line::from(Span::styled("REGISTER NEW USER", p.title())),
                Line::from(""),
                Line::from(Span::styled(format!("Name:   {name}█"), p.normal())),
                Line::from(vec![
                    Span::styled("Colour: ◀ ", p.normal()),
                    Span::styled("██", Style::default().fg(swatch)),
                    Span::styled(format!(" {hex} ▶"), p.normal()),
                ]),
                Line::from(""),
                Line::from(Span::styled("Enter create   ←/→ colour   Esc cancel", p.dim())),
            ]
        }
        UsersMode::Pattern(matcher) => {
            let mut glyphs: Vec<&str> = matcher.entered().iter().map(|g| gesture_glyph(*g)).collect();
            glyphs.resize(MAX_RECORD_LEN.max(glyphs.len()), "·");
            vec![
                Line::from(Span::styled("CHANGE UNLOCK PATTERN", p.title())),
                Line::from(""),
                Line::from(Span::styled(glyphs.join(" "), p.title())),
                Line::from(""),
                Line::from(Span::styled(
                    format!("arrows/ENTER add moves   SPACE save ({MIN_PATTERN_LEN}+ moves)   BACKSPACE reset   Esc cancel"),
                    p.dim(),
                )),
            ]
        }
    };
    f.render_widget(Paragraph::new(lines), area);
}

fn render_monitor(f: &mut Frame, area: Rect, ctx: &ViewContext) {
    let t = ctx.telemetry;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(area);
    let gauges = [
        ("CPU", Some(t.cpu)),
        ("RAM", Some(t.ram_pct)),
        ("DISK", t.disk_pct),
        ("BATTERY", t.battery_pct),
    ];
    for (row, (label, value)) in rows.iter().zip(gauges) {
        let gauge = match value {
            Some(pct) => Gauge::default()
                .gauge_style(ctx.palette.normal())
                .label(format!("{label} {pct:.0}%"))
                .ratio(f64::from(pct.clamp(0.0, 100.0)) / 100.0),
            None => Gauge::default()
                .gauge_style(ctx.palette.dim())
                .label(format!("{label} n/a"))
                .ratio(0.0),
        };
        f.render_widget(gauge, Rect { height: 1, ..*row });
    }
}

// ── Users ─────────────────────────────────────────────────────────────────────

fn users_key(key: &KeyEvent, mode: &UsersMode) -> Option<UsersInput> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let input = match key.code {
        KeyCode::Esc => UsersInput::Cancel,
        KeyCode::Up => UsersInput::Action(CanonicalAction::Up),
        KeyCode::Down => UsersInput::Action(CanonicalAction::Down),
        KeyCode::Left => UsersInput::Action(CanonicalAction::Left),
        KeyCode::Right => UsersInput::Action(CanonicalAction::Right),
        KeyCode::Enter => UsersInput::Action(CanonicalAction::Enter),
        KeyCode::Backspace => UsersInput::Erase,
        KeyCode::Delete => UsersInput::Delete,
        KeyCode::Char('s') if ctrl => UsersInput::Commit,
        KeyCode::Char(' ') if matches!(mode, UsersMode::Pattern(_)) => UsersInput::Commit,
        KeyCode::Char(c) if matches!(mode, UsersMode::Add { .. }) && !ctrl => UsersInput::Char(c),
        _ => return None,
    };
    Some(input)
}

fn users_input(cursor: &mut usize, mode: &mut UsersMode, input: UsersInput, roster: Roster) -> ViewEffect {
    use CanonicalAction::{Back, Down, Enter, Left, Right, Up};
    match mode {
        UsersMode::List => {
            // The row after the last profile registers a new one.
            let last_row = roster.profiles.len();
            *cursor = (*cursor).min(last_row);
            match input {
                UsersInput::Action(Up) => *cursor = cursor.saturating_sub(1),
                UsersInput::Action(Down) => *cursor = (*cursor + 1).min(last_row),
                UsersInput::Action(Back) | UsersInput::Cancel => return ViewEffect::Leave,
                UsersInput::Action(Enter) => match roster.profiles.get(*cursor) {
                    None => {
                        *mode = UsersMode::Add {
                            name: String::new(),
                            accent: 0,
                        }
                    }
                    Some(profile) if roster.is_active(profile) => {
                        let mut matcher = PatternMatcher::default();
                        matcher.arm(&LockSetting::Unset);
                        *mode = UsersMode::Pattern(matcher);
                    }
                    Some(_) => return ViewEffect::Status("only your own pattern can be changed".into()),
                },
                UsersInput::Delete => {
                    if let Some(profile) = roster.profiles.get(*cursor) {
                        return ViewEffect::RemoveProfile(profile.id.clone());
                    }
                }
                _ => {}
            }
            ViewEffect::None
        }
        UsersMode::Add { name, accent } => match input {
            UsersInput::Char(c) => {
                name.push(c);
                ViewEffect::None
            }
            UsersInput::Erase => {
                name.pop();
                ViewEffect::None
            }
            UsersInput::Action(Left) => {
                *accent = (*accent + ACCENTS.len() - 1) % ACCENTS.len();
                ViewEffect::None
            }
            UsersInput::Action(Right) => {
                *accent = (*accent + 1) % ACCENTS.len();
                ViewEffect::None
            }
            UsersInput::Action(Enter) | UsersInput::Commit => {
                let effect = ViewEffect::AddProfile {
                    name: name.trim().to_string(),
                    accent: ACCENTS[*accent % ACCENTS.len()].to_string(),
                };
                *mode = UsersMode::List;
                effect
            }
            UsersInput::Action(Back) | UsersInput::Cancel => {
                *mode = UsersMode::List;
                ViewEffect::None
            }
            _ => ViewEffect::None,
        },
        UsersMode::Pattern(matcher) => match input {
            UsersInput::Action(Back) | UsersInput::Cancel => {
                *mode = UsersMode::List;
                ViewEffect::None
            }
            UsersInput::Action(action) => {
                matcher.feed(action);
                ViewEffect::None
            }
            UsersInput::Erase => {
                matcher.feed(Back);
                ViewEffect::None
            }
            UsersInput::Commit => match matcher.commit() {
                MatchOutcome::Recorded(lock) => {
                    *mode = UsersMode::List;
                    ViewEffect::SetLock(lock)
                }
                _ => ViewEffect::Status(format!("at least {MIN_PATTERN_LEN} moves required")),
            },
            _ => ViewEffect::None,
        },
    }
}

// ── Text editor ───────────────────────────────────────────────────────────────

fn notepad_key(key: &KeyEvent, name: &mut String, text: &mut String, naming: &mut bool) -> ViewEffect {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('s') if ctrl => {
            *naming = false;
            return ViewEffect::SaveDocument {
                name: name.trim().to_string(),
                text: text.clone(),
            };
        }
        KeyCode::Esc if *naming => *naming = false,
        KeyCode::Esc => return ViewEffect::Leave,
        KeyCode::Tab => *naming = !*naming,
        KeyCode::Enter if *naming => *naming = false,
        KeyCode::Enter => text.push('\n'),
        KeyCode::Char(c) if !ctrl => {
            if *naming {
                name.push(c);
            } else {
                text.push(c);
            }
        }
        KeyCode::Backspace => {
            if *naming {
                name.pop();
            } else {
                text.pop();
            }
        }
        _ => {}
    }
    ViewEffect::None
}

// ── Calculator ────────────────────────────────────────────────────────────────

/// `+ - * /`, unary minus and parentheses over decimal numbers.
pub fn evaluate(expr: &str) -> Option<f64> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0;
    let value = parse_sum(&tokens, &mut pos)?;
    (pos == tokens.len() && value.is_finite()).then_some(value)
}

fn parse_sum(t: &[char], pos: &mut usize) -> Option<f64> {
    let mut acc = parse_product(t, pos)?;
    while let Some(&op) = t.get(*pos) {
        if op != '+' && op != '-' {
            break;
        }
        *pos += 1;
        let rhs = parse_product(t, pos)?;
        acc = if op == '+' { acc + rhs } else { acc - rhs };
    }
    Some(acc)
}

fn parse_product(t: &[char], pos: &mut usize) -> Option<f64> {
    let mut acc = parse_atom(t, pos)?;
    while let Some(&op) = t.get(*pos) {
        if op != '*' && op != '/' {
            break;
        }
        *pos += 1;
        let rhs = parse_atom(t, pos)?;
        acc = if op == '*' { acc * rhs } else { acc / rhs };
    }
    Some(acc)
}

fn parse_atom(t: &[char], pos: &mut usize) -> Option<f64> {
    match t.get(*pos)? {
        '-' => {
            *pos += 1;
            parse_atom(t, pos).map(|v| -v)
        }
        '(' => {
            *pos += 1;
            let v = parse_sum(t, pos)?;
            if t.get(*pos) != Some(&')') {
                return None;
            }
            *pos += 1;
            Some(v)
        }
        _ => {
            let start = *pos;
            while t.get(*pos).is_some_and(|c| c.is_ascii_digit() || *c == '.') {
                *pos += 1;
            }
            t[start..*pos].iter().collect::<String>().parse().ok()
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.6}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}
