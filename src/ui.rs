use aether_shell::core::menu::{GridCoordinate, MenuCategory};
use aether_shell::core::pattern::{Gesture, MatcherState, MAX_FAILURES};
use aether_shell::core::profile::Profile;
use aether_shell::core::window::{WinRect, Window, WindowId, WindowManager};
use aether_shell::core::{SessionPhase, Shell};
use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use std::collections::HashMap;

use crate::apps::{AppView, ViewContext};

pub type Term = Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>;

pub const HEADER_LINES: &[&str] = &["AETHER SHELL", "UNIFIED CONSOLE ENVIRONMENT"];

const BOOT_LINES: &[&str] = &[
    "AETHER BIOS 2.1",
    "MEMORY CHECK ........ OK",
    "INPUT DEVICES ....... KEYBOARD WHEEL TOUCH PAD",
    "LIBRARY SERVICE ..... STARTING",
    "LOADING SHELL",
];

const TITLE_MIN_BUTTON: &str = "[_]";
const TITLE_MAX_BUTTON: &str = "[+]";
const TITLE_RESTORE_BUTTON: &str = "[=]";
const TITLE_CLOSE_BUTTON: &str = "[x]";
const TASK_START_LABEL: &str = " AETHER ";

// ── Colors ────────────────────────────────────────────────────────────────────

/// Theme styles derived from one accent color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    accent: Color,
}

impl Palette {
    pub fn from_hue(hue: u16) -> Self {
        Self {
            accent: hue_color(hue, 0.65, 0.55),
        }
    }

    pub fn with_accent(accent: Color) -> Self {
        Self { accent }
    }

    pub fn accent(&self) -> Color {
        self.accent
    }

    pub fn normal(&self) -> Style { Style::default().fg(self.accent) }
    pub fn sel(&self)    -> Style { Style::default().fg(Color::Black).bg(self.accent).add_modifier(Modifier::BOLD) }
    pub fn title(&self)  -> Style { Style::default().fg(self.accent).add_modifier(Modifier::BOLD) }
    pub fn dim(&self)    -> Style { Style::default().fg(self.accent).add_modifier(Modifier::DIM) }
}

/// HSL to a 24-bit terminal color.
pub fn hue_color(hue: u16, s: f32, l: f32) -> Color {
    let h = f32::from(hue % 360) / 60.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u8 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::Rgb(to_u8(r), to_u8(g), to_u8(b))
}

pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

// ── Layout ────────────────────────────────────────────────────────────────────

pub fn top_bar_area(size: Rect) -> Rect {
    Rect { height: size.height.min(1), ..size }
}

pub fn bottom_bar_area(size: Rect) -> Rect {
    if size.height < 2 {
        return Rect { height: 0, ..size };
    }
    Rect {
        y: size.y + size.height - 1,
        height: 1,
        ..size
    }
}

/// Everything between the top status bar and the bottom bar.
pub fn desk_area(size: Rect) -> Rect {
    Rect {
        y: size.y + 1,
        height: size.height.saturating_sub(2),
        ..size
    }
}

pub fn to_win_rect(area: Rect) -> WinRect {
    WinRect::new(i32::from(area.x), i32::from(area.y), area.width, area.height)
}

/// Screen cells a window occupies, clipped to `bounds`.
pub fn window_area(rect: WinRect, bounds: Rect) -> Rect {
    let x = rect.x.clamp(0, i32::from(u16::MAX)) as u16;
    let y = rect.y.clamp(0, i32::from(u16::MAX)) as u16;
    Rect::new(x, y, rect.w, rect.h).intersection(bounds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleButton {
    Minimize,
    Maximize,
    Close,
}

pub fn title_button_at(rect: WinRect, x: i32, y: i32) -> Option<TitleButton> {
    if y != rect.y || rect.w < 12 {
        return None;
    }
    // Buttons sit flush against the right border: [_][+][x]│
    let close = rect.x + i32::from(rect.w) - 1 - 3;
    let max = close - 3;
    let min = max - 3;
    match x {
        x if (close..close + 3).contains(&x) => Some(TitleButton::Close),
        x if (max..max + 3).contains(&x) => Some(TitleButton::Maximize),
        x if (min..min + 3).contains(&x) => Some(TitleButton::Minimize),
        _ => None,
    }
}

pub fn is_resize_handle(rect: WinRect, x: i32, y: i32) -> bool {
    x == rect.x + i32::from(rect.w) - 1 && y == rect.y + i32::from(rect.h) - 1
}

/// Taskbar buttons in window order, after the start label.
pub fn taskbar_buttons(windows: &WindowManager, area: Rect) -> Vec<(WindowId, Rect)> {
    let mut x = area.x + TASK_START_LABEL.len() as u16 + 1;
    let end = area.x + area.width;
    let mut out = Vec::new();
    for win in windows.windows() {
        let width = task_button_text(win).chars().count() as u16;
        if x + width > end {
            break;
        }
        out.push((win.id, Rect::new(x, area.y, width, 1)));
        x += width + 1;
    }
    out
}

fn task_button_text(win: &Window) -> String {
    let title: String = win.title.chars().take(14).collect();
    if win.minimized {
        format!("({title})")
    } else {
        format!("[{title}]")
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

pub struct Screen<'a> {
    pub shell: &'a Shell,
    pub palette: &'a Palette,
    pub views: &'a HashMap<WindowId, AppView>,
    pub ctx: ViewContext<'a>,
    pub message: Option<&'a str>,
    /// 0.0 ..= 1.0 through the boot splash.
    pub boot_progress: f32,
}

pub fn draw(f: &mut Frame, screen: &Screen) {
    let size = f.area();
    f.render_widget(Clear, size);
    match screen.shell.phase() {
        SessionPhase::Booting => draw_boot(f, size, screen),
        SessionPhase::Login => draw_login(f, size, screen),
        SessionPhase::Authenticating => draw_auth(f, size, screen),
        SessionPhase::Locked => draw_locked(f, size, screen),
        SessionPhase::Ready | SessionPhase::Running(_) => draw_desktop(f, size, screen),
    }
}

fn centered_lines(f: &mut Frame, area: Rect, lines: Vec<Line>) {
    let top = area.height.saturating_sub(lines.len() as u16) / 2;
    let body = Rect {
        y: area.y + top,
        height: area.height.saturating_sub(top),
        ..area
    };
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body);
}

fn header_lines(p: &Palette) -> Vec<Line<'static>> {
    HEADER_LINES
        .iter()
        .map(|l| Line::from(Span::styled(*l, p.title())))
        .collect()
}

fn message_line<'a>(screen: &Screen<'a>) -> Line<'a> {
    match screen.message {
        Some(msg) => Line::from(Span::styled(msg, screen.palette.sel())),
        None => Line::from(""),
    }
}

fn draw_boot(f: &mut Frame, size: Rect, screen: &Screen) {
    let shown = ((screen.boot_progress.clamp(0.0, 1.0) * BOOT_LINES.len() as f32).ceil() as usize)
        .clamp(1, BOOT_LINES.len());
    let lines = BOOT_LINES[..shown]
        .iter()
        .map(|l| Line::from(Span::styled(*l, screen.palette.normal())))
        .collect();
    centered_lines(f, size, lines);
}

fn draw_login(f: &mut Frame, size: Rect, screen: &Screen) {
    let p = screen.palette;
    let session = screen.shell.session();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Length(5),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(size);
    f.render_widget(
        Paragraph::new(header_lines(p)).alignment(Alignment::Center),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new(Span::styled("SELECT PROFILE", p.dim())).alignment(Alignment::Center),
        chunks[2],
    );

    let profiles = session.profiles();
    let card_w = 18u16;
    let total = card_w * profiles.len() as u16 + 2 * profiles.len().saturating_sub(1) as u16;
    let mut x = chunks[3].x + chunks[3].width.saturating_sub(total) / 2;
    for (i, profile) in profiles.iter().enumerate() {
        let area = Rect::new(x, chunks[3].y, card_w, 5).intersection(chunks[3]);
        draw_profile_card(f, area, profile, i == session.login_cursor());
        x += card_w + 2;
    }

    f.render_widget(
        Paragraph::new(Span::styled("<- -> choose   ENTER sign in   CTRL+Q quit", p.dim()))
            .alignment(Alignment::Center),
        chunks[4],
    );
    f.render_widget(
        Paragraph::new(message_line(screen)).alignment(Alignment::Center),
        chunks[5],
    );
}

fn draw_profile_card(f: &mut Frame, area: Rect, profile: &Profile, selected: bool) {
    let accent = parse_hex_color(&profile.accent).unwrap_or(Color::Gray);
    let p = Palette::with_accent(accent);
    let border = if selected { p.title() } else { p.dim() };
    f.render_widget(Block::default().borders(Borders::ALL).border_style(border), area);
    let badge = if profile.is_admin { " *" } else { "" };
    let lines = vec![
        Line::from(Span::styled(format!("[ {} ]", profile.initial()), p.title())),
        Line::from(Span::styled(
            format!("{}{badge}", profile.name),
            if selected { p.sel() } else { p.normal() },
        )),
    ];
    let inner = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

pub fn gesture_glyph(g: Gesture) -> &'static str {
    match g {
        Gesture::Up => "↑",
        Gesture::Down => "↓",
        Gesture::Left => "←",
        Gesture::Right => "→",
        Gesture::Enter => "●",
    }
}

fn draw_auth(f: &mut Frame, size: Rect, screen: &Screen) {
    let session = screen.shell.session();
    let Some(profile) = session.active_profile() else {
        return;
    };
    let p = Palette::with_accent(parse_hex_color(&profile.accent).unwrap_or(screen.palette.accent()));
    let matcher = session.matcher();
    let entered = matcher.entered();

    let (prompt, hint) = match matcher.state() {
        MatcherState::Recording => (
            "DRAW A NEW UNLOCK PATTERN",
            "arrows/ENTER add moves   SPACE save   N no lock   BACKSPACE clear",
        ),
        MatcherState::Open => ("NO LOCK SET", "ENTER continue   BACKSPACE back"),
        _ => ("ENTER UNLOCK PATTERN", "BACKSPACE clear / back"),
    };

    let mut glyphs: Vec<String> = entered.iter().map(|g| gesture_glyph(*g).to_string()).collect();
    if let Some(len) = matcher.expected_len() {
        while glyphs.len() < len {
            glyphs.push("·".to_string());
        }
    }
    let failures = matcher.failures();
    let attempts = if failures > 0 {
        format!("{} attempt(s) left", MAX_FAILURES.saturating_sub(failures))
    } else {
        String::new()
    };

    let lines = vec![
        Line::from(Span::styled(format!("[ {} ]", profile.initial()), p.title())),
        Line::from(Span::styled(profile.name.clone(), p.normal())),
        Line::from(""),
        Line::from(Span::styled(prompt, p.title())),
        Line::from(""),
        Line::from(Span::styled(glyphs.join(" "), p.title())),
        Line::from(""),
        Line::from(Span::styled(attempts, p.dim())),
        message_line(screen),
        Line::from(""),
        Line::from(Span::styled(hint, p.dim())),
    ];
    centered_lines(f, size, lines);
}

fn draw_locked(f: &mut Frame, size: Rect, screen: &Screen) {
    let p = screen.palette;
    let name = screen
        .shell
        .session()
        .active_profile()
        .map(|pr| pr.name.clone())
        .unwrap_or_default();
    let lines = vec![
        Line::from(Span::styled(Local::now().format("%H:%M").to_string(), p.title())),
        Line::from(Span::styled(Local::now().format("%A, %d %B").to_string(), p.dim())),
        Line::from(""),
        Line::from(Span::styled(format!("LOCKED - {name}"), p.normal())),
        Line::from(""),
        Line::from(Span::styled("press ENTER to unlock", p.dim())),
    ];
    centered_lines(f, size, lines);
}

// ── Desktop ───────────────────────────────────────────────────────────────────

fn draw_desktop(f: &mut Frame, size: Rect, screen: &Screen) {
    draw_top_status(f, top_bar_area(size), screen);
    let desk = desk_area(size);
    draw_grid(f, desk, screen);

    let windows = screen.shell.windows();
    let focused = windows.focused();
    for win in windows.stacked() {
        draw_window(f, win, Some(win.id) == focused, desk, screen);
    }

    let bottom = bottom_bar_area(size);
    if screen.shell.taskbar_visible() {
        draw_taskbar(f, bottom, screen);
    } else {
        let hint = screen.message.unwrap_or("arrows move   ENTER open   ESC back   H taskbar   CTRL+Q quit");
        f.render_widget(Paragraph::new(Span::styled(hint, screen.palette.dim())), bottom);
    }
}

fn draw_top_status(f: &mut Frame, area: Rect, screen: &Screen) {
    if area.height == 0 {
        return;
    }
    let p = screen.palette;
    let now = Local::now().format("%a %Y-%m-%d %H:%M").to_string();
    let user = screen
        .shell
        .session()
        .active_profile()
        .map(|pr| pr.name.clone())
        .unwrap_or_default();
    let t = screen.ctx.telemetry;
    let mut right = format!("CPU {:>3.0}%  RAM {:>3.0}%", t.cpu, t.ram_pct);
    if let Some(disk) = t.disk_pct {
        right.push_str(&format!("  DISK {disk:.0}%"));
    }
    if let Some(batt) = t.battery_pct {
        right.push_str(&format!("  BAT {batt:.0}%"));
    }
    let left = format!(" {now}  {user}");
    let pad = (area.width as usize).saturating_sub(left.chars().count() + right.chars().count() + 1);
    let line = format!("{left}{}{right} ", " ".repeat(pad));
    f.render_widget(Paragraph::new(Span::styled(line, p.sel())), area);
}

fn draw_grid(f: &mut Frame, area: Rect, screen: &Screen) {
    let session = screen.shell.session();
    let grid = session.grid();
    if grid.is_empty() || area.height < 3 {
        return;
    }
    let selection = session.selection();
    let constraints: Vec<Constraint> = grid
        .columns()
        .iter()
        .map(|_| Constraint::Ratio(1, grid.len() as u32))
        .collect();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);
    for (idx, (category, col_area)) in grid.columns().iter().zip(cols.iter()).enumerate() {
        draw_column(f, *col_area, category, idx, selection);
    }
}

fn draw_column(
    f: &mut Frame,
    area: Rect,
    category: &MenuCategory,
    idx: usize,
    selection: GridCoordinate,
) {
    let p = Palette::from_hue(category.hue);
    let active = selection.column == idx;
    let header_style = match (active, selection.row) {
        (true, None) => p.sel(),
        (true, Some(_)) => p.title(),
        _ => p.dim(),
    };
    let inner_w = area.width.saturating_sub(2) as usize;
    let mut lines = vec![
        Line::from(Span::styled(format!(" {:^w$} ", category.label, w = inner_w), header_style)),
        Line::from(""),
    ];
    if category.items.is_empty() {
        let empty = if category.dynamic { "scanning..." } else { "empty" };
        lines.push(Line::from(Span::styled(format!("  {empty}"), p.dim())));
    }

    // Two lines per item; scroll so the selected one stays visible.
    let visible = (area.height.saturating_sub(2) / 2).max(1) as usize;
    let row = if active { selection.row } else { None };
    let first = row.map_or(0, |r| (r + 1).saturating_sub(visible));
    for (i, item) in category.items.iter().enumerate().skip(first).take(visible) {
        let selected = row == Some(i);
        let label: String = item.label.chars().take(inner_w.saturating_sub(2)).collect();
        let style = if selected { p.sel() } else if active { p.normal() } else { p.dim() };
        let marker = if selected { ">" } else { " " };
        lines.push(Line::from(Span::styled(format!("{marker} {label:<w$}", w = inner_w.saturating_sub(2)), style)));
        let sub = item.subtext.as_deref().unwrap_or("");
        let sub: String = sub.chars().take(inner_w.saturating_sub(2)).collect();
        lines.push(Line::from(Span::styled(format!("    {sub}"), p.dim())));
    }
    let inner = Rect {
        x: area.x + 1,
        width: area.width.saturating_sub(2),
        ..area
    };
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_window(f: &mut Frame, win: &Window, focused: bool, desk: Rect, screen: &Screen) {
    let p = screen.palette;
    let area = window_area(win.rect, desk);
    if area.width < 8 || area.height < 4 {
        return;
    }
    // Fully opaque over the grid and lower windows.
    f.render_widget(Clear, area);
    let border = if focused { p.title() } else { p.dim() };
    f.render_widget(Block::default().borders(Borders::ALL).border_style(border), area);

    let mut chars: Vec<char> = vec![' '; area.width.saturating_sub(2) as usize];
    write_text(&mut chars, 0, &format!(" {} ", win.title));
    let max_button = if win.maximized { TITLE_RESTORE_BUTTON } else { TITLE_MAX_BUTTON };
    let buttons = format!("{TITLE_MIN_BUTTON}{max_button}{TITLE_CLOSE_BUTTON}");
    if chars.len() >= buttons.len() {
        let bx = chars.len() - buttons.len();
        write_text(&mut chars, bx, &buttons);
    }
    let title: String = chars.into_iter().collect();
    f.render_widget(
        Paragraph::new(Span::styled(title, if focused { p.sel() } else { p.dim() })),
        Rect::new(area.x + 1, area.y, area.width - 2, 1),
    );

    let content = Rect::new(area.x + 2, area.y + 1, area.width.saturating_sub(4), area.height - 2);
    if let Some(view) = screen.views.get(&win.id) {
        view.render(f, content, &screen.ctx);
    }
}

fn write_text(row: &mut [char], start: usize, text: &str) {
    for (slot, ch) in row.iter_mut().skip(start).zip(text.chars()) {
        *slot = ch;
    }
}

fn draw_taskbar(f: &mut Frame, area: Rect, screen: &Screen) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let p = screen.palette;
    let windows = screen.shell.windows();
    let mut spans = vec![Span::styled(TASK_START_LABEL, p.sel()), Span::styled(" ", p.normal())];
    let mut used = TASK_START_LABEL.len() + 1;
    for (id, rect) in taskbar_buttons(windows, area) {
        let Some(win) = windows.get(id) else {
            continue;
        };
        let style = if windows.focused() == Some(id) {
            p.sel()
        } else if win.minimized {
            p.dim()
        } else {
            p.normal()
        };
        spans.push(Span::styled(task_button_text(win), style));
        spans.push(Span::raw(" "));
        used += rect.width as usize + 1;
    }
    if let Some(msg) = screen.message {
        let pad = (area.width as usize).saturating_sub(used + msg.chars().count() + 1);
        spans.push(Span::raw(" ".repeat(pad)));
        spans.push(Span::styled(msg, p.title()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_shell::core::menu::AppId;
    use aether_shell::core::window::{ContentRef, WindowMetrics};

    #[test]
    fn hue_zero_is_red_dominant() {
        let Color::Rgb(r, g, b) = hue_color(0, 1.0, 0.5) else {
            panic!("expected rgb");
        };
        assert_eq!((r, g, b), (255, 0, 0));
        assert_eq!(hue_color(120, 1.0, 0.5), Color::Rgb(0, 255, 0));
    }

    #[test]
    fn hex_accents_parse() {
        assert_eq!(parse_hex_color("#3b82f6"), Some(Color::Rgb(0x3b, 0x82, 0xf6)));
        assert_eq!(parse_hex_color("3b82f6"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn desk_sits_between_bars() {
        let size = Rect::new(0, 0, 80, 24);
        assert_eq!(desk_area(size), Rect::new(0, 1, 80, 22));
        assert_eq!(bottom_bar_area(size), Rect::new(0, 23, 80, 1));
    }

    #[test]
    fn title_buttons_hit_right_edge() {
        let rect = WinRect::new(10, 5, 40, 10);
        // Right border at x=49; close occupies 46..=48.
        assert_eq!(title_button_at(rect, 47, 5), Some(TitleButton::Close));
        assert_eq!(title_button_at(rect, 44, 5), Some(TitleButton::Maximize));
        assert_eq!(title_button_at(rect, 40, 5), Some(TitleButton::Minimize));
        assert_eq!(title_button_at(rect, 20, 5), None);
        assert_eq!(title_button_at(rect, 47, 6), None);
        assert!(is_resize_handle(rect, 49, 14));
    }

    #[test]
    fn taskbar_lists_windows_in_order() {
        let mut wm = WindowManager::new(WinRect::new(0, 1, 120, 30), WindowMetrics::default());
        let a = wm.open(AppId::new("about"), "About", ContentRef("about".into()));
        let b = wm.open(AppId::new("calc"), "Calculator", ContentRef("calc".into()));
        let buttons = taskbar_buttons(&wm, Rect::new(0, 31, 120, 1));
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].0, a);
        assert_eq!(buttons[1].0, b);
        assert!(buttons[0].1.x + buttons[0].1.width < buttons[1].1.x);
        let narrow = taskbar_buttons(&wm, Rect::new(0, 31, 20, 1));
        assert_eq!(narrow.len(), 1);
    }
}
