//! Desktop-mode window set: geometry, stacking and focus.

use super::menu::AppId;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

/// Opaque handle to whatever the window hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinRect {
    pub x: i32,
    pub y: i32,
    pub w: u16,
    pub h: u16,
}

impl WinRect {
    pub fn new(x: i32, y: i32, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + i32::from(self.w)
            && y < self.y + i32::from(self.h)
    }

    fn right(self) -> i32 {
        self.x + i32::from(self.w)
    }

    fn bottom(self) -> i32 {
        self.y + i32::from(self.h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMetrics {
    pub default_w: u16,
    pub default_h: u16,
    pub min_w: u16,
    pub min_h: u16,
    pub cascade_origin: i32,
    pub cascade_step: i32,
}

impl Default for WindowMetrics {
    fn default() -> Self {
        Self {
            default_w: 800,
            default_h: 500,
            min_w: 400,
            min_h: 300,
            cascade_origin: 100,
            cascade_step: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: WindowId,
    pub app: AppId,
    pub title: String,
    pub content: ContentRef,
    pub rect: WinRect,
    pub restore_rect: Option<WinRect>,
    pub z_index: u64,
    pub minimized: bool,
    pub maximized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabKind {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grab {
    window: WindowId,
    kind: GrabKind,
    last: (i32, i32),
}

#[derive(Debug, Clone)]
pub struct WindowManager {
    windows: Vec<Window>,
    next_id: u64,
    next_z: u64,
    focused: Option<WindowId>,
    grab: Option<Grab>,
    desk: WinRect,
    metrics: WindowMetrics,
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new(WinRect::new(0, 0, 1920, 1080), WindowMetrics::default())
    }
}

impl WindowManager {
    pub fn new(desk: WinRect, metrics: WindowMetrics) -> Self {
        Self {
            windows: Vec::new(),
            next_id: 1,
            next_z: 1,
            focused: None,
            grab: None,
            desk,
            metrics,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn window_for_app(&self, app: &AppId) -> Option<&Window> {
        self.windows.iter().find(|w| &w.app == app)
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    pub fn focused_window(&self) -> Option<&Window> {
        self.focused.and_then(|id| self.get(id))
    }

    /// Visible windows bottom to top.
    pub fn stacked(&self) -> Vec<&Window> {
        let mut visible: Vec<&Window> = self.windows.iter().filter(|w| !w.minimized).collect();
        visible.sort_by_key(|w| w.z_index);
        visible
    }

    /// The grid shows through only when nothing is on screen.
    pub fn is_desktop_visible(&self) -> bool {
        self.windows.iter().all(|w| w.minimized)
    }

    pub fn desk(&self) -> WinRect {
        self.desk
    }

    pub fn is_grabbing(&self) -> bool {
        self.grab.is_some()
    }

    /// Topmost visible window under a point.
    pub fn hit(&self, x: i32, y: i32) -> Option<WindowId> {
        self.stacked()
            .into_iter()
            .rev()
            .find(|w| w.rect.contains(x, y))
            .map(|w| w.id)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Opens a window for `app`, or raises the one already open.
    pub fn open(&mut self, app: AppId, title: &str, content: ContentRef) -> WindowId {
        if let Some(id) = self.window_for_app(&app).map(|w| w.id) {
            debug!(%app, "app already open; raising");
            self.raise(id);
            return id;
        }
        let id = WindowId(self.next_id);
        self.next_id += 1;
        let offset = self.metrics.cascade_origin + self.metrics.cascade_step * self.windows.len() as i32;
        let z_index = self.bump_z();
        self.windows.push(Window {
            id,
            app: app.clone(),
            title: title.to_string(),
            content,
            rect: WinRect::new(
                self.desk.x + offset,
                self.desk.y + offset,
                self.metrics.default_w,
                self.metrics.default_h,
            ),
            restore_rect: None,
            z_index,
            minimized: false,
            maximized: false,
        });
        self.focused = Some(id);
        info!(%app, window = id.0, "window opened");
        id
    }

    pub fn close(&mut self, id: WindowId) -> bool {
        let Some(pos) = self.windows.iter().position(|w| w.id == id) else {
            warn!(window = id.0, "close on unknown window");
            return false;
        };
        let win = self.windows.remove(pos);
        if self.focused == Some(id) {
            self.focused = None;
        }
        if self.grab.is_some_and(|g| g.window == id) {
            self.grab = None;
        }
        info!(app = %win.app, window = id.0, "window closed");
        true
    }

    pub fn close_all(&mut self) {
        self.windows.clear();
        self.focused = None;
        self.grab = None;
    }

    pub fn minimize(&mut self, id: WindowId) {
        let Some(win) = self.find_mut(id) else {
            warn!(window = id.0, "minimize on unknown window");
            return;
        };
        win.minimized = true;
        if self.focused == Some(id) {
            self.focused = None;
        }
        if self.grab.is_some_and(|g| g.window == id) {
            self.grab = None;
        }
    }

    pub fn minimize_all(&mut self) {
        for win in &mut self.windows {
            win.minimized = true;
        }
        self.focused = None;
        self.grab = None;
    }

    /// Un-minimizes and focuses.
    pub fn restore(&mut self, id: WindowId) {
        if self.get(id).is_none() {
            warn!(window = id.0, "restore on unknown window");
            return;
        }
        self.raise(id);
    }

    pub fn focus(&mut self, id: WindowId) {
        if self.get(id).is_none() {
            warn!(window = id.0, "focus on unknown window");
            return;
        }
        self.raise(id);
    }

    /// Dock behaviour: open, restore, or minimize the focused one.
    pub fn toggle(&mut self, app: AppId, title: &str, content: ContentRef) -> Option<WindowId> {
        let Some(win) = self.window_for_app(&app) else {
            return Some(self.open(app, title, content));
        };
        let id = win.id;
        if !win.minimized && self.focused == Some(id) {
            self.minimize(id);
            None
        } else {
            self.raise(id);
            Some(id)
        }
    }

    pub fn toggle_maximize(&mut self, id: WindowId) {
        let desk = self.desk;
        let Some(win) = self.find_mut(id) else {
            warn!(window = id.0, "maximize on unknown window");
            return;
        };
        if win.maximized {
            win.maximized = false;
            if let Some(prev) = win.restore_rect.take() {
                win.rect = prev;
            }
        } else {
            win.restore_rect = Some(win.rect);
            win.maximized = true;
            win.rect = desk;
        }
        if self.grab.is_some_and(|g| g.window == id) {
            self.grab = None;
        }
    }

    pub fn set_desktop(&mut self, desk: WinRect) {
        self.desk = desk;
        for win in self.windows.iter_mut().filter(|w| w.maximized) {
            win.rect = desk;
        }
    }

    // ── Geometry ─────────────────────────────────────────────────────────────

    pub fn begin_move(&mut self, id: WindowId, x: i32, y: i32) {
        self.begin_grab(id, GrabKind::Move, x, y);
    }

    pub fn begin_resize(&mut self, id: WindowId, x: i32, y: i32) {
        self.begin_grab(id, GrabKind::Resize, x, y);
    }

    fn begin_grab(&mut self, id: WindowId, kind: GrabKind, x: i32, y: i32) {
        let Some(win) = self.get(id) else {
            warn!(window = id.0, "grab on unknown window");
            return;
        };
        let maximized = win.maximized;
        self.raise(id);
        if maximized {
            return;
        }
        self.grab = Some(Grab {
            window: id,
            kind,
            last: (x, y),
        });
    }

    /// Pointer motion while a grab is active; ignored otherwise.
    pub fn drag_to(&mut self, x: i32, y: i32) {
        let Some(grab) = self.grab.as_mut() else {
            return;
        };
        let (dx, dy) = (x - grab.last.0, y - grab.last.1);
        grab.last = (x, y);
        let (id, kind) = (grab.window, grab.kind);
        match kind {
            GrabKind::Move => self.move_by(id, dx, dy),
            GrabKind::Resize => self.resize_by(id, dx, dy),
        }
    }

    /// Pointer release anywhere on screen.
    pub fn end_grab(&mut self) {
        self.grab = None;
    }

    pub fn move_by(&mut self, id: WindowId, dx: i32, dy: i32) {
        if !self.grab.is_some_and(|g| g.window == id && g.kind == GrabKind::Move) {
            return;
        }
        let desk = self.desk;
        let Some(win) = self.find_mut(id) else {
            return;
        };
        if win.maximized {
            return;
        }
        let max_x = (desk.right() - i32::from(win.rect.w)).max(desk.x);
        let max_y = (desk.bottom() - i32::from(win.rect.h)).max(desk.y);
        win.rect.x = (win.rect.x + dx).clamp(desk.x, max_x);
        win.rect.y = (win.rect.y + dy).clamp(desk.y, max_y);
    }

    pub fn resize_by(&mut self, id: WindowId, dw: i32, dh: i32) {
        if !self.grab.is_some_and(|g| g.window == id && g.kind == GrabKind::Resize) {
            return;
        }
        let metrics = self.metrics;
        let Some(win) = self.find_mut(id) else {
            return;
        };
        if win.maximized {
            return;
        }
        let w = (i32::from(win.rect.w) + dw).clamp(i32::from(metrics.min_w), i32::from(u16::MAX));
        let h = (i32::from(win.rect.h) + dh).clamp(i32::from(metrics.min_h), i32::from(u16::MAX));
        win.rect.w = w as u16;
        win.rect.h = h as u16;
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn find_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    fn bump_z(&mut self) -> u64 {
        let z = self.next_z;
        self.next_z += 1;
        z
    }

    fn raise(&mut self, id: WindowId) {
        let z = self.bump_z();
        if let Some(win) = self.find_mut(id) {
            win.minimized = false;
            win.z_index = z;
            self.focused = Some(id);
        }
    }
}
