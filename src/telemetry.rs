use std::time::{Duration, Instant};
use sysinfo::{Disks, System};

const MIN_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub cpu: f32,
    pub ram_pct: f32,
    pub battery_pct: Option<f32>,
    pub disk_pct: Option<f32>,
}

// ── Sampler ───────────────────────────────────────────────────────────────────

/// Caches readings so the status bar can ask every frame.
pub struct TelemetrySampler {
    sys: System,
    disks: Disks,
    last: Option<(Instant, Telemetry)>,
}

impl TelemetrySampler {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            disks: Disks::new_with_refreshed_list(),
            last: None,
        }
    }

    pub fn sample(&mut self, now: Instant) -> Telemetry {
        if let Some((at, cached)) = self.last {
            if now.saturating_duration_since(at) < MIN_INTERVAL {
                return cached;
            }
        }
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.disks.refresh();
        let reading = Telemetry {
            cpu: self.sys.global_cpu_usage(),
            ram_pct: percent(self.sys.used_memory(), self.sys.total_memory()).unwrap_or(0.0),
            battery_pct: read_battery_linux(),
            disk_pct: self.root_disk_pct(),
        };
        self.last = Some((now, reading));
        reading
    }

    fn root_disk_pct(&self) -> Option<f32> {
        let disk = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| self.disks.list().first())?;
        let total = disk.total_space();
        percent(total.saturating_sub(disk.available_space()), total)
    }
}

impl Default for TelemetrySampler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn percent(used: u64, total: u64) -> Option<f32> {
    (total > 0).then(|| (used as f64 / total as f64 * 100.0) as f32)
}

// sysinfo doesn't expose battery; use /sys/class/power_supply on Linux
fn read_battery_linux() -> Option<f32> {
    for entry in std::fs::read_dir("/sys/class/power_supply").ok()? {
        let path = entry.ok()?.path();
        let kind = std::fs::read_to_string(path.join("type")).ok()?;
        if kind.trim() == "Battery" {
            let cap = std::fs::read_to_string(path.join("capacity")).ok()?;
            return cap.trim().parse().ok();
        }
    }
    None
}

// ── About ─────────────────────────────────────────────────────────────────────

pub fn about_lines() -> Vec<String> {
    let mut sys = System::new_all();
    sys.refresh_all();
    let cpu = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .unwrap_or_default();
    let secs = System::uptime();
    vec![
        format!(
            "OS: {} {}",
            System::name().unwrap_or_default(),
            System::os_version().unwrap_or_default()
        ),
        format!("Hostname: {}", System::host_name().unwrap_or_default()),
        format!("CPU: {cpu} ({} cores)", sys.cpus().len()),
        format!(
            "Memory: {} / {} MB",
            sys.used_memory() / 1024 / 1024,
            sys.total_memory() / 1024 / 1024
        ),
        format!("Uptime: {}h {}m", secs / 3600, (secs % 3600) / 60),
    ]
}
