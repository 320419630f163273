use rfb_display::MonitorInfo;
use tracing::{debug, info, warn};

fn monitor_name(m: &MonitorInfo) -> &str {
    m.name.as_deref().unwrap_or("unknown")
}

/// Picks a monitor by index (`"0"`, `"1"`, ...) or by substring match against its name.
fn select_monitor(monitors: &[MonitorInfo], selector: &str) -> Option<(usize, MonitorInfo)> {
    if let Ok(index) = selector.parse::<usize>() {
        return monitors.get(index).cloned().map(|m| (index, m));
    }
    monitors
        .iter()
        .position(|m| monitor_name(m).eq_ignore_ascii_case(selector))
        .or_else(|| {
            monitors
                .iter()
                .position(|m| monitor_name(m).to_lowercase().contains(&selector.to_lowercase()))
        })
        .map(|idx| (idx, monitors[idx].clone()))
}

#[derive(Debug, Clone, Default)]
pub struct FullscreenState {
    pub enabled: bool,
    pub target: Option<MonitorInfo>,
    pub target_index: Option<usize>,
}

pub struct FullscreenController {
    state: FullscreenState,
}

impl FullscreenController {
    pub fn new() -> Self { Self { state: FullscreenState::default() } }

    pub fn state(&self) -> &FullscreenState { &self.state }

    pub fn set_target(&mut self, monitors: &[MonitorInfo], selector: Option<&str>) {
        let picked = selector.and_then(|s| select_monitor(monitors, s));
        self.state.target_index = picked.as_ref().map(|(idx, _)| *idx);
        self.state.target = picked.map(|(_, m)| m);
        if let Some(t) = &self.state.target {
            info!(
                "Fullscreen target monitor: {} '{}', {}x{} @{}x",
                self.state.target_index.unwrap_or(0),
                monitor_name(t),
                t.size.width,
                t.size.height,
                t.scale_factor
            );
        }
    }

    /// Apply fullscreen state via egui viewport command. Note: per-monitor
    /// placement is pending; current behavior uses window-manager default (usually primary).
    pub fn apply(&self, ctx: &egui::Context) {
        debug!("Applying fullscreen: {}", self.state.enabled);
        ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.state.enabled));
        if self.state.enabled {
            if let Some(t) = &self.state.target {
                warn!("Per-monitor fullscreen placement pending (requested '{}')", monitor_name(t));
            }
        }
    }

    pub fn toggle(&mut self) { self.state.enabled = !self.state.enabled; }
    pub fn set_enabled(&mut self, enabled: bool) { self.state.enabled = enabled; }

    /// Move to next monitor in list (cycling)
    pub fn next_monitor(&mut self, monitors: &[MonitorInfo]) {
        if monitors.is_empty() { return; }
        let current_idx = self.state.target_index.unwrap_or(0);
        let next_idx = (current_idx + 1) % monitors.len();
        self.state.target_index = Some(next_idx);
        self.state.target = monitors.get(next_idx).cloned();
        info!("Switched to monitor {}: '{}'", next_idx, self.state.target.as_ref().map(monitor_name).unwrap_or("unknown"));
    }

    /// Move to previous monitor in list (cycling)
    pub fn prev_monitor(&mut self, monitors: &[MonitorInfo]) {
        if monitors.is_empty() { return; }
        let current_idx = self.state.target_index.unwrap_or(0);
        let prev_idx = if current_idx == 0 { monitors.len() - 1 } else { current_idx - 1 };
        self.state.target_index = Some(prev_idx);
        self.state.target = monitors.get(prev_idx).cloned();
        info!("Switched to monitor {}: '{}'", prev_idx, self.state.target.as_ref().map(monitor_name).unwrap_or("unknown"));
    }

    /// Jump to monitor by index
    pub fn jump_to_monitor(&mut self, monitors: &[MonitorInfo], index: usize) {
        if let Some(target) = monitors.get(index).cloned() {
            info!("Jumped to monitor {}: '{}'", index, monitor_name(&target));
            self.state.target_index = Some(index);
            self.state.target = Some(target);
        } else {
            warn!("Monitor index {} not found", index);
        }
    }

    /// Jump to primary monitor
    pub fn jump_to_primary(&mut self, monitors: &[MonitorInfo]) {
        if let Some(idx) = monitors.iter().position(|m| m.is_primary) {
            info!("Jumped to primary monitor: '{}'", monitor_name(&monitors[idx]));
            self.state.target_index = Some(idx);
            self.state.target = Some(monitors[idx].clone());
        } else {
            warn!("Primary monitor not found");
        }
    }
}
