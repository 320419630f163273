//! Multi-monitor support and window placement functionality.
//!
//! This module provides utilities for detecting available monitors, managing
//! window placement across multiple displays, and handling high DPI scenarios
//! on different monitors.

use crate::DpiConfig;
use std::fmt;
use tracing::debug;
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    monitor::{MonitorHandle, VideoMode},
};

/// Information about a display monitor
#[derive(Debug, Clone)]
pub struct MonitorInfo {
    /// Monitor name (if available)
    pub name: Option<String>,
    /// Physical position of monitor in desktop coordinate system
    pub position: PhysicalPosition<i32>,
    /// Physical size of monitor in pixels
    pub size: PhysicalSize<u32>,
    /// DPI scale factor for this monitor
    pub scale_factor: f64,
    /// Whether this is the primary monitor
    pub is_primary: bool,
    /// DPI configuration for this monitor
    pub dpi_config: DpiConfig,
    /// Available video modes (resolutions)
    pub video_modes: Vec<VideoModeInfo>,
}

impl MonitorInfo {
    /// Create MonitorInfo from a winit MonitorHandle
    pub fn from_monitor_handle(monitor: &MonitorHandle, is_primary: bool) -> Self {
        let position = monitor.position();
        let size = monitor.size();
        let scale_factor = monitor.scale_factor();
        let name = monitor.name();

        let dpi_config = DpiConfig::from_scale_factor(scale_factor);

        // Collect video modes
        let video_modes: Vec<VideoModeInfo> = monitor
            .video_modes()
            .map(VideoModeInfo::from_video_mode)
            .collect();

        debug!(
            "Monitor detected: {} {}x{} @{:.1}x scale (primary: {})",
            name.as_deref().unwrap_or("Unknown"),
            size.width,
            size.height,
            scale_factor,
            is_primary
        );

        Self {
            name,
            position,
            size,
            scale_factor,
            is_primary,
            dpi_config,
            video_modes,
        }
    }

    /// Get the logical size of the monitor
    pub fn logical_size(&self) -> PhysicalSize<u32> {
        let (width, height) = self
            .dpi_config
            .physical_size_to_logical(self.size.width, self.size.height);
        PhysicalSize::new(width, height)
    }

    /// Get the working area (excluding taskbars, docks, etc.)
    pub fn working_area(&self) -> Option<(PhysicalPosition<i32>, PhysicalSize<u32>)> {
        // TODO: This would require platform-specific code to get actual working area
        // For now, return the full monitor area
        Some((self.position, self.size))
    }

    /// Check if a point is within this monitor
    pub fn contains_point(&self, point: PhysicalPosition<i32>) -> bool {
        point.x >= self.position.x
            && point.x < self.position.x + self.size.width as i32
            && point.y >= self.position.y
            && point.y < self.position.y + self.size.height as i32
    }

    /// Check if a rectangle intersects with this monitor
    pub fn intersects_rect(
        &self,
        position: PhysicalPosition<i32>,
        size: PhysicalSize<u32>,
    ) -> bool {
        let rect_right = position.x + size.width as i32;
        let rect_bottom = position.y + size.height as i32;
        let monitor_right = self.position.x + self.size.width as i32;
        let monitor_bottom = self.position.y + self.size.height as i32;

        !(position.x >= monitor_right
            || rect_right <= self.position.x
            || position.y >= monitor_bottom
            || rect_bottom <= self.position.y)
    }

    /// Calculate the best position to center a window on this monitor
    pub fn center_window_position(&self, window_size: PhysicalSize<u32>) -> PhysicalPosition<i32> {
        PhysicalPosition::new(
            self.position.x + (self.size.width as i32 - window_size.width as i32) / 2,
            self.position.y + (self.size.height as i32 - window_size.height as i32) / 2,
        )
    }
}

/// Information about a video mode (resolution/refresh rate)
#[derive(Debug, Clone)]
pub struct VideoModeInfo {
    /// Resolution width in pixels
    pub width: u32,
    /// Resolution height in pixels  
    pub height: u32,
    /// Refresh rate in Hz
    pub refresh_rate_millihertz: u32,
    /// Color depth in bits per pixel
    pub bit_depth: u16,
}

impl VideoModeInfo {
    /// Create from a winit VideoMode
    fn from_video_mode(mode: VideoMode) -> Self {
        Self {
            width: mode.size().width,
            height: mode.size().height,
            refresh_rate_millihertz: mode.refresh_rate_millihertz(),
            bit_depth: mode.bit_depth(),
        }
    }

    /// Get refresh rate in Hz
    pub fn refresh_rate_hz(&self) -> f64 {
        self.refresh_rate_millihertz as f64 / 1000.0
    }
}

impl fmt::Display for VideoModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @{:.1}Hz ({}bit)",
            self.width,
            self.height,
            self.refresh_rate_hz(),
            self.bit_depth
        )
    }
}

/// Window placement preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowPlacement {
    /// Place on primary monitor
    Primary,
    /// Place on a specific monitor by index
    Monitor(usize),
    /// Place on monitor containing the mouse cursor
    CursorMonitor,
    /// Place on monitor with most available space
    LargestMonitor,
    /// Remember last position
    RememberLast,
}

impl Default for WindowPlacement {
    fn default() -> Self {
        Self::Primary
    }
}

impl fmt::Display for WindowPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "Primary Monitor"),
            Self::Monitor(index) => write!(f, "Monitor {}", index + 1),
            Self::CursorMonitor => write!(f, "Cursor Monitor"),
            Self::LargestMonitor => write!(f, "Largest Monitor"),
            Self::RememberLast => write!(f, "Remember Last Position"),
        }
    }
}

/// Manager for multi-monitor operations
pub struct MonitorManager {
    /// List of available monitors
    monitors: Vec<MonitorInfo>,
    /// Index of primary monitor
    primary_index: Option<usize>,
}

impl MonitorManager {
    /// Create a new monitor manager by detecting available monitors
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
            primary_index: None,
        }
    }

    /// Update monitor information from the event loop
    pub fn update_monitors<T>(&mut self, event_loop: &winit::event_loop::EventLoopWindowTarget<T>) {
        let available_monitors: Vec<MonitorHandle> = event_loop.available_monitors().collect();
        let primary_monitor = event_loop.primary_monitor();

        debug!("Detected {} monitors", available_monitors.len());

        self.monitors.clear();
        self.primary_index = None;

        for (index, monitor) in available_monitors.iter().enumerate() {
            let is_primary = primary_monitor
                .as_ref()
                .map(|primary| monitor.name() == primary.name())
                .unwrap_or(index == 0);

            if is_primary {
                self.primary_index = Some(index);
            }

            let monitor_info = MonitorInfo::from_monitor_handle(monitor, is_primary);
            self.monitors.push(monitor_info);
        }

        if self.primary_index.is_none() && !self.monitors.is_empty() {
            self.primary_index = Some(0);
            if let Some(monitor) = self.monitors.get_mut(0) {
                monitor.is_primary = true;
            }
        }
    }

    /// Get all available monitors
    pub fn monitors(&self) -> &[MonitorInfo] {
        &self.monitors
    }

    /// Get the primary monitor
    pub fn primary_monitor(&self) -> Option<&MonitorInfo> {
        self.primary_index
            .and_then(|index| self.monitors.get(index))
    }

    /// Get a monitor by index
    pub fn monitor(&self, index: usize) -> Option<&MonitorInfo> {
        self.monitors.get(index)
    }

    /// Get the number of monitors
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Find monitor containing a point
    pub fn monitor_at_point(&self, point: PhysicalPosition<i32>) -> Option<&MonitorInfo> {
        self.monitors
            .iter()
            .find(|monitor| monitor.contains_point(point))
    }

    /// Find monitor with the largest area
    pub fn largest_monitor(&self) -> Option<&MonitorInfo> {
        self.monitors
            .iter()
            .max_by_key(|monitor| monitor.size.width as u64 * monitor.size.height as u64)
    }

    /// Find the best monitor for window placement based on preference
    pub fn best_monitor_for_placement(
        &self,
        placement: WindowPlacement,
        cursor_position: Option<PhysicalPosition<i32>>,
    ) -> Option<&MonitorInfo> {
        match placement {
            WindowPlacement::Primary => self.primary_monitor(),
            WindowPlacement::Monitor(index) => self.monitor(index),
            WindowPlacement::CursorMonitor => {
                if let Some(cursor_pos) = cursor_position {
                    self.monitor_at_point(cursor_pos)
                        .or_else(|| self.primary_monitor())
                } else {
                    self.primary_monitor()
                }
            }
            WindowPlacement::LargestMonitor => self.largest_monitor(),
            WindowPlacement::RememberLast => {
                // TODO: Would need to load last position from preferences
                self.primary_monitor()
            }
        }
    }

    /// Calculate optimal window size for a monitor
    pub fn optimal_window_size(
        &self,
        monitor: &MonitorInfo,
        preferred_size: PhysicalSize<u32>,
        max_ratio: f64,
    ) -> PhysicalSize<u32> {
        let monitor_size = monitor.size;

        // Don't exceed a fraction of the monitor size
        let max_width = (monitor_size.width as f64 * max_ratio) as u32;
        let max_height = (monitor_size.height as f64 * max_ratio) as u32;

        PhysicalSize::new(
            preferred_size.width.min(max_width),
            preferred_size.height.min(max_height),
        )
    }

    /// Get monitor information summary for logging/debugging
    pub fn summary(&self) -> String {
        let mut summary = format!("MonitorManager: {} monitors", self.monitors.len());

        for (index, monitor) in self.monitors.iter().enumerate() {
            let primary_marker = if monitor.is_primary { " [PRIMARY]" } else { "" };
            summary.push_str(&format!(
                "\n  {}: {} {}x{} @{:.1}x{}",
                index + 1,
                monitor.name.as_deref().unwrap_or("Unknown"),
                monitor.size.width,
                monitor.size.height,
                monitor.scale_factor,
                primary_marker
            ));
        }

        summary
    }
}

impl Default for MonitorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MonitorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorManager")
            .field("monitor_count", &self.monitors.len())
            .field("primary_index", &self.primary_index)
            .finish()
    }
}
