//! Highlight pulse on the selected area's outline.
//!
//! Each frame sets the outline opacity to `0.6 + 0.3 sin(0.08 f)` and the
//! width to `5 + 2 sin(0.06 f)` for frame number `f`. After
//! [`PulseConfig::max_frames`] frames the loop ends and the last style stays
//! painted until the pulse is stopped.

use std::time::Duration;

use realty_map_area_models::AreaId;
use realty_map_schedule::TaskHandle;
use realty_map_surface::HighlightStyle;
use serde::{Deserialize, Serialize};

/// Pulse timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub frame_interval_ms: u64,
    pub max_frames: u32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            max_frames: 100,
        }
    }
}

impl PulseConfig {
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Highlight paint for frame `frame`.
#[must_use]
pub fn pulse_style(frame: u32) -> HighlightStyle {
    let f = f64::from(frame);
    HighlightStyle {
        opacity: (f * 0.08).sin().mul_add(0.3, 0.6),
        width: (f * 0.06).sin().mul_add(2.0, 5.0),
    }
}

/// Running or settled pulse for one area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulse {
    pub area_id: AreaId,
    /// Frame task, `None` once the loop has settled.
    pub handle: Option<TaskHandle>,
    /// Next frame to draw.
    pub frame: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_at_rest() {
        let style = pulse_style(0);
        assert!((style.opacity - 0.6).abs() < 1e-12);
        assert!((style.width - 5.0).abs() < 1e-12);
    }

    #[test]
    fn style_stays_in_range() {
        for frame in 0..1000 {
            let style = pulse_style(frame);
            assert!((0.3..=0.9).contains(&style.opacity), "frame {frame}");
            assert!((3.0..=7.0).contains(&style.width), "frame {frame}");
        }
    }
}
