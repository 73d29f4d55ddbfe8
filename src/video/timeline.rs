//! Where each segment label sits on the preview's timeline.
//!
//! Snippets of `preview_length` seconds overlap by `crossfade`, so segment
//! `k` (0-based) starts at `k * slot` with `slot = preview_length - crossfade`.

use crate::error::{PackError, Result};

/// Labels disappear this long before the next crossfade begins.
pub const LABEL_GUARD: f64 = 0.02;

/// Window during which the label for segment `index` (1-based) is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSlot {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl TimelineSlot {
    /// Zero-padded label text, e.g. `"03"`.
    pub fn label(&self) -> String {
        format!("{:02}", self.index)
    }
}

/// Timing of a preview built from `count` crossfaded snippets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTimeline {
    count: usize,
    preview_length: f64,
    crossfade: f64,
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

impl PreviewTimeline {
    pub fn new(count: usize, preview_length: f64, crossfade: f64) -> Result<Self> {
        if count == 0 {
            return Err(PackError::InvalidInput(
                "preview needs at least one snippet".to_string(),
            ));
        }
        if !(preview_length > 0.0) {
            return Err(PackError::InvalidInput(format!(
                "preview length must be positive, got {preview_length}"
            )));
        }
        if !(crossfade >= 0.0 && crossfade < preview_length) {
            return Err(PackError::InvalidInput(format!(
                "crossfade {crossfade}s must be in [0, {preview_length})"
            )));
        }
        Ok(Self {
            count,
            preview_length,
            crossfade,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn preview_length(&self) -> f64 {
        self.preview_length
    }

    pub fn crossfade(&self) -> f64 {
        self.crossfade
    }

    /// Spacing between consecutive segment starts.
    pub fn slot(&self) -> f64 {
        self.preview_length - self.crossfade
    }

    /// Length of the crossfaded preview audio, and so of the video.
    pub fn total_duration(&self) -> f64 {
        self.preview_length + (self.count - 1) as f64 * self.slot()
    }

    pub fn slots(&self) -> Vec<TimelineSlot> {
        (0..self.count)
            .map(|k| {
                let start = round6(k as f64 * self.slot());
                let end = round6(start + self.preview_length - self.crossfade - LABEL_GUARD);
                TimelineSlot {
                    index: k + 1,
                    start,
                    end,
                }
            })
            .collect()
    }
}
