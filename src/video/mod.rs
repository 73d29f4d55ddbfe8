pub mod background;
pub mod overlay;
pub mod timeline;

pub use background::{render_preview_video, BackgroundSource, RenderSettings, RenderedVideo};
pub use overlay::{build_filter_chain, default_font, escape_font_path, resolve_font};
pub use timeline::{PreviewTimeline, TimelineSlot, LABEL_GUARD};

use std::fmt;
use std::str::FromStr;

/// Frame size of the rendered preview, e.g. `1280x720`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid resolution: {s}. Use WIDTHxHEIGHT, e.g. 1280x720"))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|e| format!("Invalid width in '{s}': {e}"))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|e| format!("Invalid height in '{s}': {e}"))?;
        if width == 0 || height == 0 {
            return Err(format!("Resolution must be non-zero: {s}"));
        }
        Ok(Self { width, height })
    }
}
