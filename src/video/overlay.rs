use std::path::Path;

use super::timeline::TimelineSlot;
use super::Resolution;

/// Fonts tried in order for the segment numbers.
pub const FONT_CANDIDATES: &[&str] = &[
    "C:/Windows/Fonts/arial.ttf",
    "C:/Windows/Fonts/ARIAL.TTF",
    "C:/Windows/Fonts/segoeui.ttf",
    "C:/Windows/Fonts/calibri.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
];

/// Returned when no candidate exists; drawtext reports the missing file itself.
pub const FALLBACK_FONT: &str = "C:/Windows/Fonts/arial.ttf";

const FONT_SIZE: u32 = 200;
const BORDER_WIDTH: u32 = 6;

/// First existing font among `candidates`, else `fallback` as given.
pub fn resolve_font<P: AsRef<Path>>(candidates: &[P], fallback: &str) -> String {
    for candidate in candidates {
        let path: &Path = candidate.as_ref();
        if path.is_file() {
            return path.to_string_lossy().replace('\\', "/");
        }
    }
    fallback.replace('\\', "/")
}

pub fn default_font() -> String {
    resolve_font(FONT_CANDIDATES, FALLBACK_FONT)
}

/// Make a font path safe inside a drawtext option value.
pub fn escape_font_path(path: &str) -> String {
    path.replace('\\', "/").replace(':', "\\:")
}

/// Scale the background, then stack one time-gated number per slot.
///
/// Stages are chained `[v0] -> [v1] -> ... -> [out]`, so each label only
/// renders inside its own `between(t, start, end)` window.
pub fn build_filter_chain(resolution: Resolution, slots: &[TimelineSlot], font: &str) -> String {
    let fontfile = escape_font_path(font);
    let mut parts = Vec::with_capacity(slots.len() + 2);
    parts.push(format!(
        "[0:v]scale={}:{},setsar=1[v0]",
        resolution.width, resolution.height
    ));

    let mut prev = "v0".to_string();
    for slot in slots {
        let next = format!("v{}", slot.index);
        parts.push(format!(
            "[{prev}]drawtext=fontfile='{fontfile}':text='{label}':\
             fontcolor=white:borderw={BORDER_WIDTH}:bordercolor=black:fontsize={FONT_SIZE}:\
             x=(w-tw)/2:y=(h-th)/2:enable=between(t\\,{start}\\,{end})[{next}]",
            label = slot.label(),
            start = slot.start,
            end = slot.end,
        ));
        prev = next;
    }

    parts.push(format!("[{prev}]format=yuv420p[out]"));
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::PreviewTimeline;

    #[test]
    fn test_escape_font_path() {
        assert_eq!(
            escape_font_path("C:\\Windows\\Fonts\\arial.ttf"),
            "C\\:/Windows/Fonts/arial.ttf"
        );
        assert_eq!(escape_font_path("/usr/share/a.ttf"), "/usr/share/a.ttf");
    }

    #[test]
    fn test_resolve_font_prefers_existing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.ttf");
        std::fs::write(&present, b"font").unwrap();
        let missing = dir.path().join("missing.ttf");

        let chosen = resolve_font(&[missing.clone(), present.clone()], "fallback.ttf");
        assert_eq!(chosen, present.to_string_lossy().replace('\\', "/"));

        let chosen = resolve_font(&[missing], "C:\\Fonts\\x.ttf");
        assert_eq!(chosen, "C:/Fonts/x.ttf");
    }

    #[test]
    fn test_filter_chain_is_linear() {
        let slots = PreviewTimeline::new(3, 15.0, 0.5).unwrap().slots();
        let chain = build_filter_chain(Resolution::default(), &slots, "/fonts/a.ttf");
        let stages: Vec<&str> = chain.split(';').collect();

        assert_eq!(stages.len(), 5);
        assert_eq!(stages[0], "[0:v]scale=1280:720,setsar=1[v0]");
        assert!(stages[1].starts_with("[v0]drawtext="));
        assert!(stages[1].ends_with("[v1]"));
        assert!(stages[2].starts_with("[v1]drawtext="));
        assert!(stages[3].ends_with("[v3]"));
        assert_eq!(stages[4], "[v3]format=yuv420p[out]");

        assert!(stages[1].contains("text='01'"));
        assert!(stages[1].contains("enable=between(t\\,0\\,14.48)"));
        assert!(stages[2].contains("enable=between(t\\,14.5\\,28.98)"));
        assert!(stages[3].contains("text='03'"));
        assert!(stages[3].contains("enable=between(t\\,29\\,43.48)"));
    }

    #[test]
    fn test_filter_chain_escapes_drive_letter() {
        let slots = PreviewTimeline::new(1, 10.0, 0.5).unwrap().slots();
        let chain = build_filter_chain(Resolution::default(), &slots, "C:/Windows/Fonts/arial.ttf");
        assert!(chain.contains("fontfile='C\\:/Windows/Fonts/arial.ttf'"));
    }
}
