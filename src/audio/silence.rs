//! Silence-aware start selection.
//!
//! A noise-gate pass over the track yields silent intervals; their
//! complement inside `[0, duration]` is the audible material a preview
//! window should land on.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::argv;
use crate::engine::{path_arg, Engine};
use crate::error::{PackError, Result};

use super::{NonSilentSpan, SilenceInterval, Track};

/// Noise gate level for `silencedetect`.
pub const NOISE_THRESHOLD_DB: f64 = -35.0;

/// Minimum silence length the gate reports, in seconds.
pub const MIN_SILENCE_SECS: f64 = 0.35;

/// A span qualifies outright when it exceeds the window by this much.
const SPAN_SLACK: f64 = 0.5;

/// Offset past the first audible sample of a qualifying span.
const ENTRY_MARGIN: f64 = 0.25;

/// Distance kept from the end of the track when clamping.
pub const END_GUARD: f64 = 0.2;

fn silence_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"silence_start:\s*(-?[0-9.]+)").expect("valid regex"))
}

fn silence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"silence_end:\s*(-?[0-9.]+)").expect("valid regex"))
}

/// Extract silence intervals from `silencedetect` diagnostics.
///
/// A `silence_start` that is never closed runs to `duration`.
pub fn parse_silence_log(stderr: &str, duration: f64) -> Vec<SilenceInterval> {
    let mut silences = Vec::new();
    let mut open: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = silence_start_re().captures(line) {
            if let Ok(start) = caps[1].parse::<f64>() {
                open = Some(start.max(0.0));
            }
        }
        if let Some(caps) = silence_end_re().captures(line) {
            if let (Some(start), Ok(end)) = (open, caps[1].parse::<f64>()) {
                silences.push(SilenceInterval { start, end });
                open = None;
            }
        }
    }

    if let Some(start) = open {
        if start < duration {
            silences.push(SilenceInterval {
                start,
                end: duration,
            });
        }
    }

    silences
}

/// Sort, clip to `[0, duration]` and coalesce overlapping silences.
pub fn merge_silences(silences: &[SilenceInterval], duration: f64) -> Vec<SilenceInterval> {
    let mut sorted: Vec<SilenceInterval> = silences
        .iter()
        .map(|s| SilenceInterval {
            start: s.start.clamp(0.0, duration),
            end: s.end.clamp(0.0, duration),
        })
        .filter(|s| s.end > s.start)
        .collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<SilenceInterval> = Vec::with_capacity(sorted.len());
    for s in sorted {
        if let Some(last) = merged.last_mut() {
            if s.start <= last.end {
                last.end = last.end.max(s.end);
                continue;
            }
        }
        merged.push(s);
    }
    merged
}

/// Complement of the merged silences within `[0, duration]`, sorted and disjoint.
pub fn non_silent_spans(silences: &[SilenceInterval], duration: f64) -> Vec<NonSilentSpan> {
    let mut spans = Vec::new();
    let mut t = 0.0_f64;

    for s in merge_silences(silences, duration) {
        if s.start > t {
            spans.push(NonSilentSpan { start: t, end: s.start });
        }
        t = t.max(s.end);
    }
    if t < duration {
        spans.push(NonSilentSpan { start: t, end: duration });
    }
    spans
}

/// Greedy start selection over audible spans.
///
/// First span long enough wins; otherwise the widest span is centred on;
/// otherwise a fixed fraction into the track.
pub fn pick_non_silent_start(spans: &[NonSilentSpan], duration: f64, want: f64) -> f64 {
    if want >= duration {
        return 0.0;
    }

    if let Some(span) = spans.iter().find(|s| s.len() >= want + SPAN_SLACK) {
        return (span.start + ENTRY_MARGIN).max(0.0);
    }

    let widest = spans
        .iter()
        .copied()
        .reduce(|best, s| if s.len() > best.len() { s } else { best });
    if let Some(span) = widest {
        let centred = span.midpoint() - want / 2.0;
        return centred.min(duration - want - END_GUARD).max(0.0);
    }

    let start = (duration * 0.10).max(15.0);
    if start + want > duration {
        return (duration - want - END_GUARD).max(0.0);
    }
    start
}

/// Run the noise gate over `track` and pick a start offset for a `want`-second window.
pub async fn find_non_silent_start(engine: &dyn Engine, track: &Track, want: f64) -> Result<f64> {
    if !(want > 0.0) {
        return Err(PackError::InvalidInput(format!(
            "window length must be positive, got {want}"
        )));
    }
    if want >= track.duration {
        return Ok(0.0);
    }

    let args = argv![
        "-hide_banner",
        "-nostats",
        "-i",
        path_arg(&track.path),
        "-af",
        format!("silencedetect=noise={NOISE_THRESHOLD_DB}dB:d={MIN_SILENCE_SECS}"),
        "-f",
        "null",
        "-",
    ];
    let output = engine.ffmpeg(&args).await?;

    let silences = parse_silence_log(&output.stderr, track.duration);
    let spans = non_silent_spans(&silences, track.duration);
    let start = pick_non_silent_start(&spans, track.duration, want);

    debug!(
        "{}: {} silences, {} audible spans, start {:.3}s",
        track.path.display(),
        silences.len(),
        spans.len(),
        start
    );
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(start: f64, end: f64) -> SilenceInterval {
        SilenceInterval { start, end }
    }

    #[test]
    fn test_parse_silence_log() {
        let log = "\
[silencedetect @ 0x55] silence_start: 0
[silencedetect @ 0x55] silence_end: 1.25 | silence_duration: 1.25
size=N/A time=00:00:10.00 bitrate=N/A
[silencedetect @ 0x55] silence_start: 42.5
[silencedetect @ 0x55] silence_end: 44 | silence_duration: 1.5
";
        let parsed = parse_silence_log(log, 60.0);
        assert_eq!(parsed, vec![silence(0.0, 1.25), silence(42.5, 44.0)]);
    }

    #[test]
    fn test_parse_unterminated_silence_runs_to_end() {
        let log = "[silencedetect @ 0x1] silence_start: 55.1\n";
        let parsed = parse_silence_log(log, 60.0);
        assert_eq!(parsed, vec![silence(55.1, 60.0)]);
    }

    #[test]
    fn test_parse_end_without_start_ignored() {
        let log = "[silencedetect @ 0x1] silence_end: 3.0 | silence_duration: 3.0\n";
        assert!(parse_silence_log(log, 60.0).is_empty());
    }

    #[test]
    fn test_merge_silences_sorts_and_coalesces() {
        let merged = merge_silences(
            &[silence(20.0, 25.0), silence(2.0, 4.0), silence(3.5, 6.0), silence(58.0, 70.0)],
            60.0,
        );
        assert_eq!(
            merged,
            vec![silence(2.0, 6.0), silence(20.0, 25.0), silence(58.0, 60.0)]
        );
    }

    #[test]
    fn test_spans_partition_the_track() {
        let cases: Vec<(Vec<SilenceInterval>, f64)> = vec![
            (vec![], 30.0),
            (vec![silence(0.0, 30.0)], 30.0),
            (vec![silence(0.0, 1.0), silence(10.0, 12.0)], 30.0),
            (vec![silence(5.0, 9.0), silence(1.0, 6.0), silence(28.0, 31.0)], 30.0),
            (vec![silence(12.0, 13.0), silence(12.5, 12.7), silence(29.0, 30.0)], 30.0),
        ];

        for (silences, duration) in cases {
            let merged = merge_silences(&silences, duration);
            let spans = non_silent_spans(&silences, duration);

            for pair in spans.windows(2) {
                assert!(pair[0].end <= pair[1].start, "spans overlap: {pair:?}");
                assert!(pair[0].start < pair[1].start, "spans unsorted: {pair:?}");
            }

            let audible: f64 = spans.iter().map(NonSilentSpan::len).sum();
            let silent: f64 = merged.iter().map(SilenceInterval::len).sum();
            assert!(
                (audible + silent - duration).abs() < 1e-9,
                "coverage mismatch for {silences:?}"
            );
        }
    }

    #[test]
    fn test_want_exceeding_duration_starts_at_zero() {
        let spans = non_silent_spans(&[silence(0.0, 3.0)], 10.0);
        assert_eq!(pick_non_silent_start(&spans, 10.0, 10.0), 0.0);
        assert_eq!(pick_non_silent_start(&spans, 10.0, 25.0), 0.0);
        assert_eq!(pick_non_silent_start(&[], 5.0, 15.0), 0.0);
    }

    #[test]
    fn test_first_long_span_wins() {
        let spans = non_silent_spans(&[silence(0.0, 4.0), silence(30.0, 31.0)], 120.0);
        // 4..30 is 26s long, enough for 15 + 0.5
        assert_eq!(pick_non_silent_start(&spans, 120.0, 15.0), 4.25);
    }

    #[test]
    fn test_widest_span_is_centred() {
        // nothing fits 15.5s, 6..16 is the widest
        let spans = non_silent_spans(&[silence(5.0, 6.0), silence(16.0, 40.0)], 40.0);
        assert_eq!(spans.len(), 2);
        let start = pick_non_silent_start(&spans, 40.0, 15.0);
        assert!((start - (11.0 - 7.5)).abs() < 1e-9);
    }

    #[test]
    fn test_widest_span_clamped_to_end() {
        let spans = vec![NonSilentSpan {
            start: 10.0,
            end: 20.0,
        }];
        // midpoint 15 - 7 = 8 ; limit 20 - 14 - 0.2 = 5.8
        let start = pick_non_silent_start(&spans, 20.0, 14.0);
        assert!((start - 5.8).abs() < 1e-9);
    }

    #[test]
    fn test_silent_track_fallback() {
        assert_eq!(pick_non_silent_start(&[], 300.0, 15.0), 30.0);
        assert_eq!(pick_non_silent_start(&[], 60.0, 15.0), 15.0);
        // 15 + 10 > 20 ; pull back to 20 - 10 - 0.2
        let start = pick_non_silent_start(&[], 20.0, 10.0);
        assert!((start - 9.8).abs() < 1e-9);
    }
}
