pub mod crossfade;
pub mod onset;
pub mod silence;
pub mod snippet;
pub mod start;

pub use crossfade::{crossfade_sequence, CrossfadeOptions};
pub use onset::{default_analyzer, AnalysisError, OnsetAnalyzer, OnsetEnvelope, Unavailable};
#[cfg(feature = "onset")]
pub use onset::{onset_strength, SpectralFlux};
pub use silence::{
    find_non_silent_start, merge_silences, non_silent_spans, parse_silence_log, pick_non_silent_start,
};
pub use snippet::build_snippets;
pub use start::{best_window_start, EnergyPeak, NonSilent, StartEstimator, StartStrategy};

use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::error::Result;

/// A source audio file and its probed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    /// Total duration in seconds.
    pub duration: f64,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    /// Probe `path` once; the duration is fixed for the rest of the run.
    pub async fn probe(engine: &dyn Engine, path: &Path) -> Result<Self> {
        let duration = engine.probe_duration(path).await?;
        Ok(Self::new(path, duration))
    }
}

/// A stretch the noise gate classified as silent, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    pub fn len(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0.0
    }
}

/// Audible content between silences, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonSilentSpan {
    pub start: f64,
    pub end: f64,
}

impl NonSilentSpan {
    pub fn len(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0.0
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// A short clip cut from a track for the preview.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub source: PathBuf,
    pub path: PathBuf,
    /// Offset into the source, in seconds.
    pub start: f64,
    /// Clip length in seconds; `start + length` never exceeds the source duration.
    pub length: f64,
}
