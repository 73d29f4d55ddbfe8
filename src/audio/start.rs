use async_trait::async_trait;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{PackError, Result};

use super::onset::{default_analyzer, AnalysisError, OnsetAnalyzer, OnsetEnvelope};
use super::silence::{find_non_silent_start, END_GUARD};
use super::Track;

/// One way of choosing where a preview window starts.
#[async_trait]
pub trait StartStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` hands the decision to the next strategy in the chain.
    async fn estimate(&self, engine: &dyn Engine, track: &Track, want: f64) -> Result<Option<f64>>;
}

/// Index of the `window`-frame run with the largest sum (first on ties).
///
/// Equivalent to the argmax of a "valid" convolution with a ones kernel.
pub fn best_window_start(values: &[f32], window: usize) -> Option<usize> {
    if window == 0 || values.len() < window {
        return None;
    }

    let mut sum: f64 = values[..window].iter().map(|&v| v as f64).sum();
    let mut best = (0, sum);
    for i in 1..=values.len() - window {
        sum += values[i + window - 1] as f64 - values[i - 1] as f64;
        if sum > best.1 {
            best = (i, sum);
        }
    }
    Some(best.0)
}

/// Start of the `want`-second window with the most cumulative onset energy.
pub fn energy_start(
    envelope: &OnsetEnvelope,
    duration: f64,
    want: f64,
) -> std::result::Result<f64, AnalysisError> {
    if envelope.is_empty() {
        return Err(AnalysisError::EmptySignal);
    }

    let window = (want / envelope.frame_secs).round().max(1.0) as usize;
    let index = best_window_start(&envelope.values, window).ok_or(AnalysisError::TooShort {
        frames: envelope.len(),
        window,
    })?;

    let start = (index as f64 * envelope.frame_secs).max(0.0);
    if start + want > duration {
        return Ok((duration - want - END_GUARD).max(0.0));
    }
    Ok(start)
}

/// Places the window on the most eventful section of the track.
pub struct EnergyPeak {
    analyzer: Box<dyn OnsetAnalyzer>,
}

impl EnergyPeak {
    pub fn new(analyzer: Box<dyn OnsetAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl Default for EnergyPeak {
    fn default() -> Self {
        Self::new(default_analyzer())
    }
}

#[async_trait]
impl StartStrategy for EnergyPeak {
    fn name(&self) -> &'static str {
        "energy"
    }

    async fn estimate(&self, engine: &dyn Engine, track: &Track, want: f64) -> Result<Option<f64>> {
        let analysed = match self.analyzer.envelope(engine, track).await {
            Ok(envelope) => energy_start(&envelope, track.duration, want),
            Err(e) => Err(e),
        };

        match analysed {
            Ok(start) => Ok(Some(start)),
            Err(AnalysisError::Unavailable) => Ok(None),
            Err(e) => {
                warn!("{}: onset analysis unusable ({e})", track.path.display());
                Ok(None)
            }
        }
    }
}

/// Places the window on audible material after a noise-gate pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonSilent;

#[async_trait]
impl StartStrategy for NonSilent {
    fn name(&self) -> &'static str {
        "silence"
    }

    async fn estimate(&self, engine: &dyn Engine, track: &Track, want: f64) -> Result<Option<f64>> {
        find_non_silent_start(engine, track, want).await.map(Some)
    }
}

/// Ordered chain of start strategies; the first usable answer wins.
pub struct StartEstimator {
    strategies: Vec<Box<dyn StartStrategy>>,
}

impl Default for StartEstimator {
    fn default() -> Self {
        Self::energy_first(default_analyzer())
    }
}

impl StartEstimator {
    pub fn new(strategies: Vec<Box<dyn StartStrategy>>) -> Self {
        Self { strategies }
    }

    /// Onset analysis with a silence-based fallback.
    pub fn energy_first(analyzer: Box<dyn OnsetAnalyzer>) -> Self {
        Self::new(vec![Box::new(EnergyPeak::new(analyzer)), Box::new(NonSilent)])
    }

    pub fn silence_only() -> Self {
        Self::new(vec![Box::new(NonSilent)])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Start offset in `[0, duration - want]`, or `0` when the track is too short.
    pub async fn estimate(&self, engine: &dyn Engine, track: &Track, want: f64) -> Result<f64> {
        if !(want > 0.0) {
            return Err(PackError::InvalidInput(format!(
                "window length must be positive, got {want}"
            )));
        }
        if want >= track.duration {
            return Ok(0.0);
        }

        for strategy in &self.strategies {
            if let Some(start) = strategy.estimate(engine, track, want).await? {
                debug!(
                    "{}: {} strategy chose {:.3}s",
                    track.path.display(),
                    strategy.name(),
                    start
                );
                return Ok(start);
            }
            debug!(
                "{}: {} strategy not applicable",
                track.path.display(),
                strategy.name()
            );
        }

        Err(PackError::InvalidInput(format!(
            "no start strategy produced an estimate for {}",
            track.path.display()
        )))
    }
}
