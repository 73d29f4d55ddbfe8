//! Onset-strength analysis.
//!
//! The analyzer is an optional capability: builds without the `onset`
//! feature only ship [`Unavailable`], and every failure is an
//! [`AnalysisError`] that callers downgrade to a silence-based estimate.

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::Engine;

use super::Track;

/// Sample rate tracks are decoded to before analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Samples between successive envelope frames.
pub const HOP_SIZE: usize = 512;

/// FFT length per analysis frame.
pub const FFT_SIZE: usize = 2048;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("onset analysis is not available in this build")]
    Unavailable,

    #[error("could not decode track for analysis: {0}")]
    Decode(String),

    #[error("decoded signal is empty")]
    EmptySignal,

    #[error("envelope has {frames} frames, window needs {window}")]
    TooShort { frames: usize, window: usize },
}

/// Per-frame onset strength at a fixed hop.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    /// Seconds between consecutive frames.
    pub frame_secs: f64,
}

impl OnsetEnvelope {
    pub fn new(values: Vec<f32>, sample_rate: u32, hop: usize) -> Self {
        Self {
            values,
            frame_secs: hop as f64 / sample_rate as f64,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Produces an onset envelope for a track.
#[async_trait]
pub trait OnsetAnalyzer: Send + Sync {
    async fn envelope(
        &self,
        engine: &dyn Engine,
        track: &Track,
    ) -> std::result::Result<OnsetEnvelope, AnalysisError>;
}

/// Stand-in used when no analysis backend is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl OnsetAnalyzer for Unavailable {
    async fn envelope(
        &self,
        _engine: &dyn Engine,
        _track: &Track,
    ) -> std::result::Result<OnsetEnvelope, AnalysisError> {
        Err(AnalysisError::Unavailable)
    }
}

/// The best analyzer this build provides.
pub fn default_analyzer() -> Box<dyn OnsetAnalyzer> {
    #[cfg(feature = "onset")]
    {
        Box::new(flux::SpectralFlux::default())
    }
    #[cfg(not(feature = "onset"))]
    {
        Box::new(Unavailable)
    }
}

#[cfg(feature = "onset")]
pub use flux::{onset_strength, SpectralFlux};

#[cfg(feature = "onset")]
mod flux {
    use std::path::Path;

    use async_trait::async_trait;
    use hound::WavReader;
    use realfft::RealFftPlanner;
    use tracing::debug;

    use crate::argv;
    use crate::engine::{path_arg, Engine};

    use super::{AnalysisError, OnsetAnalyzer, OnsetEnvelope, Track};
    use super::{ANALYSIS_SAMPLE_RATE, FFT_SIZE, HOP_SIZE};

    /// Spectral-flux onset detector over log-magnitude spectra.
    #[derive(Debug, Clone)]
    pub struct SpectralFlux {
        pub sample_rate: u32,
        pub hop: usize,
        pub fft_size: usize,
    }

    impl Default for SpectralFlux {
        fn default() -> Self {
            Self {
                sample_rate: ANALYSIS_SAMPLE_RATE,
                hop: HOP_SIZE,
                fft_size: FFT_SIZE,
            }
        }
    }

    impl SpectralFlux {
        async fn decode(
            &self,
            engine: &dyn Engine,
            source: &Path,
            wav: &Path,
        ) -> Result<Vec<f32>, AnalysisError> {
            let args = argv![
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                path_arg(source),
                "-vn",
                "-sn",
                "-dn",
                "-ac",
                1,
                "-ar",
                self.sample_rate,
                "-c:a",
                "pcm_s16le",
                path_arg(wav),
            ];
            engine
                .ffmpeg(&args)
                .await
                .map_err(|e| AnalysisError::Decode(e.to_string()))?;

            let reader = WavReader::open(wav)
                .map_err(|e| AnalysisError::Decode(format!("Failed to open WAV file: {e}")))?;
            let spec = reader.spec();
            let samples: Vec<f32> = match spec.sample_format {
                hound::SampleFormat::Int => reader
                    .into_samples::<i16>()
                    .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                    .collect::<Result<_, _>>(),
                hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>(),
            }
            .map_err(|e| AnalysisError::Decode(e.to_string()))?;

            Ok(samples)
        }
    }

    #[async_trait]
    impl OnsetAnalyzer for SpectralFlux {
        async fn envelope(
            &self,
            engine: &dyn Engine,
            track: &Track,
        ) -> Result<OnsetEnvelope, AnalysisError> {
            let scratch = tempfile::Builder::new()
                .prefix("_onset_")
                .tempdir()
                .map_err(|e| AnalysisError::Decode(e.to_string()))?;
            let wav = scratch.path().join("mono.wav");

            let samples = self.decode(engine, &track.path, &wav).await?;
            if samples.is_empty() {
                return Err(AnalysisError::EmptySignal);
            }

            let values = onset_strength(&samples, self.fft_size, self.hop)?;
            debug!(
                "{}: {} samples -> {} onset frames",
                track.path.display(),
                samples.len(),
                values.len()
            );
            Ok(OnsetEnvelope::new(values, self.sample_rate, self.hop))
        }
    }

    /// Half-wave rectified spectral flux, one value per hop.
    ///
    /// Frames are centred on `i * hop` with zero padding at both ends, so the
    /// envelope has `samples.len() / hop` entries.
    pub fn onset_strength(
        samples: &[f32],
        fft_size: usize,
        hop: usize,
    ) -> Result<Vec<f32>, AnalysisError> {
        if hop == 0 || fft_size < 2 {
            return Err(AnalysisError::Decode(format!(
                "bad analysis geometry: fft {fft_size}, hop {hop}"
            )));
        }
        let frames = samples.len() / hop;
        if frames == 0 {
            return Ok(Vec::new());
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        let half = (fft_size / 2) as isize;
        let mut previous: Option<Vec<f32>> = None;
        let mut envelope = Vec::with_capacity(frames);

        for frame in 0..frames {
            let centre = (frame * hop) as isize;
            for (k, slot) in input.iter_mut().enumerate() {
                let idx = centre - half + k as isize;
                *slot = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize] * window[k]
                } else {
                    0.0
                };
            }

            fft.process(&mut input, &mut spectrum)
                .map_err(|e| AnalysisError::Decode(e.to_string()))?;

            let magnitudes: Vec<f32> = spectrum.iter().map(|c| c.norm().ln_1p()).collect();
            let flux = match &previous {
                Some(prev) => {
                    magnitudes
                        .iter()
                        .zip(prev)
                        .map(|(m, p)| (m - p).max(0.0))
                        .sum::<f32>()
                        / magnitudes.len() as f32
                }
                None => 0.0,
            };
            envelope.push(flux);
            previous = Some(magnitudes);
        }

        Ok(envelope)
    }
}
