use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::argv;
use crate::engine::{path_arg, Engine};
use crate::error::{PackError, Result};

/// Encoding parameters for a crossfade run.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadeOptions {
    /// Overlap between neighbouring clips, in seconds.
    pub duration: f64,
    /// Codec of the final output.
    pub codec: String,
    pub bitrate: String,
    /// Lossless codec for the per-fold intermediates.
    pub intermediate_codec: String,
    pub sample_rate: u32,
    pub threads: usize,
    pub filter_threads: usize,
}

impl Default for CrossfadeOptions {
    fn default() -> Self {
        Self {
            duration: 0.8,
            codec: "aac".to_string(),
            bitrate: "192k".to_string(),
            intermediate_codec: "pcm_s16le".to_string(),
            sample_rate: 44_100,
            threads: 4,
            filter_threads: 2,
        }
    }
}

impl CrossfadeOptions {
    /// Short AAC transitions between preview snippets.
    pub fn preview(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Long MP3 transitions between whole tracks.
    pub fn full_mix(duration: f64, bitrate: impl Into<String>) -> Self {
        Self {
            duration,
            codec: "libmp3lame".to_string(),
            bitrate: bitrate.into(),
            ..Self::default()
        }
    }

    fn crossfade_graph(&self) -> String {
        let sr = self.sample_rate;
        format!(
            "[0:a]aformat=sample_rates={sr}:channel_layouts=stereo,aresample={sr}[a0];\
             [1:a]aformat=sample_rates={sr}:channel_layouts=stereo,aresample={sr}[a1];\
             [a0][a1]acrossfade=d={}:c1=tri:c2=tri[aout]",
            self.duration
        )
    }

    fn transition_args(&self, left: &Path, right: &Path, out: &Path) -> Vec<String> {
        argv![
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            path_arg(left),
            "-i",
            path_arg(right),
            "-filter_complex_threads",
            self.filter_threads,
            "-filter_complex",
            self.crossfade_graph(),
            "-map",
            "[aout]",
            "-vn",
            "-sn",
            "-dn",
            "-c:a",
            self.intermediate_codec,
            "-threads",
            self.threads,
            path_arg(out),
        ]
    }

    fn encode_args(&self, input: &Path, out: &Path) -> Vec<String> {
        argv![
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            path_arg(input),
            "-vn",
            "-sn",
            "-dn",
            "-c:a",
            self.codec,
            "-b:a",
            self.bitrate,
            "-threads",
            self.threads,
            path_arg(out),
        ]
    }
}

/// Crossfade `clips` in order into a single file at `out`.
///
/// Folds left to right: each transition takes the previous result as its
/// left input, so `N` clips cost `N - 1` transitions plus one final encode.
/// Intermediates live in a scratch directory that is removed on every exit.
pub async fn crossfade_sequence(
    engine: &dyn Engine,
    clips: &[PathBuf],
    out: &Path,
    options: &CrossfadeOptions,
) -> Result<()> {
    let Some((first, rest)) = clips.split_first() else {
        return Err(PackError::InvalidInput("No files to crossfade".to_string()));
    };

    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if rest.is_empty() {
        debug!("Single clip, encoding {} directly", first.display());
        engine.ffmpeg(&options.encode_args(first, out)).await?;
        return Ok(());
    }

    if !(options.duration > 0.0) {
        return Err(PackError::InvalidInput(format!(
            "crossfade duration must be positive, got {}",
            options.duration
        )));
    }

    let scratch = tempfile::Builder::new().prefix("_xf_").tempdir()?;
    info!(
        "Crossfading {} clips ({}s transitions) into {}",
        clips.len(),
        options.duration,
        out.display()
    );

    let mut current = first.clone();
    for (idx, next) in rest.iter().enumerate() {
        let mid = scratch.path().join(format!("xf_{:02}.wav", idx + 1));
        debug!("Fold {}: {} + {}", idx + 1, current.display(), next.display());
        engine
            .ffmpeg(&options.transition_args(&current, next, &mid))
            .await?;
        current = mid;
    }

    engine.ffmpeg(&options.encode_args(&current, out)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let preview = CrossfadeOptions::preview(0.5);
        assert_eq!(preview.codec, "aac");
        assert_eq!(preview.bitrate, "192k");
        assert_eq!(preview.duration, 0.5);

        let mix = CrossfadeOptions::full_mix(2.0, "320k");
        assert_eq!(mix.codec, "libmp3lame");
        assert_eq!(mix.bitrate, "320k");
        assert_eq!(mix.intermediate_codec, "pcm_s16le");
    }

    #[test]
    fn test_crossfade_graph() {
        let graph = CrossfadeOptions::preview(0.5).crossfade_graph();
        assert_eq!(
            graph,
            "[0:a]aformat=sample_rates=44100:channel_layouts=stereo,aresample=44100[a0];\
             [1:a]aformat=sample_rates=44100:channel_layouts=stereo,aresample=44100[a1];\
             [a0][a1]acrossfade=d=0.5:c1=tri:c2=tri[aout]"
        );
    }

    #[test]
    fn test_transition_writes_lossless_intermediate() {
        let opts = CrossfadeOptions::full_mix(2.0, "320k");
        let args = opts.transition_args(Path::new("a.wav"), Path::new("b.wav"), Path::new("m.wav"));
        let codec_at = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[codec_at + 1], "pcm_s16le");
        assert_eq!(args.last().unwrap(), "m.wav");
        assert!(args.contains(&"[aout]".to_string()));
    }
}
