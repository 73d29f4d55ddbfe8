//! Background resolution and preview video rendering.
//!
//! Sources are tried in order: loop the background clip, concatenate it
//! explicitly, then a solid colour. Every source is trimmed to the exact
//! timeline duration and rendered at a fixed frame rate.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::argv;
use crate::engine::{path_arg, Engine};
use crate::error::{PackError, Result};

use super::overlay::build_filter_chain;
use super::timeline::PreviewTimeline;
use super::Resolution;

/// Encoder settings for the preview video.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub resolution: Resolution,
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: 30,
            crf: 20,
            preset: "veryfast".to_string(),
        }
    }
}

/// Where the preview's moving picture comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSource {
    /// Loop the background clip indefinitely.
    Loop,
    /// Repeat the background clip through a concat list.
    Concat,
    /// Generate a black frame source.
    SolidColor,
}

impl fmt::Display for BackgroundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundSource::Loop => write!(f, "loop"),
            BackgroundSource::Concat => write!(f, "concat"),
            BackgroundSource::SolidColor => write!(f, "solid color"),
        }
    }
}

impl BackgroundSource {
    pub const CHAIN: [BackgroundSource; 3] = [
        BackgroundSource::Loop,
        BackgroundSource::Concat,
        BackgroundSource::SolidColor,
    ];

    /// Input arguments for this source, or `None` when it does not apply.
    async fn input_args(
        &self,
        engine: &dyn Engine,
        background: Option<&Path>,
        total: f64,
        settings: &RenderSettings,
        work_dir: &Path,
    ) -> Result<Option<Vec<String>>> {
        match self {
            BackgroundSource::Loop => Ok(background.map(|bg| argv!["-stream_loop", -1, "-i", path_arg(bg)])),
            BackgroundSource::Concat => {
                let Some(bg) = background else {
                    return Ok(None);
                };
                let clip_len = engine.probe_duration(bg).await?.max(0.001);
                let list = write_concat_list(bg, clip_len, total, work_dir)?;
                Ok(Some(argv!["-f", "concat", "-safe", 0, "-i", path_arg(&list)]))
            }
            BackgroundSource::SolidColor => Ok(Some(argv![
                "-f",
                "lavfi",
                "-i",
                format!(
                    "color=c=black:s={}:r={}:d={}",
                    settings.resolution, settings.fps, total
                ),
            ])),
        }
    }
}

/// Number of list entries needed so the concatenation outlasts `total`.
pub fn concat_repetitions(clip_len: f64, total: f64) -> usize {
    (total / clip_len.max(0.001)).floor() as usize + 2
}

fn write_concat_list(bg: &Path, clip_len: f64, total: f64, work_dir: &Path) -> Result<PathBuf> {
    let reps = concat_repetitions(clip_len, total);
    let entry = path_arg(bg).replace('\\', "/").replace('\'', "'\\''");
    let body: String = (0..reps).map(|_| format!("file '{entry}'\n")).collect();

    let list = work_dir.join("bg_concat.txt");
    fs::write(&list, body)?;
    debug!("Concat list {} with {} entries", list.display(), reps);
    Ok(list)
}

fn render_args(
    input: Vec<String>,
    filter_chain: &str,
    total: f64,
    settings: &RenderSettings,
    out: &Path,
) -> Vec<String> {
    let mut args = argv!["-y", "-hide_banner", "-loglevel", "warning"];
    args.extend(input);
    args.extend(argv![
        "-filter_complex",
        filter_chain,
        "-map",
        "[out]",
        "-t",
        total,
        "-r",
        settings.fps,
        "-filter_threads",
        1,
        "-filter_complex_threads",
        1,
        "-c:v",
        "libx264",
        "-preset",
        settings.preset,
        "-crf",
        settings.crf,
        "-pix_fmt",
        "yuv420p",
        "-threads",
        2,
        "-max_muxing_queue_size",
        1024,
        path_arg(out),
    ]);
    args
}

/// The rendered background+overlay clip.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub source: BackgroundSource,
    pub duration: f64,
}

/// Render the numbered preview video into `work_dir`.
///
/// Failures of the loop and concat sources fall through to the next
/// source; a failing solid-colour render is fatal.
pub async fn render_preview_video(
    engine: &dyn Engine,
    background: Option<&Path>,
    timeline: &PreviewTimeline,
    settings: &RenderSettings,
    font: &str,
    work_dir: &Path,
) -> Result<RenderedVideo> {
    fs::create_dir_all(work_dir)?;
    let out = work_dir.join("preview_video_full.mp4");
    let total = timeline.total_duration();
    let filter_chain = build_filter_chain(settings.resolution, &timeline.slots(), font);
    let background = background.filter(|bg| bg.is_file());

    info!(
        "Rendering {:.2}s preview video at {} {}fps",
        total, settings.resolution, settings.fps
    );

    for source in BackgroundSource::CHAIN {
        let attempt = async {
            let Some(input) = source
                .input_args(engine, background, total, settings, work_dir)
                .await?
            else {
                return Ok(false);
            };
            engine
                .ffmpeg(&render_args(input, &filter_chain, total, settings, &out))
                .await?;
            Ok::<bool, PackError>(true)
        };

        match attempt.await {
            Ok(true) => {
                info!("Preview video rendered from {source} background");
                return Ok(RenderedVideo {
                    path: out,
                    source,
                    duration: total,
                });
            }
            Ok(false) => debug!("{source} background not applicable"),
            Err(e) if source != BackgroundSource::SolidColor => {
                warn!("{source} background failed, trying next: {e}");
            }
            Err(e) => return Err(e),
        }
    }

    Err(PackError::InvalidInput(
        "no background source could be rendered".to_string(),
    ))
}
