//! Final preview mux under a bitrate or file-size constraint.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::argv;
use crate::engine::{path_arg, Engine};
use crate::error::Result;

/// Lowest video bitrate the planner will ask for.
pub const MIN_VIDEO_KBPS: u32 = 200;

/// Upper bound for any sane preview.
pub const SOFT_CAP_KBPS: u32 = 100_000;

/// Largest value the encoder accepts (i32 bits per second, in kbps).
pub const HARD_CAP_KBPS: u32 = 2_147_483;

/// Share of the byte budget reserved for container overhead.
pub const CONTAINER_OVERHEAD: f64 = 0.02;

/// How the caller wants the preview muxed. Exactly one mode applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MuxMode {
    /// Encode video at this bitrate.
    Override { video_kbps: u32 },
    /// Copy the video stream untouched.
    Unconstrained,
    /// Derive the video bitrate from a maximum file size.
    SizeBudget { max_size_mb: f64 },
}

impl fmt::Display for MuxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxMode::Override { video_kbps } => write!(f, "override ({video_kbps} kbps)"),
            MuxMode::Unconstrained => write!(f, "stream copy"),
            MuxMode::SizeBudget { max_size_mb } => write!(f, "size budget ({max_size_mb} MB)"),
        }
    }
}

/// Clamp a requested bitrate into `[MIN_VIDEO_KBPS, min(SOFT_CAP_KBPS, HARD_CAP_KBPS)]`.
pub fn clamp_video_kbps(kbps: i64) -> u32 {
    let ceiling = SOFT_CAP_KBPS.min(HARD_CAP_KBPS) as i64;
    kbps.min(ceiling).max(MIN_VIDEO_KBPS as i64) as u32
}

/// Inputs for deriving a video bitrate from a size limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateBudget {
    /// `None` means no size limit.
    pub max_bytes: Option<u64>,
    pub audio_bitrate_bps: u64,
    pub overhead_fraction: f64,
    pub total_duration: f64,
}

impl BitrateBudget {
    pub fn from_megabytes(max_size_mb: f64, audio_kbps: u32, total_duration: f64) -> Self {
        Self {
            max_bytes: Some((max_size_mb.max(0.0) * 1024.0 * 1024.0) as u64),
            audio_bitrate_bps: audio_kbps as u64 * 1000,
            overhead_fraction: CONTAINER_OVERHEAD,
            total_duration,
        }
    }

    /// Unclamped video bitrate in kbps; may be tiny when audio eats the budget.
    fn raw_video_kbps(&self) -> i64 {
        let Some(max_bytes) = self.max_bytes else {
            return SOFT_CAP_KBPS as i64;
        };
        let budget_bits = max_bytes as f64 * 8.0;
        let audio_bits = (self.audio_bitrate_bps as f64 * self.total_duration.max(0.001)).floor();
        let overhead_bits = (budget_bits * self.overhead_fraction).floor();
        let video_bits = (budget_bits - audio_bits - overhead_bits).max(1.0);

        let seconds = self.total_duration.max(0.001);
        (video_bits / seconds / 1000.0).floor() as i64
    }

    /// Video bitrate in kbps after clamping.
    pub fn video_kbps(&self) -> u32 {
        clamp_video_kbps(self.raw_video_kbps())
    }

    pub fn video_bitrate_bps(&self) -> u64 {
        self.video_kbps() as u64 * 1000
    }

    /// True when the budget could not even afford the minimum bitrate.
    pub fn is_floored(&self) -> bool {
        self.raw_video_kbps() < MIN_VIDEO_KBPS as i64
    }
}

/// What happens to the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPlan {
    Copy,
    Encode { kbps: u32 },
}

/// Resolved mux job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxPlan {
    pub video: VideoPlan,
    pub audio_kbps: u32,
}

impl MuxPlan {
    pub fn args(&self, video: &Path, audio: &Path, out: &Path) -> Vec<String> {
        let mut args = argv![
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            path_arg(video),
            "-i",
            path_arg(audio),
            "-map",
            "0:v",
            "-map",
            "1:a",
        ];
        match self.video {
            VideoPlan::Copy => args.extend(argv!["-c:v", "copy"]),
            VideoPlan::Encode { kbps } => args.extend(argv![
                "-c:v",
                "libx264",
                "-b:v",
                format!("{kbps}k"),
                "-maxrate",
                format!("{kbps}k"),
                "-bufsize",
                format!("{}k", kbps as u64 * 2),
            ]),
        }
        args.extend(argv![
            "-c:a",
            "aac",
            "-b:a",
            format!("{}k", self.audio_kbps),
            "-movflags",
            "+faststart",
            "-shortest",
            path_arg(out),
        ]);
        args
    }
}

/// Turn the caller's mode into concrete stream settings.
pub fn plan_mux(mode: MuxMode, total_duration: f64, audio_kbps: u32) -> MuxPlan {
    let video = match mode {
        MuxMode::Override { video_kbps } => VideoPlan::Encode {
            kbps: clamp_video_kbps(video_kbps as i64),
        },
        MuxMode::Unconstrained => VideoPlan::Copy,
        MuxMode::SizeBudget { max_size_mb } => {
            let budget = BitrateBudget::from_megabytes(max_size_mb, audio_kbps, total_duration);
            if budget.is_floored() {
                warn!(
                    "{max_size_mb} MB cannot fit {total_duration:.1}s at {audio_kbps} kbps audio; \
                     video clamped to {MIN_VIDEO_KBPS} kbps and the file will exceed the limit"
                );
            }
            VideoPlan::Encode {
                kbps: budget.video_kbps(),
            }
        }
    };
    MuxPlan { video, audio_kbps }
}

/// Mux `video` and `audio` into `out`, trimmed to the shorter stream.
pub async fn mux_preview(
    engine: &dyn Engine,
    video: &Path,
    audio: &Path,
    out: &Path,
    total_duration: f64,
    mode: MuxMode,
    audio_kbps: u32,
) -> Result<MuxPlan> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let plan = plan_mux(mode, total_duration, audio_kbps);
    info!("Muxing preview with {mode}: {:?}", plan.video);
    engine.ffmpeg(&plan.args(video, audio, out)).await?;
    Ok(plan)
}
