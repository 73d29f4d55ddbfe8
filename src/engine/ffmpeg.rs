use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PackError, Result};

use super::{Engine, EngineOutput};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg")
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe")
}

fn check_tool(tool: &'static str) -> Result<()> {
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .map_err(|source| PackError::EngineUnavailable { tool, source })?;

    if !output.status.success() {
        return Err(PackError::EngineFailure {
            tool,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    debug!("{tool} is available");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse the JSON written by `ffprobe -show_entries format=duration -of json`.
pub fn parse_probe_duration(json: &str) -> Result<f64> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let raw = probe
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| PackError::Probe("container reports no duration".to_string()))?;

    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|e| PackError::Probe(format!("Failed to parse duration '{}': {e}", raw.trim())))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(PackError::Probe(format!("Nonsensical duration {secs}")));
    }
    Ok(secs)
}

/// Runs the `ffmpeg`/`ffprobe` binaries found on PATH.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit binaries instead of whatever is on PATH.
    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    async fn ffmpeg(&self, args: &[String]) -> Result<EngineOutput> {
        debug!("> ffmpeg {}", args.join(" "));

        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(args)
            .output()
            .await
            .map_err(|source| PackError::EngineUnavailable {
                tool: "ffmpeg",
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(PackError::EngineFailure {
                tool: "ffmpeg",
                code: output.status.code(),
                stderr,
            });
        }

        Ok(EngineOutput { stderr })
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        if !path.exists() {
            return Err(PackError::FileNotFound(path.display().to_string()));
        }

        let output = tokio::process::Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(path)
            .output()
            .await
            .map_err(|source| PackError::EngineUnavailable {
                tool: "ffprobe",
                source,
            })?;

        if !output.status.success() {
            return Err(PackError::EngineFailure {
                tool: "ffprobe",
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let duration = parse_probe_duration(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Probed {}: {:.3}s", path.display(), duration);
        Ok(duration)
    }
}
