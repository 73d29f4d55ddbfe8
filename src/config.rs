use crate::error::{PackError, Result};
use crate::mux::MuxMode;
use crate::video::{RenderSettings, Resolution};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File looked up in the working directory before the user config dir.
pub const LOCAL_CONFIG_FILE: &str = "packmaker.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_root: PathBuf,
    pub inbox: PathBuf,
    pub background: PathBuf,
    pub video_res: String,
    pub fps: u32,
    pub preview_per_track_sec: f64,
    pub xfade_preview: f64,
    pub xfade_full: f64,
    pub preview_audio_kbps: u32,
    pub bitrate_mp3: String,
    pub max_size_mb: Option<f64>,
    pub override_video_kbps: Option<u32>,
    pub preview_crf: u32,
    pub preview_preset: String,
    pub font: Option<PathBuf>,
    pub threads: usize,
    pub filter_threads: usize,
    pub transcode_tracks: bool,
    pub build_mix: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("dist"),
            inbox: PathBuf::from("inbox"),
            background: PathBuf::from("assets/preview_bg/preview_bg.mp4"),
            video_res: "1280x720".to_string(),
            fps: 30,
            preview_per_track_sec: 10.0,
            xfade_preview: 0.5,
            xfade_full: 2.0,
            preview_audio_kbps: 192,
            bitrate_mp3: "320k".to_string(),
            max_size_mb: Some(100.0),
            override_video_kbps: None,
            preview_crf: 20,
            preview_preset: "veryfast".to_string(),
            font: None,
            threads: 4,
            filter_threads: 2,
            transcode_tracks: true,
            build_mix: true,
        }
    }
}

impl Config {
    /// Defaults, then a TOML file, then `PACKMAKER_*` environment variables.
    ///
    /// An explicit `path` must exist and parse; the implicit locations are
    /// skipped with a warning when broken.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::discover(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PackError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| PackError::Config(format!("Invalid {}: {e}", path.display())))
    }

    fn discover() -> Self {
        let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), Self::config_file_path()];
        for path in candidates.into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded configuration from {}", path.display());
                    return config;
                }
                Err(e) => warn!("Ignoring config file: {e}"),
            }
        }
        Self::default()
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("PACKMAKER_OUTPUT_ROOT") {
            self.output_root = PathBuf::from(root);
        }
        if let Some(res) = lookup("PACKMAKER_VIDEO_RES") {
            self.video_res = res;
        }
        if let Some(secs) = lookup("PACKMAKER_PREVIEW_SEC") {
            if let Ok(s) = secs.parse() {
                self.preview_per_track_sec = s;
            }
        }
        if let Some(mb) = lookup("PACKMAKER_MAX_SIZE_MB") {
            match mb.trim().to_lowercase().as_str() {
                "" | "none" | "unlimited" => self.max_size_mb = None,
                other => {
                    if let Ok(v) = other.parse() {
                        self.max_size_mb = Some(v);
                    }
                }
            }
        }
        if let Some(kbps) = lookup("PACKMAKER_VIDEO_KBPS") {
            if let Ok(k) = kbps.parse() {
                self.override_video_kbps = Some(k);
            }
        }
        if let Some(bg) = lookup("PACKMAKER_BACKGROUND") {
            self.background = PathBuf::from(bg);
        }
        if let Some(font) = lookup("PACKMAKER_FONT") {
            self.font = Some(PathBuf::from(font));
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.resolution()?;

        if self.fps == 0 {
            return Err(PackError::Config("fps must be greater than 0".to_string()));
        }
        if !(self.preview_per_track_sec > 0.0) {
            return Err(PackError::Config(
                "preview_per_track_sec must be greater than 0".to_string(),
            ));
        }
        if !(self.xfade_preview > 0.0 && self.xfade_preview < self.preview_per_track_sec) {
            return Err(PackError::Config(format!(
                "xfade_preview must be in (0, {})",
                self.preview_per_track_sec
            )));
        }
        if !(self.xfade_full > 0.0) {
            return Err(PackError::Config(
                "xfade_full must be greater than 0".to_string(),
            ));
        }
        if let Some(mb) = self.max_size_mb {
            if !(mb > 0.0) {
                return Err(PackError::Config(
                    "max_size_mb must be greater than 0".to_string(),
                ));
            }
        }
        if self.threads == 0 || self.filter_threads == 0 {
            return Err(PackError::Config(
                "thread counts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn resolution(&self) -> Result<Resolution> {
        self.video_res.parse().map_err(PackError::Config)
    }

    pub fn render_settings(&self) -> Result<RenderSettings> {
        Ok(RenderSettings {
            resolution: self.resolution()?,
            fps: self.fps,
            crf: self.preview_crf,
            preset: self.preview_preset.clone(),
        })
    }

    /// Override beats a size budget; no budget means stream copy.
    pub fn mux_mode(&self) -> MuxMode {
        match (self.override_video_kbps, self.max_size_mb) {
            (Some(video_kbps), _) if video_kbps > 0 => MuxMode::Override { video_kbps },
            (_, Some(max_size_mb)) => MuxMode::SizeBudget { max_size_mb },
            (_, None) => MuxMode::Unconstrained,
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("packmaker").join("config.toml"))
    }
}
