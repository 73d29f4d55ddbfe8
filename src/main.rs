use anyhow::{Context, Result};
use clap::Parser;
use packmaker::audio::StartEstimator;
use packmaker::engine::{check_ffmpeg, check_ffprobe};
use packmaker::{build_pack, print_summary, Config, FfmpegEngine};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "packmaker")]
#[command(version, about = "Build a crossfaded preview video and full mix for a sample pack")]
#[command(long_about = "Picks an eventful window in every track of the inbox, crossfades the windows into a numbered preview video and crossfades the whole tracks into one continuous mix.")]
struct Cli {
    /// Pack title, used as the output folder name
    title: String,

    /// Folder containing the source tracks
    #[arg(short, long)]
    inbox: Option<PathBuf>,

    /// Root folder for finished packs
    #[arg(short, long)]
    output_root: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Background clip for the preview video
    #[arg(long)]
    background: Option<PathBuf>,

    /// Seconds of each track in the preview
    #[arg(long)]
    preview_sec: Option<f64>,

    /// Preview video resolution, e.g. 1280x720
    #[arg(long)]
    resolution: Option<String>,

    /// Maximum preview size in megabytes
    #[arg(long, conflicts_with = "no_size_limit")]
    max_size_mb: Option<f64>,

    /// Copy the rendered video stream instead of fitting a size budget
    #[arg(long)]
    no_size_limit: bool,

    /// Encode the preview video at this bitrate (kbps)
    #[arg(long)]
    video_kbps: Option<u32>,

    /// Only use silence detection to place snippets
    #[arg(long)]
    silence_only: bool,

    /// Skip the MP3 copies of the source tracks
    #[arg(long)]
    skip_tracks: bool,

    /// Skip the full-length mix
    #[arg(long)]
    skip_mix: bool,

    /// Hide progress spinners
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(ref inbox) = self.inbox {
            config.inbox = inbox.clone();
        }
        if let Some(ref root) = self.output_root {
            config.output_root = root.clone();
        }
        if let Some(ref bg) = self.background {
            config.background = bg.clone();
        }
        if let Some(secs) = self.preview_sec {
            config.preview_per_track_sec = secs;
        }
        if let Some(ref res) = self.resolution {
            config.video_res = res.clone();
        }
        if let Some(mb) = self.max_size_mb {
            config.max_size_mb = Some(mb);
        }
        if self.no_size_limit {
            config.max_size_mb = None;
        }
        if let Some(kbps) = self.video_kbps {
            config.override_video_kbps = Some(kbps);
        }
        if self.skip_tracks {
            config.transcode_tracks = false;
        }
        if self.skip_mix {
            config.build_mix = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    check_ffmpeg().context("FFmpeg is required")?;
    check_ffprobe().context("FFprobe is required")?;

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Title:      {}", cli.title);
    info!("Inbox:      {}", config.inbox.display());
    info!("Output:     {}", config.output_root.display());
    info!("Preview:    {}s per track at {}", config.preview_per_track_sec, config.video_res);
    info!("Mux:        {}", config.mux_mode());

    let estimator = if cli.silence_only {
        StartEstimator::silence_only()
    } else {
        StartEstimator::default()
    };
    let engine = FfmpegEngine::new();

    let result = build_pack(&engine, &estimator, &config, &cli.title, !cli.no_progress)
        .await
        .context("Pack build failed")?;

    print_summary(&result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "packmaker",
            "Night Drive",
            "--preview-sec",
            "15",
            "--no-size-limit",
            "--skip-mix",
            "--resolution",
            "1920x1080",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(cli.title, "Night Drive");
        assert_eq!(config.preview_per_track_sec, 15.0);
        assert_eq!(config.max_size_mb, None);
        assert!(!config.build_mix);
        assert!(config.transcode_tracks);
        assert_eq!(config.video_res, "1920x1080");
    }

    #[test]
    fn test_size_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "packmaker",
            "Pack",
            "--max-size-mb",
            "50",
            "--no-size-limit",
        ]);
        assert!(parsed.is_err());
    }
}
