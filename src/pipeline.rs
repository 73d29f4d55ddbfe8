use crate::argv;
use crate::audio::{
    build_snippets, crossfade_sequence, CrossfadeOptions, Snippet, StartEstimator, Track,
};
use crate::config::Config;
use crate::engine::{path_arg, Engine};
use crate::error::{PackError, Result};
use crate::mux::{mux_preview, MuxPlan};
use crate::video::{default_font, render_preview_video, BackgroundSource, PreviewTimeline};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Source extensions picked up from the inbox.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "m4a", "aac", "ogg"];

/// Timings and counts from one run.
#[derive(Debug, Clone)]
pub struct PackStats {
    pub total_time: Duration,
    /// Probing, start estimation and snippet cutting.
    pub analysis_time: Duration,
    /// Preview audio, video render and mux.
    pub preview_time: Duration,
    pub mix_time: Duration,
    pub track_count: usize,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PackResult {
    pub pack_dir: PathBuf,
    pub preview_path: PathBuf,
    pub mix_path: Option<PathBuf>,
    pub transcoded: Vec<PathBuf>,
    pub snippets: Vec<Snippet>,
    pub timeline: PreviewTimeline,
    pub background: BackgroundSource,
    pub mux: MuxPlan,
    pub stats: PackStats,
}

/// Working directory for one run, removed when dropped.
struct WorkDir {
    dir: Option<TempDir>,
    path: PathBuf,
    finished: bool,
}

impl WorkDir {
    fn create(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("_tmp").tempdir_in(parent)?;
        let path = dir.path().to_path_buf();
        debug!("Using working directory: {:?}", path);
        Ok(Self {
            dir: Some(dir),
            path,
            finished: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.finished {
                debug!("Cleaning up working directory: {:?}", self.path);
            } else {
                warn!("Run aborted, cleaning up working directory: {:?}", self.path);
            }
            if let Err(e) = dir.close() {
                warn!("Could not remove {:?}: {}", self.path, e);
            }
        }
    }
}

/// Keep letters, digits, spaces, dashes and underscores.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_audio(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_audio(&path, found)?;
        } else if path.is_file() && is_audio_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Audio files under `inbox`, ordered by case-insensitive relative path.
pub fn discover_tracks(inbox: &Path) -> Result<Vec<PathBuf>> {
    if !inbox.is_dir() {
        return Err(PackError::FileNotFound(inbox.display().to_string()));
    }

    let mut found = Vec::new();
    collect_audio(inbox, &mut found)?;
    found.sort_by_cached_key(|p| {
        p.strip_prefix(inbox)
            .unwrap_or(p)
            .to_string_lossy()
            .to_lowercase()
    });

    if found.is_empty() {
        return Err(PackError::InvalidInput(format!(
            "No input audio files found in {}",
            inbox.display()
        )));
    }
    Ok(found)
}

/// Re-encode each source to MP3 under `tracks_dir`, mirroring the inbox tree.
async fn transcode_tracks(
    engine: &dyn Engine,
    sources: &[PathBuf],
    inbox: &Path,
    tracks_dir: &Path,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let mut used: HashSet<PathBuf> = HashSet::new();
    let mut outputs = Vec::with_capacity(sources.len());

    for src in sources {
        let rel_parent = src
            .parent()
            .and_then(|p| p.strip_prefix(inbox).ok())
            .unwrap_or_else(|| Path::new(""));
        let out_parent = tracks_dir.join(rel_parent);
        fs::create_dir_all(&out_parent)?;

        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        let mut dest = out_parent.join(format!("{stem}.mp3"));
        let mut n = 2;
        while !used.insert(dest.clone()) {
            dest = out_parent.join(format!("{stem}_{n}.mp3"));
            n += 1;
        }

        let args = argv![
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            path_arg(src),
            "-vn",
            "-sn",
            "-dn",
            "-c:a",
            "libmp3lame",
            "-b:a",
            config.bitrate_mp3,
            "-threads",
            config.threads,
            path_arg(&dest),
        ];
        engine.ffmpeg(&args).await?;
        outputs.push(dest);
    }

    Ok(outputs)
}

fn stage_spinner(progress: Option<&MultiProgress>, message: &str) -> Option<ProgressBar> {
    progress.map(|mp| {
        let pb = mp.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    })
}

fn finish_spinner(pb: Option<ProgressBar>, message: String) {
    if let Some(pb) = pb {
        pb.finish_with_message(message);
    }
}

/// Build a pack from the tracks in `config.inbox`.
///
/// Produces `<output_root>/<title>/preview/preview.mp4` and, when enabled,
/// `mix/mix.mp3` and `tracks_mp3/`. Intermediates go to a working directory
/// inside the pack that is removed whether or not the run succeeds.
pub async fn build_pack(
    engine: &dyn Engine,
    estimator: &StartEstimator,
    config: &Config,
    title: &str,
    show_progress: bool,
) -> Result<PackResult> {
    let start_time = Instant::now();
    config.validate()?;

    let name = sanitize_title(title);
    if name.is_empty() {
        return Err(PackError::InvalidInput("Pack title is required".to_string()));
    }

    let sources = discover_tracks(&config.inbox)?;
    info!("Found {} tracks in {}", sources.len(), config.inbox.display());

    let pack_dir = config.output_root.join(&name);
    let preview_dir = pack_dir.join("preview");
    let mix_dir = pack_dir.join("mix");
    for dir in [&pack_dir, &preview_dir, &mix_dir] {
        fs::create_dir_all(dir)?;
    }

    let work = WorkDir::create(&pack_dir)?;
    let multi_progress = show_progress.then(MultiProgress::new);

    // Stage 1: probe, transcode, estimate starts, cut snippets
    info!("Stage 1/3: Analysing {} tracks", sources.len());
    let analysis_start = Instant::now();
    let pb = stage_spinner(multi_progress.as_ref(), "Analysing tracks...");

    let mut tracks = Vec::with_capacity(sources.len());
    for src in &sources {
        tracks.push(Track::probe(engine, src).await?);
    }

    let transcoded = if config.transcode_tracks {
        let tracks_dir = pack_dir.join("tracks_mp3");
        transcode_tracks(engine, &sources, &config.inbox, &tracks_dir, config).await?
    } else {
        Vec::new()
    };

    let snippets = build_snippets(
        engine,
        estimator,
        &tracks,
        &work.path().join("snips"),
        config.preview_per_track_sec,
    )
    .await?;

    finish_spinner(pb, format!("✓ Cut {} snippets", snippets.len()));
    let analysis_time = analysis_start.elapsed();

    // Stage 2: preview audio, video, mux
    info!("Stage 2/3: Building preview");
    let preview_start = Instant::now();
    let pb = stage_spinner(multi_progress.as_ref(), "Rendering preview...");

    let preview_audio = work.path().join("preview_audio.m4a");
    let snippet_paths: Vec<PathBuf> = snippets.iter().map(|s| s.path.clone()).collect();
    let preview_xfade = CrossfadeOptions {
        threads: config.threads,
        filter_threads: config.filter_threads,
        bitrate: format!("{}k", config.preview_audio_kbps),
        ..CrossfadeOptions::preview(config.xfade_preview)
    };
    crossfade_sequence(engine, &snippet_paths, &preview_audio, &preview_xfade).await?;

    let timeline = PreviewTimeline::new(
        snippets.len(),
        config.preview_per_track_sec,
        config.xfade_preview,
    )?;
    let font = config
        .font
        .as_ref()
        .map(|f| f.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(default_font);
    let rendered = render_preview_video(
        engine,
        Some(config.background.as_path()),
        &timeline,
        &config.render_settings()?,
        &font,
        work.path(),
    )
    .await?;

    let preview_path = preview_dir.join("preview.mp4");
    let mux = mux_preview(
        engine,
        &rendered.path,
        &preview_audio,
        &preview_path,
        timeline.total_duration(),
        config.mux_mode(),
        config.preview_audio_kbps,
    )
    .await?;

    finish_spinner(
        pb,
        format!("✓ Preview rendered ({:.1}s)", timeline.total_duration()),
    );
    let preview_time = preview_start.elapsed();

    // Stage 3: full mix
    let mix_start = Instant::now();
    let mix_path = if config.build_mix {
        info!("Stage 3/3: Crossfading full mix");
        let pb = stage_spinner(multi_progress.as_ref(), "Crossfading full mix...");
        let mix_path = mix_dir.join("mix.mp3");
        let mix_xfade = CrossfadeOptions {
            threads: config.threads,
            filter_threads: config.filter_threads,
            ..CrossfadeOptions::full_mix(config.xfade_full, config.bitrate_mp3.clone())
        };
        crossfade_sequence(engine, &sources, &mix_path, &mix_xfade).await?;
        finish_spinner(pb, "✓ Full mix written".to_string());
        Some(mix_path)
    } else {
        info!("Stage 3/3: Full mix disabled");
        None
    };
    let mix_time = mix_start.elapsed();

    work.finish();

    Ok(PackResult {
        pack_dir,
        preview_path,
        mix_path,
        transcoded,
        snippets,
        timeline,
        background: rendered.source,
        mux,
        stats: PackStats {
            total_time: start_time.elapsed(),
            analysis_time,
            preview_time,
            mix_time,
            track_count: tracks.len(),
        },
    })
}

/// Print a summary of the pack.
pub fn print_summary(result: &PackResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                         Pack Ready                            ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Pack:       {}", result.pack_dir.display());
    println!("  Preview:    {}", result.preview_path.display());
    if let Some(ref mix) = result.mix_path {
        println!("  Mix:        {}", mix.display());
    }
    println!("  Tracks:     {}", result.stats.track_count);
    println!(
        "  Duration:   {:.2}s preview, {} background",
        result.timeline.total_duration(),
        result.background
    );
    println!("  Video:      {:?}", result.mux.video);
    println!();
    println!("  Snippets:");
    for (i, snip) in result.snippets.iter().enumerate() {
        println!(
            "    {:02}  {:>8.2}s  {}",
            i + 1,
            snip.start,
            snip.source.display()
        );
    }
    println!();
    println!("  Timing:");
    println!(
        "    Analyse:   {:.2}s",
        result.stats.analysis_time.as_secs_f64()
    );
    println!(
        "    Preview:   {:.2}s",
        result.stats.preview_time.as_secs_f64()
    );
    println!("    Mix:       {:.2}s", result.stats.mix_time.as_secs_f64());
    println!(
        "    Total:     {:.2}s",
        result.stats.total_time.as_secs_f64()
    );
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("  Lo-Fi Beats: Vol/2 "), "Lo-Fi Beats Vol2");
        assert_eq!(sanitize_title("***"), "");
        assert_eq!(sanitize_title("drum_kit"), "drum_kit");
    }

    #[test]
    fn test_discover_tracks_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path();
        fs::create_dir_all(inbox.join("B")).unwrap();
        fs::create_dir_all(inbox.join("a")).unwrap();
        for name in ["B/two.WAV", "a/one.mp3", "zeta.flac", "notes.txt", "a/cover.png"] {
            fs::write(inbox.join(name), b"").unwrap();
        }

        let found = discover_tracks(inbox).unwrap();
        let rel: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(inbox).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a/one.mp3", "B/two.WAV", "zeta.flac"]);
    }

    #[test]
    fn test_discover_tracks_empty_inbox() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_tracks(dir.path()),
            Err(PackError::InvalidInput(_))
        ));
        assert!(matches!(
            discover_tracks(&dir.path().join("missing")),
            Err(PackError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_work_dir_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::create(parent.path()).unwrap();
            fs::write(work.path().join("partial.wav"), b"x").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());

        let work = WorkDir::create(parent.path()).unwrap();
        let path = work.path().to_path_buf();
        work.finish();
        assert!(!path.exists());
    }
}
