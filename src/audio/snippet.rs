use std::path::Path;

use tracing::{debug, info};

use crate::argv;
use crate::engine::{path_arg, Engine};
use crate::error::{PackError, Result};

use super::start::StartEstimator;
use super::{Snippet, Track};

/// Bitrate of the per-track preview snippets.
const SNIPPET_BITRATE: &str = "192k";

/// Cut one `length`-second snippet per track at the estimated start.
///
/// Snippets are written to `out_dir` as `snip_01.m4a`, `snip_02.m4a`, ...
pub async fn build_snippets(
    engine: &dyn Engine,
    estimator: &StartEstimator,
    tracks: &[Track],
    out_dir: &Path,
    length: f64,
) -> Result<Vec<Snippet>> {
    if !(length > 0.0) {
        return Err(PackError::InvalidInput(format!(
            "snippet length must be positive, got {length}"
        )));
    }

    std::fs::create_dir_all(out_dir)?;
    info!("Cutting {} preview snippets of {}s", tracks.len(), length);

    let mut snippets = Vec::with_capacity(tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        let start = estimator.estimate(engine, track, length).await?;
        let clip_len = length.min((track.duration - start).max(0.0));
        let path = out_dir.join(format!("snip_{:02}.m4a", i + 1));

        debug!(
            "Snippet {}: {} @ {:.3}s for {:.3}s",
            i + 1,
            track.path.display(),
            start,
            clip_len
        );

        let args = argv![
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-ss",
            format!("{start:.3}"),
            "-i",
            path_arg(&track.path),
            "-t",
            format!("{clip_len:.3}"),
            "-vn",
            "-sn",
            "-dn",
            "-c:a",
            "aac",
            "-b:a",
            SNIPPET_BITRATE,
            "-threads",
            4,
            path_arg(&path),
        ];
        engine.ffmpeg(&args).await?;

        snippets.push(Snippet {
            source: track.path.clone(),
            path,
            start,
            length: clip_len,
        });
    }

    Ok(snippets)
}
