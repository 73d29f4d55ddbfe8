pub mod ffmpeg;

pub use ffmpeg::{check_ffmpeg, check_ffprobe, parse_probe_duration, FfmpegEngine};

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// What the transcoding engine reported for a successful run.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// Diagnostic stream; filters such as `silencedetect` report here.
    pub stderr: String,
}

/// The external transcoding engine and its prober.
///
/// Every call runs to completion before returning. A non-zero exit is
/// reported as [`PackError::EngineFailure`](crate::PackError::EngineFailure).
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run one transcode job with the given argument list.
    async fn ffmpeg(&self, args: &[String]) -> Result<EngineOutput>;

    /// Container duration of `path` in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;
}

/// Collect heterogeneous arguments into an owned argv.
#[macro_export]
macro_rules! argv {
    ($($arg:expr),* $(,)?) => {
        vec![$(::std::string::ToString::to_string(&$arg)),*]
    };
}

/// Render a path for an argv slot.
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
