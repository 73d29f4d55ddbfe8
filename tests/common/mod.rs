//! Recording stand-in for the transcoding engine.

#![allow(dead_code)]

use async_trait::async_trait;
use packmaker::{Engine, EngineOutput, PackError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_DURATION: f64 = 60.0;

type FailWhen = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Records every ffmpeg invocation and touches its output file.
pub struct MockEngine {
    calls: Mutex<Vec<Vec<String>>>,
    durations: HashMap<PathBuf, f64>,
    silence_log: String,
    fail_when: Option<FailWhen>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            durations: HashMap::new(),
            silence_log: String::new(),
            fail_when: None,
        }
    }

    pub fn with_duration(mut self, path: impl Into<PathBuf>, secs: f64) -> Self {
        self.durations.insert(path.into(), secs);
        self
    }

    /// Stderr returned for `silencedetect` runs.
    pub fn with_silence_log(mut self, log: &str) -> Self {
        self.silence_log = log.to_string();
        self
    }

    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| args.iter().any(|a| a.contains(needle)))
            .collect()
    }
}

/// Value following `flag` in an argv.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let i = args.iter().position(|a| a == flag)?;
    args.get(i + 1).map(String::as_str)
}

#[async_trait]
impl Engine for MockEngine {
    async fn ffmpeg(&self, args: &[String]) -> Result<EngineOutput> {
        self.calls.lock().unwrap().push(args.to_vec());

        if let Some(ref fail) = self.fail_when {
            if fail(args) {
                return Err(PackError::EngineFailure {
                    tool: "ffmpeg",
                    code: Some(1),
                    stderr: "mock failure".to_string(),
                });
            }
        }

        if args.iter().any(|a| a.starts_with("silencedetect")) {
            return Ok(EngineOutput {
                stderr: self.silence_log.clone(),
            });
        }

        if let Some(out) = args.last().filter(|a| a.as_str() != "-") {
            let out = Path::new(out);
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, b"")?;
        }
        Ok(EngineOutput::default())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        Ok(self.durations.get(path).copied().unwrap_or(DEFAULT_DURATION))
    }
}
