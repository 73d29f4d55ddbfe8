use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{tool} exited with {}: {stderr}", exit_label(.code))]
    EngineFailure {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to start {tool}: {source}")]
    EngineUnavailable {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackError {
    /// True when the transcoding engine itself rejected the job.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, PackError::EngineFailure { .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, PackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_failure_display() {
        let err = PackError::EngineFailure {
            tool: "ffmpeg",
            code: Some(1),
            stderr: "Unknown encoder".to_string(),
        };
        assert_eq!(err.to_string(), "ffmpeg exited with status 1: Unknown encoder");
        assert!(err.is_engine_failure());

        let killed = PackError::EngineFailure {
            tool: "ffprobe",
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("signal"));
    }

    #[test]
    fn test_engine_unavailable_display() {
        let err = PackError::EngineUnavailable {
            tool: "ffprobe",
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        assert_eq!(err.to_string(), "Failed to start ffprobe: No such file");
        assert!(!err.is_engine_failure());
    }

    #[test]
    fn test_invalid_input_is_not_engine_failure() {
        assert!(!PackError::InvalidInput("x".into()).is_engine_failure());
    }
}
