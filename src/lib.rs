pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod mux;
pub mod pipeline;
pub mod video;

pub use config::Config;
pub use engine::{Engine, EngineOutput, FfmpegEngine};
pub use error::{PackError, Result};
pub use mux::{MuxMode, MuxPlan};
pub use pipeline::{build_pack, print_summary, PackResult, PackStats};
