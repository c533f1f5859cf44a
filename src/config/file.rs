//! TOML configuration file loading
//!
//! Supports `~/.config/ember/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct EmberConfigFile {
    /// Worker service tuning
    #[serde(default)]
    pub service: ServiceFileConfig,

    /// Transcription tool invocation
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Synthesis tool invocation
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Client-side worker management
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// Worker service tuning
#[derive(Debug, Default, Deserialize)]
pub struct ServiceFileConfig {
    /// Per-request inference timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Warmup inference timeout in seconds
    pub warmup_timeout_secs: Option<u64>,

    /// Warm both models before signaling readiness
    pub eager_warmup: Option<bool>,

    /// Directory for request-scoped temp files (defaults to the system
    /// temp dir)
    pub scratch_dir: Option<PathBuf>,
}

/// Transcription tool invocation
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Program to run (e.g. "python")
    pub program: Option<String>,

    /// Leading arguments (e.g. ["-m", "moshi_mlx.run_inference"])
    pub args: Option<Vec<String>>,

    /// Model repository identifier passed via `--hf-repo`
    pub model_repo: Option<String>,
}

/// Synthesis tool invocation
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Program to run (e.g. "python3")
    pub program: Option<String>,

    /// Leading arguments (e.g. the path of the synthesis script)
    pub args: Option<Vec<String>>,

    /// Quantization level passed via `--quantize`
    pub quantize: Option<u8>,
}

/// Client-side worker management
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Full worker command line; defaults to re-invoking the current
    /// executable with `serve`
    pub worker_command: Option<Vec<String>>,

    /// Readiness wait limit in seconds
    pub startup_timeout_secs: Option<u64>,
}
