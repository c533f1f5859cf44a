//! Configuration management for the Ember speech worker

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use file::EmberConfigFile;

use crate::{Error, Result};

/// Default per-request inference timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default warmup inference timeout (model load takes longer than inference)
pub const DEFAULT_WARMUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Default client-side readiness wait limit
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Ember configuration, resolved from defaults plus an optional TOML overlay
#[derive(Debug, Clone)]
pub struct Config {
    /// Transcription tool invocation
    pub stt: SttToolConfig,

    /// Synthesis tool invocation
    pub tts: TtsToolConfig,

    /// Per-request inference timeout
    pub request_timeout: Duration,

    /// Warmup inference timeout
    pub warmup_timeout: Duration,

    /// Warm both models before signaling readiness
    pub eager_warmup: bool,

    /// Directory for request-scoped temp files (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,

    /// Worker command the client spawns; `None` re-invokes the current
    /// executable with `serve`
    pub worker_command: Option<Vec<String>>,

    /// Client-side readiness wait limit
    pub startup_timeout: Duration,
}

/// How to invoke the external transcription tool
#[derive(Debug, Clone)]
pub struct SttToolConfig {
    /// Program to run
    pub program: String,

    /// Leading arguments before the per-request ones
    pub args: Vec<String>,

    /// Model repository identifier passed via `--hf-repo`
    pub model_repo: String,
}

impl Default for SttToolConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["-m".to_string(), "moshi_mlx.run_inference".to_string()],
            model_repo: "kyutai/stt-2.6b-en-mlx".to_string(),
        }
    }
}

/// How to invoke the external synthesis tool
#[derive(Debug, Clone)]
pub struct TtsToolConfig {
    /// Program to run
    pub program: String,

    /// Leading arguments before the per-request ones
    pub args: Vec<String>,

    /// Quantization level passed via `--quantize`
    pub quantize: u8,
}

impl Default for TtsToolConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["delayed-streams-modeling/scripts/tts_mlx.py".to_string()],
            quantize: 8,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stt: SttToolConfig::default(),
            tts: TtsToolConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            warmup_timeout: DEFAULT_WARMUP_TIMEOUT,
            eager_warmup: false,
            scratch_dir: None,
            worker_command: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`
    ///
    /// An explicit path must exist; the default location is optional and
    /// silently falls back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given file cannot be read, or if any
    /// file fails to parse as TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let contents = match path {
            Some(explicit) => Some(std::fs::read_to_string(explicit).map_err(|e| {
                Error::Config(format!("cannot read {}: {e}", explicit.display()))
            })?),
            None => default_config_path()
                .filter(|p| p.exists())
                .map(std::fs::read_to_string)
                .transpose()?,
        };

        let overlay = match contents {
            Some(text) => toml::from_str(&text)?,
            None => EmberConfigFile::default(),
        };

        Ok(Self::from_overlay(overlay))
    }

    /// Resolve a parsed overlay file against defaults
    #[must_use]
    pub fn from_overlay(overlay: EmberConfigFile) -> Self {
        let defaults = Self::default();
        let stt_defaults = SttToolConfig::default();
        let tts_defaults = TtsToolConfig::default();

        Self {
            stt: SttToolConfig {
                program: overlay.stt.program.unwrap_or(stt_defaults.program),
                args: overlay.stt.args.unwrap_or(stt_defaults.args),
                model_repo: overlay.stt.model_repo.unwrap_or(stt_defaults.model_repo),
            },
            tts: TtsToolConfig {
                program: overlay.tts.program.unwrap_or(tts_defaults.program),
                args: overlay.tts.args.unwrap_or(tts_defaults.args),
                quantize: overlay.tts.quantize.unwrap_or(tts_defaults.quantize),
            },
            request_timeout: overlay
                .service
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            warmup_timeout: overlay
                .service
                .warmup_timeout_secs
                .map_or(defaults.warmup_timeout, Duration::from_secs),
            eager_warmup: overlay.service.eager_warmup.unwrap_or(defaults.eager_warmup),
            scratch_dir: overlay.service.scratch_dir,
            worker_command: overlay.client.worker_command,
            startup_timeout: overlay
                .client
                .startup_timeout_secs
                .map_or(defaults.startup_timeout, Duration::from_secs),
        }
    }
}

/// Default config file location (`~/.config/ember/config.toml` on Linux)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ember")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
