//! External inference tool invocation
//!
//! Each request shells out to an opaque model-runner binary under a timeout,
//! with scoped temp files carrying the audio and text across the process
//! boundary. The [`SpeechRunner`] trait is the seam between the service loop
//! and the subprocess machinery; tests substitute a scripted implementation.

mod transcript;

pub use transcript::extract_transcript;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::audio::{self, AudioBuffer};
use crate::config::{SttToolConfig, TtsToolConfig};
use crate::{Error, Result};

/// Longest diagnostic excerpt carried into an error message
const EXCERPT_CHARS: usize = 200;

/// Speech inference operations the service dispatches to
#[async_trait]
pub trait SpeechRunner: Send + Sync {
    /// Transcribe a PCM16 buffer, bounded by `limit`
    ///
    /// # Errors
    ///
    /// Returns error if the tool cannot be spawned, exits non-zero, or times
    /// out.
    async fn transcribe(&self, audio: &AudioBuffer, limit: Duration) -> Result<String>;

    /// Synthesize speech from text, bounded by `limit`
    ///
    /// # Errors
    ///
    /// Returns error if the tool cannot be spawned, exits non-zero, times
    /// out, or emits an unreadable output file.
    async fn synthesize(&self, text: &str, limit: Duration) -> Result<AudioBuffer>;

    /// Log startup diagnostics (e.g. whether the tools are on `PATH`)
    fn preflight(&self) {}

    /// Runner name for logging
    fn name(&self) -> &'static str;
}

/// Production runner invoking the configured command-line tools
pub struct ProcessRunner {
    stt: SttToolConfig,
    tts: TtsToolConfig,
    scratch_dir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Create a runner from tool configuration
    #[must_use]
    pub const fn new(stt: SttToolConfig, tts: TtsToolConfig, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            stt,
            tts,
            scratch_dir,
        }
    }

    /// Create a request-scoped temp file that is deleted on drop
    fn scoped_file(&self, kind: &str, suffix: &str) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("ember-{kind}-");
        builder.prefix(&prefix).suffix(suffix);

        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::Invocation(format!("cannot create {kind} temp file: {e}")))?;

        Ok(file)
    }
}

#[async_trait]
impl SpeechRunner for ProcessRunner {
    async fn transcribe(&self, audio: &AudioBuffer, limit: Duration) -> Result<String> {
        // Scoped file: deleted on every exit path when the guard drops
        let wav_file = self.scoped_file("stt", ".wav")?;
        audio::wav::write_pcm16(wav_file.path(), audio)?;

        tracing::debug!(
            samples = audio.len(),
            sample_rate = audio.sample_rate,
            path = %wav_file.path().display(),
            "invoking transcription tool"
        );

        let mut cmd = Command::new(&self.stt.program);
        cmd.args(&self.stt.args)
            .arg("--hf-repo")
            .arg(&self.stt.model_repo)
            .arg(wav_file.path())
            .arg("--temp")
            .arg("0");

        let output = run_tool(cmd, limit, "transcription").await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = extract_transcript(&stdout);

        tracing::debug!(transcript_chars = text.len(), "transcription complete");
        Ok(text)
    }

    async fn synthesize(&self, text: &str, limit: Duration) -> Result<AudioBuffer> {
        let text_file = self.scoped_file("tts", ".txt")?;
        std::fs::write(text_file.path(), text)
            .map_err(|e| Error::Invocation(format!("cannot write tts input: {e}")))?;

        // The tool overwrites this reserved path; the guard still deletes it
        let out_file = self.scoped_file("tts", ".wav")?;

        tracing::debug!(
            text_chars = text.len(),
            output = %out_file.path().display(),
            "invoking synthesis tool"
        );

        let mut cmd = Command::new(&self.tts.program);
        cmd.args(&self.tts.args)
            .arg(text_file.path())
            .arg(out_file.path())
            .arg("--quantize")
            .arg(self.tts.quantize.to_string());

        run_tool(cmd, limit, "synthesis").await?;

        let buffer = audio::wav::read_pcm16(out_file.path())
            .map_err(|e| Error::Invocation(format!("unreadable synthesis output: {e}")))?;

        tracing::debug!(
            samples = buffer.len(),
            sample_rate = buffer.sample_rate,
            "synthesis complete"
        );
        Ok(buffer)
    }

    fn preflight(&self) {
        for program in [&self.stt.program, &self.tts.program] {
            if which::which(program).is_err() {
                tracing::warn!(program = %program, "inference tool not found on PATH");
            }
        }
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Spawn a tool and wait for it, bounded by `limit`
///
/// `kill_on_drop` covers the timeout path: dropping the wait future kills the
/// child, so an expired request never leaves the tool running.
async fn run_tool(mut cmd: Command, limit: Duration, what: &str) -> Result<std::process::Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| Error::Invocation(format!("failed to spawn {what} tool: {e}")))?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| Error::Invocation(format!("{what} timed out after {}s", limit.as_secs())))?
        .map_err(|e| Error::Invocation(format!("{what} tool failed: {e}")))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        return Err(Error::Invocation(format!(
            "{what} tool exited with code {code}: {}",
            excerpt(&output.stderr)
        )));
    }

    Ok(output)
}

/// Trim a diagnostic stream down to an error-message-sized excerpt
fn excerpt(stream: &[u8]) -> String {
    let text = String::from_utf8_lossy(stream);
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        format!("{head}...")
    }
}
