//! Client-side worker process management
//!
//! Spawns the worker as a child process, waits for its readiness marker,
//! then exchanges one JSON line per command. The child is spawned with
//! kill-on-drop, so the worker is torn down on every exit path of the scope
//! that owns the client, early aborts included.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::time::timeout;

use crate::audio::{AudioBuffer, codec};
use crate::config::{Config, DEFAULT_STARTUP_TIMEOUT};
use crate::protocol::{Command, QUIT_COMMAND, READY_MARKER, Response};
use crate::{Error, Result};

/// How to spawn and supervise a worker process
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Program to run
    pub program: String,

    /// Arguments to the program
    pub args: Vec<String>,

    /// How long to wait for the readiness marker
    pub startup_timeout: Duration,
}

impl ClientConfig {
    /// Spawn the current executable as its own worker (`ember serve`)
    ///
    /// # Errors
    ///
    /// Returns error if the current executable path cannot be determined.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| Error::Config(format!("cannot locate current executable: {e}")))?;
        Ok(Self {
            program: exe.display().to_string(),
            args: vec!["serve".to_string()],
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        })
    }

    /// Derive the worker command from resolved configuration
    ///
    /// Uses `worker_command` when configured, otherwise re-invokes the
    /// current executable.
    ///
    /// # Errors
    ///
    /// Returns error if the configured command is empty or the current
    /// executable path cannot be determined.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = match &config.worker_command {
            Some(command) => {
                let (program, args) = command.split_first().ok_or_else(|| {
                    Error::Config("worker_command must not be empty".to_string())
                })?;
                Self {
                    program: program.clone(),
                    args: args.to_vec(),
                    startup_timeout: DEFAULT_STARTUP_TIMEOUT,
                }
            }
            None => Self::current_exe()?,
        };
        client.startup_timeout = config.startup_timeout;
        Ok(client)
    }
}

/// Warmup flags reported by a `status` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupStatus {
    /// Whether the worker's STT model is warmed up
    pub stt_warmed_up: bool,

    /// Whether the worker's TTS model is warmed up
    pub tts_warmed_up: bool,
}

/// Handle to a running worker process
///
/// Exactly one client owns a worker; its stdin stream cannot be shared.
/// Dropping the client kills the worker if [`shutdown`](Self::shutdown)
/// was not called first.
#[derive(Debug)]
pub struct WorkerClient {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    exit: Option<ExitStatus>,
}

impl WorkerClient {
    /// Spawn a worker and block until it signals readiness
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the worker cannot be spawned or exits
    /// before becoming ready, and [`Error::StartupTimeout`] if the readiness
    /// marker does not appear within the configured limit.
    pub async fn spawn(config: &ClientConfig) -> Result<Self> {
        tracing::info!(program = %config.program, "starting speech worker");

        let mut child = tokio::process::Command::new(&config.program)
            .args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transport(format!("failed to spawn worker: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .map(|out| BufReader::new(out).lines())
            .ok_or_else(|| Error::Transport("worker stdout not captured".to_string()))?;

        // Drain worker stderr into our logs so it can't fill the pipe
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(worker = %line, "worker stderr");
                }
            });
        }

        let mut client = Self {
            child,
            stdin,
            stdout,
            exit: None,
        };
        client.wait_ready(config.startup_timeout).await?;
        tracing::info!("worker ready");
        Ok(client)
    }

    /// Read startup lines until the readiness marker appears
    async fn wait_ready(&mut self, limit: Duration) -> Result<()> {
        match timeout(limit, read_until_ready(&mut self.stdout)).await {
            Ok(result) => result,
            Err(_) => Err(Error::StartupTimeout(limit)),
        }
    }

    /// Send one command and wait for the matching response
    ///
    /// Non-JSON output lines are worker diagnostics: logged at debug level
    /// and skipped. The first line that parses as a response is returned;
    /// neither side processes anything concurrently, so responses stay FIFO.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the worker is no longer running or
    /// its pipes close before a response arrives.
    pub async fn send(&mut self, command: &Command) -> Result<Response> {
        if self.exit.is_some() {
            return Err(Error::Transport("worker is not running".to_string()));
        }

        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("failed to write command: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("failed to flush command: {e}")))?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| Error::Transport(format!("failed to read response: {e}")))?
                .ok_or_else(|| {
                    Error::Transport("worker closed its output before responding".to_string())
                })?;

            match serde_json::from_str::<Response>(&line) {
                Ok(response) => return Ok(response),
                Err(_) => tracing::debug!(line = %line, "skipping non-protocol worker output"),
            }
        }
    }

    /// Transcribe a PCM16 buffer through the worker
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invocation`] when the worker reports failure, or a
    /// transport/protocol error if the exchange itself breaks down.
    pub async fn transcribe(&mut self, audio: &AudioBuffer) -> Result<String> {
        let command = Command::Transcribe {
            audio_data: codec::encode_pcm16(&audio.samples),
            sample_rate: audio.sample_rate,
        };
        match self.send(&command).await? {
            Response::TranscriptionResult {
                text,
                success: true,
            } => Ok(text.unwrap_or_default()),
            Response::TranscriptionResult { success: false, .. } => Err(Error::Invocation(
                "worker reported transcription failure".to_string(),
            )),
            other => Err(unexpected(&other)),
        }
    }

    /// Synthesize speech from text through the worker
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invocation`] with the worker's diagnostic excerpt
    /// when synthesis fails, or a transport/protocol error if the exchange
    /// breaks down.
    pub async fn synthesize(&mut self, text: &str) -> Result<AudioBuffer> {
        let command = Command::Tts {
            text: text.to_string(),
        };
        match self.send(&command).await? {
            Response::TtsResult {
                audio_data: Some(audio_data),
                sample_rate,
                success: true,
                ..
            } => {
                let samples = codec::decode_pcm16(&audio_data)?;
                Ok(AudioBuffer::new(
                    samples,
                    sample_rate.unwrap_or(crate::audio::TTS_SAMPLE_RATE),
                ))
            }
            Response::TtsResult { error, .. } => Err(Error::Invocation(
                error.unwrap_or_else(|| "synthesis failed".to_string()),
            )),
            other => Err(unexpected(&other)),
        }
    }

    /// Query the worker's warmup flags
    ///
    /// # Errors
    ///
    /// Returns a transport/protocol error if the exchange breaks down.
    pub async fn status(&mut self) -> Result<WarmupStatus> {
        match self.send(&Command::Status).await? {
            Response::Status {
                stt_warmed_up,
                tts_warmed_up,
            } => Ok(WarmupStatus {
                stt_warmed_up,
                tts_warmed_up,
            }),
            other => Err(unexpected(&other)),
        }
    }

    /// Ask the worker to quit and wait for it to exit
    ///
    /// Idempotent: a second call returns the recorded exit status. Write
    /// errors are ignored since the worker may already have exited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if waiting on the process fails.
    pub async fn shutdown(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }

        let _ = self.stdin.write_all(QUIT_COMMAND.as_bytes()).await;
        let _ = self.stdin.write_all(b"\n").await;
        let _ = self.stdin.flush().await;

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::Transport(format!("failed waiting for worker exit: {e}")))?;
        self.exit = Some(status);

        if status.success() {
            tracing::info!("worker exited cleanly");
        } else {
            tracing::warn!(%status, "worker exited abnormally");
        }
        Ok(status)
    }
}

async fn read_until_ready(stdout: &mut Lines<BufReader<ChildStdout>>) -> Result<()> {
    loop {
        let line = stdout
            .next_line()
            .await
            .map_err(|e| Error::Transport(format!("failed to read worker startup output: {e}")))?
            .ok_or_else(|| {
                Error::Transport("worker exited before signaling readiness".to_string())
            })?;

        if line.contains(READY_MARKER) {
            return Ok(());
        }
        tracing::debug!(line = %line, "worker startup output");
    }
}

fn unexpected(response: &Response) -> Error {
    Error::Protocol(format!("unexpected response from worker: {response:?}"))
}
