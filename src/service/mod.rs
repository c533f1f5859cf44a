//! The worker service loop
//!
//! Reads one command line at a time from its input, dispatches it, writes
//! exactly one response line, and only then reads the next line. A handler
//! runs to completion (including any blocking wait on an external tool)
//! before the next command is touched, so responses are strictly FIFO and
//! nothing ever runs concurrently.

mod state;

pub use state::ServiceState;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::audio::{self, AudioBuffer, STT_SAMPLE_RATE};
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WARMUP_TIMEOUT};
use crate::protocol::{self, Command, QUIT_COMMAND, READY_MARKER, Response};
use crate::runner::{ProcessRunner, SpeechRunner};
use crate::Result;

/// Fixed warmup utterance for the TTS model
const TTS_WARMUP_TEXT: &str = "Hello";

/// Notice printed on the protocol stream when `quit` is received
const SHUTDOWN_NOTICE: &str = "Shutting down service...";

/// Service tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    /// Per-request inference timeout
    pub request_timeout: Duration,

    /// Warmup inference timeout
    pub warmup_timeout: Duration,

    /// Warm both models before signaling readiness
    pub eager_warmup: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            warmup_timeout: DEFAULT_WARMUP_TIMEOUT,
            eager_warmup: false,
        }
    }
}

impl ServiceOptions {
    /// Derive options from resolved configuration
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout,
            warmup_timeout: config.warmup_timeout,
            eager_warmup: config.eager_warmup,
        }
    }
}

/// The worker service: warmup state plus a runner for the external tools
pub struct Service {
    runner: Box<dyn SpeechRunner>,
    state: ServiceState,
    options: ServiceOptions,
}

impl Service {
    /// Create a service around a runner
    #[must_use]
    pub fn new(runner: Box<dyn SpeechRunner>, options: ServiceOptions) -> Self {
        Self {
            runner,
            state: ServiceState::new(),
            options,
        }
    }

    /// Create the production service from resolved configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let runner = ProcessRunner::new(
            config.stt.clone(),
            config.tts.clone(),
            config.scratch_dir.clone(),
        );
        Self::new(Box::new(runner), ServiceOptions::from_config(config))
    }

    /// Current warmup state
    #[must_use]
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// Run the service loop until `quit` or end of input
    ///
    /// Prints the readiness marker once initialization (and eager warmup, if
    /// configured) is done, then serves one command per input line.
    ///
    /// # Errors
    ///
    /// Returns error only for pipe-level read/write failures; per-request
    /// errors are folded into response lines and never end the loop.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.runner.preflight();
        if self.options.eager_warmup {
            tracing::info!("eagerly warming up models");
            self.warm_stt().await;
            self.warm_tts().await;
        }

        writer.write_all(READY_MARKER.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        tracing::info!(runner = self.runner.name(), "service ready");

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();

            if line.eq_ignore_ascii_case(QUIT_COMMAND) {
                writer.write_all(SHUTDOWN_NOTICE.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                tracing::info!("quit received, shutting down");
                return Ok(());
            }

            let response = match protocol::decode_command(line) {
                Ok(command) => self.handle(command).await,
                Err(e) => Response::Error {
                    error: e.to_string(),
                },
            };

            let encoded = protocol::encode_response(&response)?;
            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        tracing::info!("input closed, shutting down");
        Ok(())
    }

    /// Dispatch one decoded command
    async fn handle(&mut self, command: Command) -> Response {
        match command {
            Command::Transcribe {
                audio_data,
                sample_rate,
            } => self.handle_transcribe(&audio_data, sample_rate).await,
            Command::Tts { text } => self.handle_tts(&text).await,
            Command::Status => Response::Status {
                stt_warmed_up: self.state.stt_warmed_up,
                tts_warmed_up: self.state.tts_warmed_up,
            },
        }
    }

    async fn handle_transcribe(&mut self, audio_data: &str, sample_rate: u32) -> Response {
        let samples = match audio::codec::decode_pcm16(audio_data) {
            Ok(samples) => samples,
            Err(e) => {
                return Response::Error {
                    error: e.to_string(),
                };
            }
        };
        let buffer = AudioBuffer::new(samples, sample_rate);

        self.warm_stt().await;

        match self
            .runner
            .transcribe(&buffer, self.options.request_timeout)
            .await
        {
            Ok(text) => {
                // A successful real inference proves the model warm too
                self.state.stt_warmed_up = true;
                Response::TranscriptionResult {
                    text: Some(text),
                    success: true,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                Response::TranscriptionResult {
                    text: None,
                    success: false,
                }
            }
        }
    }

    async fn handle_tts(&mut self, text: &str) -> Response {
        self.warm_tts().await;

        match self
            .runner
            .synthesize(text, self.options.request_timeout)
            .await
        {
            Ok(buffer) => {
                self.state.tts_warmed_up = true;
                Response::TtsResult {
                    audio_data: Some(audio::codec::encode_pcm16(&buffer.samples)),
                    sample_rate: Some(buffer.sample_rate),
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed");
                Response::TtsResult {
                    audio_data: None,
                    sample_rate: None,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Warm the STT model with a throwaway inference over synthetic silence
    ///
    /// Failure leaves the model cold and is retried on the next transcribe
    /// command; the current command proceeds regardless.
    async fn warm_stt(&mut self) {
        if self.state.stt_warmed_up {
            return;
        }

        tracing::info!("warming up STT model");
        let silence = AudioBuffer::silence(STT_SAMPLE_RATE);
        match self
            .runner
            .transcribe(&silence, self.options.warmup_timeout)
            .await
        {
            Ok(_) => {
                self.state.stt_warmed_up = true;
                tracing::info!("STT model warmed up");
            }
            Err(e) => {
                tracing::warn!(error = %e, "STT warmup failed, model stays cold");
            }
        }
    }

    /// Warm the TTS model with a throwaway synthesis of a short fixed string
    async fn warm_tts(&mut self) {
        if self.state.tts_warmed_up {
            return;
        }

        tracing::info!("warming up TTS model");
        match self
            .runner
            .synthesize(TTS_WARMUP_TEXT, self.options.warmup_timeout)
            .await
        {
            Ok(_) => {
                self.state.tts_warmed_up = true;
                tracing::info!("TTS model warmed up");
            }
            Err(e) => {
                tracing::warn!(error = %e, "TTS warmup failed, model stays cold");
            }
        }
    }
}
