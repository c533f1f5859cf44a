//! Wire protocol for the worker's stdin/stdout channel
//!
//! Commands flow in as `{"type": "<kind>", ...}` JSON lines; responses flow
//! out the same way. Every command and response occupies exactly one line;
//! `serde_json` never emits raw newlines, so the invariant holds by
//! construction.

use serde::{Deserialize, Serialize};

use crate::audio::STT_SAMPLE_RATE;
use crate::{Error, Result};

/// Line the worker prints on stdout once it is accepting commands.
///
/// The client matches this as a substring, so startup diagnostics may share
/// the stream.
pub const READY_MARKER: &str = "Service ready!";

/// Literal line that shuts the worker down (matched case-insensitively)
pub const QUIT_COMMAND: &str = "quit";

/// A single request to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Transcribe a base64-encoded PCM16 buffer
    Transcribe {
        /// Base64 encoding of little-endian PCM16 samples
        audio_data: String,
        /// Sample rate of the buffer (16 kHz mono by convention)
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
    },
    /// Synthesize speech from text
    Tts {
        /// Text to speak
        text: String,
    },
    /// Report per-model warmup state
    Status,
}

const fn default_sample_rate() -> u32 {
    STT_SAMPLE_RATE
}

/// A single reply from the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Outcome of a `transcribe` command
    TranscriptionResult {
        /// Recovered transcript; `null` when transcription failed
        text: Option<String>,
        /// Whether the inference completed
        success: bool,
    },
    /// Outcome of a `tts` command
    TtsResult {
        /// Base64 encoding of the synthesized PCM16 samples
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_data: Option<String>,
        /// Emission rate of the synthesis tool (24 kHz)
        #[serde(skip_serializing_if = "Option::is_none")]
        sample_rate: Option<u32>,
        /// Whether synthesis completed
        success: bool,
        /// Diagnostic excerpt when synthesis failed
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Reply to a `status` command
    Status {
        /// Whether the STT model has completed a successful inference
        stt_warmed_up: bool,
        /// Whether the TTS model has completed a successful inference
        tts_warmed_up: bool,
    },
    /// Command could not be decoded or dispatched
    Error {
        /// Human-readable decode or dispatch failure
        error: String,
    },
}

/// Decode one line of input as a [`Command`]
///
/// # Errors
///
/// Returns [`Error::Protocol`] for malformed JSON, a missing `type` field, or
/// an unrecognized command type.
pub fn decode_command(line: &str) -> Result<Command> {
    serde_json::from_str(line).map_err(|e| Error::Protocol(e.to_string()))
}

/// Encode a [`Response`] as a single line of output (without the trailing
/// newline)
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the response cannot be serialized,
/// which would indicate a bug rather than bad input.
pub fn encode_response(response: &Response) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}
