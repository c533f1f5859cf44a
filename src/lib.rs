//! Ember - persistent speech worker for voice agents
//!
//! Large speech models take seconds to load; Ember keeps them resident in a
//! single long-lived worker process and exposes STT and TTS over a
//! line-delimited JSON protocol on the worker's stdin/stdout.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  Voice agent                      │
//! └──────────────────────┬───────────────────────────┘
//!                        │ WorkerClient (JSON lines)
//! ┌──────────────────────▼───────────────────────────┐
//! │                 Ember worker                      │
//! │   Dispatcher │ Warmup state │ Audio codec        │
//! └──────────────────────┬───────────────────────────┘
//!                        │ one subprocess per request
//! ┌──────────────────────▼───────────────────────────┐
//! │        External model runners (STT / TTS)         │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The worker is strictly sequential: one command in, one response out.
//! Each inference shells out to an opaque external tool under a timeout;
//! the first successful inference per model flips its warmup flag, after
//! which calls skip the throwaway warmup pass.

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runner;
pub mod service;

pub use audio::{AudioBuffer, STT_SAMPLE_RATE, TTS_SAMPLE_RATE};
pub use client::{ClientConfig, WarmupStatus, WorkerClient};
pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{Command, READY_MARKER, Response};
pub use runner::{ProcessRunner, SpeechRunner};
pub use service::{Service, ServiceOptions, ServiceState};
