//! Shared test utilities

use std::time::Duration;

use ember_speech::ClientConfig;
use ember_speech::audio::AudioBuffer;

/// One second of silence at the given rate
#[must_use]
pub fn silence(sample_rate: u32) -> AudioBuffer {
    AudioBuffer::silence(sample_rate)
}

/// A short deterministic non-silent buffer
#[must_use]
pub fn ramp_buffer(sample_rate: u32, len: usize) -> AudioBuffer {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let samples: Vec<i16> = (0..len).map(|i| (i % 2048) as i16 - 1024).collect();
    AudioBuffer::new(samples, sample_rate)
}

/// Client config running a shell script as the worker
#[must_use]
pub fn sh_worker(script: &str, startup_timeout: Duration) -> ClientConfig {
    ClientConfig {
        program: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        startup_timeout,
    }
}
