//! Service loop integration tests
//!
//! Drive the dispatcher over in-memory pipes with a scripted runner, so no
//! external model tools are needed.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ember_speech::audio::{AudioBuffer, TTS_SAMPLE_RATE, codec};
use ember_speech::{Error, READY_MARKER, Response, Result, Service, ServiceOptions, SpeechRunner};

mod common;

/// Outcome of one scripted runner call
#[derive(Clone, Copy, Debug)]
enum Step {
    Succeed,
    Fail,
}

/// Scripted [`SpeechRunner`] with call counters
///
/// Pops one step per call; when the script runs dry the fallback step
/// repeats forever.
#[derive(Clone)]
struct MockRunner {
    inner: Arc<Inner>,
}

struct Inner {
    transcribe_steps: Mutex<VecDeque<Step>>,
    transcribe_fallback: Step,
    synthesize_steps: Mutex<VecDeque<Step>>,
    synthesize_fallback: Step,
    transcribe_calls: AtomicUsize,
    synthesize_calls: AtomicUsize,
}

impl MockRunner {
    fn with_fallbacks(transcribe_fallback: Step, synthesize_fallback: Step) -> Self {
        Self {
            inner: Arc::new(Inner {
                transcribe_steps: Mutex::new(VecDeque::new()),
                transcribe_fallback,
                synthesize_steps: Mutex::new(VecDeque::new()),
                synthesize_fallback,
                transcribe_calls: AtomicUsize::new(0),
                synthesize_calls: AtomicUsize::new(0),
            }),
        }
    }

    fn healthy() -> Self {
        Self::with_fallbacks(Step::Succeed, Step::Succeed)
    }

    fn failing() -> Self {
        Self::with_fallbacks(Step::Fail, Step::Fail)
    }

    fn script_transcribe(self, steps: &[Step]) -> Self {
        self.inner
            .transcribe_steps
            .lock()
            .unwrap()
            .extend(steps.iter().copied());
        self
    }

    fn transcribe_calls(&self) -> usize {
        self.inner.transcribe_calls.load(Ordering::SeqCst)
    }

    fn synthesize_calls(&self) -> usize {
        self.inner.synthesize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRunner for MockRunner {
    async fn transcribe(&self, _audio: &AudioBuffer, _limit: Duration) -> Result<String> {
        self.inner.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .inner
            .transcribe_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.inner.transcribe_fallback);
        match step {
            Step::Succeed => Ok("hello world".to_string()),
            Step::Fail => Err(Error::Invocation("mock transcription failure".to_string())),
        }
    }

    async fn synthesize(&self, _text: &str, _limit: Duration) -> Result<AudioBuffer> {
        self.inner.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .inner
            .synthesize_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.inner.synthesize_fallback);
        match step {
            Step::Succeed => Ok(common::ramp_buffer(TTS_SAMPLE_RATE, 2_400)),
            Step::Fail => Err(Error::Invocation("mock synthesis failure".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Run the service loop over an input script and collect output lines
async fn drive(service: &mut Service, input: &str) -> Vec<String> {
    let mut output = std::io::Cursor::new(Vec::new());
    service
        .run(input.as_bytes(), &mut output)
        .await
        .expect("service loop failed");
    String::from_utf8(output.into_inner())
        .expect("service output was not UTF-8")
        .lines()
        .map(ToString::to_string)
        .collect()
}

fn parse(line: &str) -> Response {
    serde_json::from_str(line).unwrap_or_else(|e| panic!("unparseable response {line:?}: {e}"))
}

fn transcribe_line(audio: &AudioBuffer) -> String {
    format!(
        r#"{{"type":"transcribe","audio_data":"{}","sample_rate":{}}}"#,
        codec::encode_pcm16(&audio.samples),
        audio.sample_rate
    )
}

fn service_with(runner: &MockRunner) -> Service {
    Service::new(Box::new(runner.clone()), ServiceOptions::default())
}

#[tokio::test]
async fn readiness_marker_precedes_responses() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "{\"type\":\"status\"}\n").await;

    assert_eq!(lines[0], READY_MARKER);
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn fresh_service_reports_cold_models() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "{\"type\":\"status\"}\n").await;

    assert_eq!(
        parse(&lines[1]),
        Response::Status {
            stt_warmed_up: false,
            tts_warmed_up: false,
        }
    );
}

#[tokio::test]
async fn one_response_per_command_in_fifo_order() {
    let mock = MockRunner::healthy();
    let mut service = service_with(&mock);

    let audio = common::silence(16_000);
    let input = format!(
        "{}\n{}\n{}\n{}\n{}\n",
        r#"{"type":"status"}"#,
        transcribe_line(&audio),
        r#"{"type":"status"}"#,
        r#"{"type":"tts","text":"Hello"}"#,
        r#"{"type":"status"}"#,
    );
    let lines = drive(&mut service, &input).await;

    // readiness marker plus exactly one line per command
    assert_eq!(lines.len(), 6);

    assert_eq!(
        parse(&lines[1]),
        Response::Status {
            stt_warmed_up: false,
            tts_warmed_up: false,
        }
    );
    assert!(matches!(
        parse(&lines[2]),
        Response::TranscriptionResult { success: true, .. }
    ));
    assert_eq!(
        parse(&lines[3]),
        Response::Status {
            stt_warmed_up: true,
            tts_warmed_up: false,
        }
    );
    assert!(matches!(
        parse(&lines[4]),
        Response::TtsResult { success: true, .. }
    ));
    assert_eq!(
        parse(&lines[5]),
        Response::Status {
            stt_warmed_up: true,
            tts_warmed_up: true,
        }
    );
}

#[tokio::test]
async fn transcription_success_carries_the_transcript() {
    let mut service = service_with(&MockRunner::healthy());
    let input = transcribe_line(&common::silence(16_000)) + "\n";
    let lines = drive(&mut service, &input).await;

    assert_eq!(
        parse(&lines[1]),
        Response::TranscriptionResult {
            text: Some("hello world".to_string()),
            success: true,
        }
    );
}

#[tokio::test]
async fn transcription_failure_is_soft() {
    let mock = MockRunner::failing();
    let mut service = service_with(&mock);

    let input = format!(
        "{}\n{}\n",
        transcribe_line(&common::silence(16_000)),
        r#"{"type":"status"}"#,
    );
    let lines = drive(&mut service, &input).await;

    assert_eq!(
        parse(&lines[1]),
        Response::TranscriptionResult {
            text: None,
            success: false,
        }
    );
    // failed warmup and failed inference leave the model cold, loop alive
    assert_eq!(
        parse(&lines[2]),
        Response::Status {
            stt_warmed_up: false,
            tts_warmed_up: false,
        }
    );
}

#[tokio::test]
async fn tts_success_carries_audio_at_24k() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "{\"type\":\"tts\",\"text\":\"Hello\"}\n").await;

    match parse(&lines[1]) {
        Response::TtsResult {
            audio_data: Some(audio_data),
            sample_rate: Some(rate),
            success: true,
            error: None,
        } => {
            assert_eq!(rate, 24_000);
            let samples = codec::decode_pcm16(&audio_data).unwrap();
            assert!(!samples.is_empty());
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn tts_failure_carries_error_and_no_audio() {
    let mut service = service_with(&MockRunner::failing());
    let lines = drive(&mut service, "{\"type\":\"tts\",\"text\":\"Hello\"}\n").await;

    match parse(&lines[1]) {
        Response::TtsResult {
            audio_data: None,
            sample_rate: None,
            success: false,
            error: Some(error),
        } => assert!(!error.is_empty()),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn tts_only_warms_the_tts_model() {
    let mut service = service_with(&MockRunner::healthy());
    let input = format!(
        "{}\n{}\n",
        r#"{"type":"tts","text":"Hello"}"#,
        r#"{"type":"status"}"#,
    );
    let lines = drive(&mut service, &input).await;

    assert_eq!(
        parse(&lines[2]),
        Response::Status {
            stt_warmed_up: false,
            tts_warmed_up: true,
        }
    );
}

#[tokio::test]
async fn malformed_json_yields_error_and_loop_continues() {
    let mut service = service_with(&MockRunner::healthy());
    let input = "this is not json\n{\"type\":\"status\"}\n";
    let lines = drive(&mut service, input).await;

    assert!(matches!(parse(&lines[1]), Response::Error { .. }));
    assert!(matches!(parse(&lines[2]), Response::Status { .. }));
}

#[tokio::test]
async fn unknown_command_type_is_echoed_in_the_error() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "{\"type\":\"mystery\"}\n").await;

    match parse(&lines[1]) {
        Response::Error { error } => assert!(error.contains("mystery"), "{error}"),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_audio_payload_yields_error_response() {
    let mock = MockRunner::healthy();
    let mut service = service_with(&mock);
    let input = "{\"type\":\"transcribe\",\"audio_data\":\"!!!not-base64!!!\"}\n";
    let lines = drive(&mut service, input).await;

    assert!(matches!(parse(&lines[1]), Response::Error { .. }));
    // the runner was never touched
    assert_eq!(mock.transcribe_calls(), 0);
}

#[tokio::test]
async fn blank_line_is_a_decode_failure() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "\n{\"type\":\"status\"}\n").await;

    assert!(matches!(parse(&lines[1]), Response::Error { .. }));
    assert!(matches!(parse(&lines[2]), Response::Status { .. }));
}

#[tokio::test]
async fn quit_is_case_insensitive_and_ends_the_loop() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "QUIT\n{\"type\":\"status\"}\n").await;

    // shutdown notice, and the trailing command is never read
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("Shutting down"));
}

#[tokio::test]
async fn end_of_input_ends_the_loop_cleanly() {
    let mut service = service_with(&MockRunner::healthy());
    let lines = drive(&mut service, "").await;

    assert_eq!(lines, vec![READY_MARKER.to_string()]);
}

#[tokio::test]
async fn warmup_runs_once_then_is_skipped() {
    let mock = MockRunner::healthy();
    let mut service = service_with(&mock);

    let audio = common::silence(16_000);
    let input = format!("{}\n{}\n", transcribe_line(&audio), transcribe_line(&audio));
    drive(&mut service, &input).await;

    // first command: warmup + real; second command: real only
    assert_eq!(mock.transcribe_calls(), 3);
}

#[tokio::test]
async fn failed_warmup_is_retried_on_the_next_command() {
    // first command: warmup fails, real call fails; second command: both work
    let mock = MockRunner::healthy().script_transcribe(&[Step::Fail, Step::Fail]);
    let mut service = service_with(&mock);

    let audio = common::silence(16_000);
    let input = format!("{}\n{}\n", transcribe_line(&audio), transcribe_line(&audio));
    let lines = drive(&mut service, &input).await;

    assert!(matches!(
        parse(&lines[1]),
        Response::TranscriptionResult { success: false, .. }
    ));
    assert!(matches!(
        parse(&lines[2]),
        Response::TranscriptionResult { success: true, .. }
    ));
    // warmup + real, then retried warmup + real
    assert_eq!(mock.transcribe_calls(), 4);
    assert!(service.state().stt_warmed_up);
}

#[tokio::test]
async fn eager_warmup_happens_before_readiness() {
    let mock = MockRunner::healthy();
    let options = ServiceOptions {
        eager_warmup: true,
        ..ServiceOptions::default()
    };
    let mut service = Service::new(Box::new(mock.clone()), options);

    let lines = drive(&mut service, "{\"type\":\"status\"}\n").await;

    assert_eq!(lines[0], READY_MARKER);
    assert_eq!(
        parse(&lines[1]),
        Response::Status {
            stt_warmed_up: true,
            tts_warmed_up: true,
        }
    );
    assert_eq!(mock.transcribe_calls(), 1);
    assert_eq!(mock.synthesize_calls(), 1);
}
