use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ember_speech::audio::{self, STT_SAMPLE_RATE};
use ember_speech::{ClientConfig, Config, Service, WorkerClient};

/// Ember - persistent speech worker for voice agents
#[derive(Parser)]
#[command(name = "ember", version, about)]
struct Cli {
    /// Path to a config file (defaults to the user config dir)
    #[arg(short, long, env = "EMBER_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Warm up both models before signaling readiness
    #[arg(long, env = "EMBER_EAGER_WARMUP")]
    eager_warmup: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker service loop on stdin/stdout (the default)
    Serve,
    /// Synthesize text to a WAV file through a spawned worker
    Say {
        /// Text to speak
        text: String,

        /// Output WAV path
        #[arg(short, long, default_value = "ember-out.wav")]
        output: PathBuf,
    },
    /// Transcribe a WAV file through a spawned worker
    Transcribe {
        /// Input WAV path (PCM16 mono, conventionally 16 kHz)
        file: PathBuf,
    },
    /// Query the warmup status of a fresh worker
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stdout is the protocol channel, so all logging goes to stderr
    let filter = match cli.verbose {
        0 => "info,ember_speech=info",
        1 => "info,ember_speech=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.eager_warmup = config.eager_warmup || cli.eager_warmup;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Say { text, output } => {
            say(&config, cli.config.as_deref(), &text, &output).await
        }
        Command::Transcribe { file } => transcribe(&config, cli.config.as_deref(), &file).await,
        Command::Status => status(&config, cli.config.as_deref()).await,
    }
}

/// Build the worker spawn command, forwarding an explicit config path so the
/// worker resolves the same configuration as this process
fn client_config(config: &Config, config_path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let mut client = ClientConfig::from_config(config)?;
    if let (None, Some(path)) = (&config.worker_command, config_path) {
        client.args = vec![
            "--config".to_string(),
            path.display().to_string(),
            "serve".to_string(),
        ];
    }
    Ok(client)
}

/// Run the worker service loop until `quit` or end of input
async fn serve(config: &Config) -> anyhow::Result<()> {
    let mut service = Service::from_config(config);
    service.run(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}

/// Synthesize text through a spawned worker and write the result as WAV
async fn say(
    config: &Config,
    config_path: Option<&Path>,
    text: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let mut client = WorkerClient::spawn(&client_config(config, config_path)?).await?;

    println!("Synthesizing: \"{text}\"");
    let buffer = client.synthesize(text).await?;
    audio::wav::write_pcm16(output, &buffer)?;
    println!(
        "Wrote {} ({:.2}s at {} Hz)",
        output.display(),
        buffer.duration_secs(),
        buffer.sample_rate
    );

    client.shutdown().await?;
    Ok(())
}

/// Transcribe a WAV file through a spawned worker
async fn transcribe(
    config: &Config,
    config_path: Option<&Path>,
    file: &Path,
) -> anyhow::Result<()> {
    let buffer = audio::wav::read_pcm16(file)?;
    if buffer.sample_rate != STT_SAMPLE_RATE {
        tracing::warn!(
            sample_rate = buffer.sample_rate,
            expected = STT_SAMPLE_RATE,
            "input is not at the conventional transcription rate; passing through unresampled"
        );
    }

    let mut client = WorkerClient::spawn(&client_config(config, config_path)?).await?;

    println!("Transcribing {} ({:.2}s)...", file.display(), buffer.duration_secs());
    let transcript = client.transcribe(&buffer).await?;
    println!("{transcript}");

    client.shutdown().await?;
    Ok(())
}

/// Report a fresh worker's warmup flags
async fn status(config: &Config, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut client = WorkerClient::spawn(&client_config(config, config_path)?).await?;

    let status = client.status().await?;
    println!("STT warmed up: {}", status.stt_warmed_up);
    println!("TTS warmed up: {}", status.tts_warmed_up);

    client.shutdown().await?;
    Ok(())
}
