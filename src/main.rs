use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tunescribe::audio::ingest_wav_file;
use tunescribe::notation::{export_midi, MidiExportOptions};
use tunescribe::{
    load_config, Transcriber, TranscriberConfig, TranscriptionOutcome, TranscriptionTrace,
};

/// Monophonic melody transcription
#[derive(Parser)]
#[command(name = "tunescribe")]
#[command(about = "Transcribe recorded melodies into ABC notation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe one or more WAV recordings
    Transcribe {
        /// Input WAV files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write a MIDI file per decoded recording into this directory
        #[arg(long)]
        midi_dir: Option<PathBuf>,

        /// Append a JSONL trace of every stage to this file
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transcribe {
            inputs,
            config,
            midi_dir,
            trace,
            json,
            verbose,
        } => {
            let log_level = if verbose { "debug" } else { "info" };
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
                .init();

            let config = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => TranscriberConfig::default(),
            };

            if let Some(dir) = &midi_dir {
                tokio::fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("creating {}", dir.display()))?;
            }

            let handles: Vec<_> = inputs
                .into_iter()
                .map(|input| {
                    let config = config.clone();
                    let trace = trace.clone().map(TranscriptionTrace::new);
                    tokio::task::spawn_blocking(move || transcribe_file(&input, config, trace))
                })
                .collect();

            for handle in handles {
                let (input, outcome) = handle.await??;
                report(&input, &outcome, json)?;

                if let (Some(dir), Some(decoded)) = (&midi_dir, outcome.decoded()) {
                    let bytes = export_midi(decoded, &MidiExportOptions::default())?;
                    let stem = input
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "melody".to_string());
                    let path = dir.join(format!("{}.mid", stem));
                    tokio::fs::write(&path, bytes)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    log::info!("Wrote {}", path.display());
                }
            }
        }
        Commands::ValidateConfig { config } => {
            let config = load_config(&config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            let config = TranscriberConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn transcribe_file(
    input: &Path,
    config: TranscriberConfig,
    trace: Option<TranscriptionTrace>,
) -> anyhow::Result<(PathBuf, TranscriptionOutcome)> {
    let audio = ingest_wav_file(input).with_context(|| format!("reading {}", input.display()))?;

    let mut transcriber = Transcriber::new(config)?;
    transcriber.feed_audio(&audio)?;
    let outcome = transcriber
        .transcribe_traced(trace.as_ref())
        .with_context(|| format!("transcribing {}", input.display()))?;

    Ok((input.to_path_buf(), outcome))
}

fn report(input: &Path, outcome: &TranscriptionOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "file": input.display().to_string(),
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    match outcome {
        TranscriptionOutcome::Decoded(decoded) => {
            println!("{}: {} BPM,{}", input.display(), decoded.tempo, decoded.abc);
        }
        TranscriptionOutcome::NoMusic(reason) => {
            println!("{}: no music detected ({})", input.display(), reason);
        }
    }
    Ok(())
}
