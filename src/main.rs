//! cuesmith - subtitles from text-to-speech alignment
//!
//! Turns the character alignment returned by a TTS service into SRT
//! subtitles, optionally translated, and into FCPXML timelines.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cuesmith::alignment::Alignment;
use cuesmith::cli::{Args, Commands};
use cuesmith::config::Config;
use cuesmith::error::CuesmithError;
use cuesmith::progress::BarProgress;
use cuesmith::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "cuesmith.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // init-config writes defaults and must not depend on an existing file
    let mut config = match &args.command {
        Commands::InitConfig { .. } => Config::default(),
        _ => load_config(args.config.as_deref())?,
    };

    match args.command {
        Commands::Process { input, output_dir, outputs } => {
            outputs.apply(&mut config);
            let workflow = Workflow::new(config)?;
            let progress = BarProgress::new();

            let report = workflow.process_file(&input, output_dir.as_deref(), &progress).await?;
            for path in [&report.audio, &report.standard_srt, &report.word_srt, &report.translated_srt, &report.fcpxml]
                .into_iter()
                .flatten()
            {
                println!("{}", path.display());
            }
            for warning in &report.warnings {
                warn!("{}", warning);
            }
        }
        Commands::Batch { input_dir, output_dir, outputs } => {
            outputs.apply(&mut config);
            let workflow = Workflow::new(config)?;
            let progress = BarProgress::new();

            let summary = workflow
                .process_directory(&input_dir, output_dir.as_deref(), &progress)
                .await?;
            println!("Processed {} files, {} failed", summary.processed.len(), summary.failed.len());
            for (path, reason) in &summary.failed {
                println!("  {}: {}", path.display(), reason);
            }
        }
        Commands::Segment { input, output, mode, words_per_line, script } => {
            let words_per_line = words_per_line.unwrap_or(config.subtitle.words_per_line).max(1);
            let workflow = Workflow::new(config)?;
            let alignment = Alignment::from_file(&input).await?;
            let script = match script {
                Some(path) => Some(read_script(&path).await?),
                None => None,
            };

            let segments = workflow
                .segment_alignment(&alignment, mode.build_mode(words_per_line), script.as_deref(), &output)
                .await?;
            info!("Wrote {} cues to {}", segments.len(), output.display());
        }
        Commands::Translate { input, output, target_language, model } => {
            if let Some(language) = target_language {
                config.translate.target_language = language;
            }
            if let Some(model) = model {
                config.translate.model = model;
            }
            let workflow = Workflow::new(config)?;
            let progress = BarProgress::new();

            let outcome = workflow.translate_srt(&input, &output, &progress).await?;
            if !outcome.is_complete() {
                warn!(
                    "{} batches kept their original text; see the log for details",
                    outcome.failed_batches.len()
                );
            }
            info!("Translated subtitles saved: {}", output.display());
        }
        Commands::Fcpxml { source, translation, output, seamless, fps } => {
            config.fcpxml.seamless |= seamless;
            if let Some(fps) = fps {
                config.fcpxml.fps = fps.max(1);
            }
            let workflow = Workflow::new(config)?;
            let lanes: Vec<&Path> = translation.iter().map(PathBuf::as_path).collect();
            workflow.export_fcpxml(&source, &lanes, &output).await?;
            info!("FCPXML exported: {}", output.display());
        }
        Commands::InitConfig { output, force } => init_config(&output, force)?,
    }

    Ok(())
}

/// `--config`, else `./cuesmith.toml`, else defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(CuesmithError::Config(format!(
            "{} already exists; pass --force to overwrite",
            output.display()
        ))
        .into());
    }
    Config::default().save_to_file(output)?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}

async fn read_script(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CuesmithError::FileNotFound(path.display().to_string()).into());
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".cuesmith").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "cuesmith.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("cuesmith.log").display()
    );

    Ok(())
}
