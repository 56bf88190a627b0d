//! Installer CLI.
//!
//! Replays a saved model transcript through the streaming classifier and acts
//! on whatever payload it carries, against the JSON file store configured in
//! `.installer/config.toml`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use installer::actions::run_actions;
use installer::core::catalog::SchemaCatalog;
use installer::core::classifier::StreamEvent;
use installer::core::mode::SessionMode;
use installer::core::planner::{InstallPlan, plan};
use installer::exit_codes;
use installer::install::Installer;
use installer::io::config::{DEFAULT_CONFIG_PATH, EngineConfig, load_config};
use installer::io::files::write_file_blocks;
use installer::io::media::{FallbackRotation, PassthroughMedia};
use installer::io::platform::Platform;
use installer::io::store::FileStore;
use installer::logging;
use installer::turn::{CompletedTurn, TurnPayload, drive_turn, replay};

#[derive(Parser)]
#[command(
    name = "installer",
    version,
    about = "Streaming extraction and dependency-ordered installation"
)]
struct Cli {
    /// Config file (TOML); defaults apply when it is missing.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Session mode; overrides `session.mode` from the config.
    #[arg(long, global = true)]
    mode: Option<SessionMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a transcript as a stream and show what a user would see.
    Classify {
        transcript: PathBuf,
        /// Characters per replayed chunk.
        #[arg(long, default_value_t = 16)]
        chunk_size: usize,
    },
    /// Print the ordered installation steps for a transcript.
    Plan { transcript: PathBuf },
    /// Install a transcript's schemas and records into the store.
    Install {
        transcript: PathBuf,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Execute a transcript's inline actions against the store.
    Act { transcript: PathBuf },
    /// Write a transcript's file blocks beneath a directory.
    Files {
        transcript: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    logging::init();
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(mode) = cli.mode {
        config.session.mode = mode;
    }
    match cli.command {
        Command::Classify {
            transcript,
            chunk_size,
        } => cmd_classify(&config, &transcript, chunk_size).await,
        Command::Plan { transcript } => cmd_plan(&config, &transcript).await,
        Command::Install { transcript, yes } => cmd_install(&config, &transcript, yes).await,
        Command::Act { transcript } => cmd_act(&config, &transcript).await,
        Command::Files { transcript, out } => cmd_files(&config, &transcript, &out).await,
    }
}

async fn cmd_classify(config: &EngineConfig, transcript: &Path, chunk_size: usize) -> Result<i32> {
    let text = read_transcript(transcript)?;
    let mut stdout = std::io::stdout();
    let turn = drive_turn(
        replay(&text, chunk_size),
        config.session.mode,
        &config.classifier,
        &mut |event| match event {
            StreamEvent::Text(text) => {
                print!("{text}");
                let _ = stdout.flush();
            }
            StreamEvent::FileDetected { index, path } => println!("[file {index}] {path}"),
            StreamEvent::Committed(_) => {}
        },
    )
    .await;
    if !turn.surfaced.is_empty() && !turn.surfaced.ends_with('\n') {
        println!();
    }
    println!("kind: {}", turn.kind);
    Ok(exit_codes::OK)
}

async fn cmd_plan(config: &EngineConfig, transcript: &Path) -> Result<i32> {
    let turn = read_turn(config, transcript).await?;
    let store = open_store(config)?;
    let Some(plan) = installation_plan(&turn, &store).await? else {
        eprintln!("no installation payload in {}", transcript.display());
        return Ok(exit_codes::NOTHING_TO_DO);
    };
    for line in plan.describe() {
        println!("{line}");
    }
    Ok(exit_codes::OK)
}

async fn cmd_install(config: &EngineConfig, transcript: &Path, yes: bool) -> Result<i32> {
    let turn = read_turn(config, transcript).await?;
    let store = open_store(config)?;
    let Some(plan) = installation_plan(&turn, &store).await? else {
        eprintln!("no installation payload in {}", transcript.display());
        return Ok(exit_codes::NOTHING_TO_DO);
    };
    for line in plan.describe() {
        println!("{line}");
    }
    if !yes && !confirm(&plan).await? {
        println!("cancelled");
        return Ok(exit_codes::CANCELLED);
    }

    let media = PassthroughMedia;
    let fallbacks = FallbackRotation::new(config.media.fallback_handles.clone());
    let mut installer = Installer::connect(&store, &media, fallbacks)
        .await
        .context("connect to store")?;
    let report = installer
        .install(plan, &mut |event| println!("{event}"))
        .await
        .context("install")?;
    for line in report.render() {
        println!("{line}");
    }
    Ok(if report.has_failures() {
        exit_codes::FAILURES
    } else {
        exit_codes::OK
    })
}

async fn cmd_act(config: &EngineConfig, transcript: &Path) -> Result<i32> {
    let turn = read_turn(config, transcript).await?;
    let TurnPayload::Actions(actions) = turn.payload() else {
        eprintln!("no actions in {}", transcript.display());
        return Ok(exit_codes::NOTHING_TO_DO);
    };
    let store = open_store(config)?;
    let media = PassthroughMedia;
    let fallbacks = FallbackRotation::new(config.media.fallback_handles.clone());
    let mut installer = Installer::connect(&store, &media, fallbacks)
        .await
        .context("connect to store")?;
    let outcomes = run_actions(&mut installer, actions, &mut |outcome| println!("{outcome}"))
        .await
        .context("run actions")?;
    Ok(if outcomes.iter().any(|outcome| outcome.is_failure()) {
        exit_codes::FAILURES
    } else {
        exit_codes::OK
    })
}

async fn cmd_files(config: &EngineConfig, transcript: &Path, out: &Path) -> Result<i32> {
    let turn = read_turn(config, transcript).await?;
    let TurnPayload::Files(blocks) = turn.payload() else {
        eprintln!("no file blocks in {}", transcript.display());
        return Ok(exit_codes::NOTHING_TO_DO);
    };
    for path in write_file_blocks(out, &blocks)? {
        println!("wrote {}", path.display());
    }
    Ok(exit_codes::OK)
}

fn read_transcript(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read transcript {}", path.display()))
}

/// Classify a transcript without printing anything.
async fn read_turn(config: &EngineConfig, transcript: &Path) -> Result<CompletedTurn> {
    let text = read_transcript(transcript)?;
    let chunk_size = text.len().max(1);
    Ok(drive_turn(
        replay(&text, chunk_size),
        config.session.mode,
        &config.classifier,
        &mut |_| {},
    )
    .await)
}

fn open_store(config: &EngineConfig) -> Result<FileStore> {
    FileStore::open(&config.store.path)
        .with_context(|| format!("open store {}", config.store.path.display()))
}

async fn installation_plan(turn: &CompletedTurn, store: &FileStore) -> Result<Option<InstallPlan>> {
    let TurnPayload::Installation { schemas, records } = turn.payload() else {
        return Ok(None);
    };
    let known = store.list_schemas().await.context("list schemas")?;
    let catalog = SchemaCatalog::from_existing(known);
    Ok(Some(plan(schemas, records, &catalog)))
}

async fn confirm(plan: &InstallPlan) -> Result<bool> {
    print!(
        "Install {} schemas and {} records? [y/N] ",
        plan.schema_count(),
        plan.record_count()
    );
    std::io::stdout().flush().context("flush stdout")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await.context("read confirmation")?;
    Ok(matches!(
        answer.as_deref().map(str::trim),
        Some("y" | "Y" | "yes" | "Yes")
    ))
}
