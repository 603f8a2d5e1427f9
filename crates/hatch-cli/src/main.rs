// ABOUTME: CLI entry point for hatch commands.
// ABOUTME: Dispatches to init, replay, send, run, history and reset.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hatch_cli::effects::TerminalEffects;
use hatch_cli::render::render_blocks;
use hatch_core::source::CliSource;
use hatch_core::{
    build_blocks, spawn_debounced_writer, ChatSession, Config, EventSource, HttpSource, Locale,
    MessageStore, ReplaySource, StreamHandle, Termination, TurnContext,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hatch")]
#[command(about = "Stream AI agent turns as plain-language activity")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to ~/.config/hatch/cli/cli.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config file
    Init,

    /// Feed a recorded transcript (SSE body or stream-json lines) through the pipeline
    Replay {
        /// Transcript file
        file: PathBuf,

        /// Status language: "en" or "he"
        #[arg(short, long)]
        locale: Option<Locale>,
    },

    /// Send a prompt to the configured HTTP endpoint
    Send {
        prompt: String,

        /// Project whose conversation is loaded and saved
        #[arg(short, long)]
        project: Option<String>,

        /// Status language: "en" or "he"
        #[arg(short, long)]
        locale: Option<Locale>,

        /// Agent endpoint (overrides config)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Spawn the agent CLI directly for one turn
    Run {
        prompt: String,

        /// Project whose conversation is loaded and saved
        #[arg(short, long)]
        project: Option<String>,

        /// Agent session to resume
        #[arg(long)]
        resume: Option<String>,

        /// Status language: "en" or "he"
        #[arg(short, long)]
        locale: Option<Locale>,

        /// Working directory for the agent
        #[arg(short, long)]
        working_dir: Option<PathBuf>,
    },

    /// Print a project's stored conversation
    History {
        project: String,

        /// Print blocks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a project's stored conversation
    Reset { project: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if cli.log_file {
        if let Some(path) = hatch_log::init_file("cli") {
            eprintln!("Logging to {}", path.display());
        }
    } else if cli.verbose {
        hatch_log::init(true);
    } else {
        hatch_log::init_for("hatch-core");
    }

    match cli.command {
        Commands::Init => run_init(),
        Commands::Replay { file, locale } => {
            let config = Config::load()?;
            let turn = Turn {
                prompt: format!("(replay of {})", file.display()),
                project: None,
                resume: None,
                locale: locale.unwrap_or(config.ui.locale),
            };
            stream_turn(&config, &ReplaySource::new(file), turn).await
        }
        Commands::Send {
            prompt,
            project,
            locale,
            endpoint,
        } => {
            let config = Config::load()?;
            let Some(endpoint) = endpoint.or_else(|| config.agent.endpoint.clone()) else {
                bail!("No agent endpoint configured. Set [agent].endpoint, HATCH_ENDPOINT, or pass --endpoint");
            };
            let turn = Turn {
                prompt,
                project,
                resume: None,
                locale: locale.unwrap_or(config.ui.locale),
            };
            stream_turn(&config, &HttpSource::new(endpoint), turn).await
        }
        Commands::Run {
            prompt,
            project,
            resume,
            locale,
            working_dir,
        } => {
            let config = Config::load()?;
            let mut cli_config = config.cli();
            if let Some(dir) = working_dir {
                cli_config.working_dir = dir;
            }
            let turn = Turn {
                prompt,
                project,
                resume,
                locale: locale.unwrap_or(config.ui.locale),
            };
            stream_turn(&config, &CliSource::new(cli_config), turn).await
        }
        Commands::History { project, json } => run_history(&project, json).await,
        Commands::Reset { project } => run_reset(&project).await,
    }
}

fn run_init() -> Result<()> {
    let path = Config::init()?;
    println!("Config: {}", path.display());
    Ok(())
}

struct Turn {
    prompt: String,
    project: Option<String>,
    resume: Option<String>,
    locale: Locale,
}

/// Stream one turn from `source`, persisting to the project log if one is named.
async fn stream_turn(config: &Config, source: &dyn EventSource, turn: Turn) -> Result<()> {
    let mut session = ChatSession::new(turn.locale);
    let mut writer = None;

    if let Some(project) = &turn.project {
        let store = MessageStore::new(config.messages_dir());
        let history = store
            .load(project)
            .await
            .with_context(|| format!("Failed to load history for {project}"))?;
        tracing::info!(project = %project, messages = history.len(), "Loaded history");
        session = session.with_project(project.clone());
        session.load(history);
        writer = Some(spawn_debounced_writer(
            store,
            project.clone(),
            config.debounce(),
        ));
    }
    if let Some(session_id) = &turn.resume {
        session.set_session_id(session_id);
    }

    let handle = StreamHandle::new();
    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling...");
                handle.cancel();
            }
        })
    };

    let mut effects = TerminalEffects::new();
    let termination = session
        .run_turn(
            source,
            &turn.prompt,
            vec![],
            TurnContext {
                effects: &mut effects,
                persist: writer.as_ref().map(|(persist, _)| persist),
                handle: &handle,
            },
        )
        .await;
    interrupt.abort();

    if let Some((persist, task)) = writer {
        if let Err(e) = persist.flush_now().await {
            tracing::error!(error = %e, "Failed to save conversation");
        }
        drop(persist);
        let _ = task.await;
    }

    print!("{}", render_blocks(session.blocks()));
    if let Some(summary) = effects.summary() {
        eprintln!("{summary}");
    }
    if let Some(session_id) = session.session_id() {
        eprintln!("Session: {session_id}");
    }

    match termination {
        Termination::Done => Ok(()),
        Termination::Cancelled => {
            eprintln!("Cancelled.");
            Ok(())
        }
        Termination::Failed => bail!("Agent turn failed via {}", source.name()),
    }
}

async fn run_history(project: &str, json: bool) -> Result<()> {
    let config = Config::load()?;
    let store = MessageStore::new(config.messages_dir());
    let messages = store
        .load(project)
        .await
        .with_context(|| format!("Failed to load history for {project}"))?;
    let blocks = build_blocks(&messages);

    if json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else if blocks.is_empty() {
        println!("No conversation stored for {project}");
    } else {
        print!("{}", render_blocks(&blocks));
    }
    Ok(())
}

async fn run_reset(project: &str) -> Result<()> {
    let config = Config::load()?;
    MessageStore::new(config.messages_dir())
        .clear(project)
        .await
        .with_context(|| format!("Failed to clear history for {project}"))?;
    println!("Cleared conversation for {project}");
    Ok(())
}
