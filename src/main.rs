use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tagml::console::StdConsole;
use tagml::engine::{Clock, Engine, EngineConfig, RunSummary, SystemClock, VirtualClock};
use tagml::proxy::{HeadlessProxy, ScheduledInput};

// Bounds the loop when virtual time would otherwise spin forever.
const DEFAULT_VIRTUAL_TICKS: u64 = 1000;

#[derive(Parser)]
#[command(name = "tagml")]
#[command(author, version, about = "Tag markup GUI script interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and run a program against the headless widget toolkit
    Run {
        /// Source file; reads stdin when omitted
        file: Option<PathBuf>,

        /// Stop after this many forever ticks
        #[arg(short, long)]
        ticks: Option<u64>,

        /// YAML script of user input replayed into the widgets
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Wait the real interval between ticks
        #[arg(long)]
        realtime: bool,
    },

    /// Load a program and report diagnostics
    Check {
        /// Source file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Load a program and dump its syntax tree
    Ast {
        /// Source file; reads stdin when omitted
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            ticks,
            events,
            realtime,
        } => run(file.as_deref(), ticks, events.as_deref(), realtime),
        Commands::Check { file } => {
            let label = source_label(file.as_deref());
            load(file.as_deref())?;
            println!("{label}: ok");
            Ok(())
        }
        Commands::Ast { file } => {
            let program = load(file.as_deref())?;
            println!("{program:#?}");
            Ok(())
        }
    }
}

fn run(
    file: Option<&Path>,
    ticks: Option<u64>,
    events: Option<&Path>,
    realtime: bool,
) -> Result<()> {
    let program = load(file)?;
    let proxy = match events {
        Some(path) => HeadlessProxy::with_script(read_script(path)?),
        None => HeadlessProxy::new(),
    };

    let summary = if realtime {
        let config = EngineConfig {
            max_ticks: ticks,
            ..EngineConfig::default()
        };
        execute(program, proxy, SystemClock::new(), config)?
    } else {
        let config = EngineConfig {
            max_ticks: Some(ticks.unwrap_or(DEFAULT_VIRTUAL_TICKS)),
            ..EngineConfig::default()
        };
        execute(program, proxy, VirtualClock::new(), config)?
    };

    for error in &summary.errors {
        eprintln!("tick error: {error}");
    }
    Ok(())
}

fn execute<K: Clock>(
    program: tagml::ast::Program,
    proxy: HeadlessProxy,
    clock: K,
    config: EngineConfig,
) -> Result<RunSummary> {
    let mut engine = Engine::new(program, proxy, StdConsole, clock, config);
    engine.run().context("Program failed")
}

fn load(file: Option<&Path>) -> Result<tagml::ast::Program> {
    let source = read_source(file)?;
    tagml::load(&source).with_context(|| format!("Loading {}", source_label(file)))
}

fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            Ok(buffer)
        }
    }
}

fn read_script(path: &Path) -> Result<Vec<ScheduledInput>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("Parsing event script {}", path.display()))
}

fn source_label(file: Option<&Path>) -> String {
    file.map_or_else(|| "<stdin>".to_string(), |path| path.display().to_string())
}
