//! typeview CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "typeview")]
#[command(version)]
#[command(about = "Live preview and PDF export for Typst templates", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template once and write the composited SVG
    Render {
        /// Template directory
        dir: PathBuf,

        /// Write SVG to FILE (default: <dir>/<main>.svg)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        engine: commands::EngineArgs,
    },

    /// Compile a template to PDF
    Export {
        /// Template directory
        dir: PathBuf,

        /// Write PDF to FILE (default: <dir>/document.pdf)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        engine: commands::EngineArgs,
    },

    /// Recompile whenever the template changes
    Watch {
        /// Template directory
        dir: PathBuf,

        /// Write SVG to FILE on every successful compile
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Debounce interval in milliseconds
        #[arg(long)]
        debounce: Option<u64>,

        #[command(flatten)]
        engine: commands::EngineArgs,
    },

    /// Show page placements and location links of a compiled template
    Inspect {
        /// Template directory
        dir: PathBuf,

        /// Zoom percentage (must be one of the configured levels)
        #[arg(long)]
        zoom: Option<u32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: commands::EngineArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "typeview=debug,typeview_core=debug"
    } else {
        "typeview=info,typeview_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Render {
            dir,
            output,
            engine,
        } => commands::render::execute(commands::render::RenderArgs {
            dir,
            output,
            engine,
        }),
        Commands::Export {
            dir,
            output,
            engine,
        } => commands::export::execute(commands::export::ExportArgs {
            dir,
            output,
            engine,
        }),
        Commands::Watch {
            dir,
            output,
            debounce,
            engine,
        } => commands::watch::execute(commands::watch::WatchArgs {
            dir,
            output,
            debounce,
            engine,
        }),
        Commands::Inspect {
            dir,
            zoom,
            json,
            engine,
        } => commands::inspect::execute(commands::inspect::InspectArgs {
            dir,
            zoom,
            json,
            engine,
        }),
    }
}
