#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use clap::Parser;
use devserve_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "devserve")]
#[command(author, version, about = "Development module server with live updates", long_about = None)]
struct Cli {
    /// Project root (defaults to the working directory)
    root: Option<PathBuf>,

    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON formatted logs
    #[arg(long)]
    json: bool,

    /// Override the working directory
    #[arg(long, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Open browser automatically
    #[arg(long)]
    open: bool,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let root = match cli.root {
        Some(root) if root.is_absolute() => root,
        Some(root) => cwd.join(root),
        None => cwd,
    };

    logging::init(cli.verbose, cli.json);

    let action = commands::dev::DevAction {
        root,
        port: cli.port,
        host: cli.host,
        open: cli.open,
        config: cli.config,
    };

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    rt.block_on(commands::dev::run(action))
}
