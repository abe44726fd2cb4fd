//! prefcell CLI: inspect and edit file-backed preference stores.
//!
//! # Usage
//!
//! ```text
//! prefcell get settings retries
//! prefcell set settings retries 7 --kind int
//! prefcell --commit remove settings retries
//! prefcell dump settings
//! ```

mod command;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use command::Kind;


#[derive(Parser)]
#[command(name = "prefcell", version, about = "Inspect and edit preference stores")]
struct Cli {
    /// YAML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory, overriding the config.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Block until each write is persisted.
    #[arg(long, global = true)]
    commit: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one cell
    Get { store: String, cell: String },
    /// Write one cell
    Set {
        store: String,
        cell: String,
        value: String,
        #[arg(long, value_enum, default_value = "string")]
        kind: Kind,
    },
    /// Remove one cell
    Remove { store: String, cell: String },
    /// Print every cell as JSON
    Dump { store: String },
}


fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if let Err(e) = run(cli) {
        eprintln!("prefcell: {:#}", e);
        process::exit(1);
    }
}


fn run(cli: Cli) -> anyhow::Result<()> {
    let config = command::resolve_config(cli.config.as_deref(), cli.dir, cli.commit)?;
    match cli.command {
        Commands::Get { store, cell } => {
            let prefs = command::open(&config, &store)?;
            println!("{}", command::get(&prefs, &cell)?);
        }
        Commands::Set { store, cell, value, kind } => {
            let prefs = command::open(&config, &store)?;
            command::set(&prefs, &cell, &value, kind)?;
        }
        Commands::Remove { store, cell } => {
            let prefs = command::open(&config, &store)?;
            command::remove(&prefs, &cell)?;
        }
        Commands::Dump { store } => {
            let prefs = command::open(&config, &store)?;
            println!("{}", command::dump(&prefs)?);
        }
    }
    Ok(())
}
