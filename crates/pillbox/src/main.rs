// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pillbox - medication reminder scheduling and delivery.
//!
//! This is the binary entry point for the Pillbox service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
#[cfg(not(target_env = "msvc"))]
mod memory;
mod serve;
mod shutdown;
mod sweep;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pillbox_config::PillboxConfig;

/// Pillbox - medication reminder scheduling and delivery.
#[derive(Parser, Debug)]
#[command(name = "pillbox", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reminder loop, expiry reaper and gateway.
    Serve,
    /// Load and validate configuration, then print a summary.
    Check,
    /// Delete expired notifications once and exit.
    Sweep,
}

fn load_config(path: Option<&std::path::Path>) -> PillboxConfig {
    let loaded = match path {
        Some(path) => pillbox_config::load_and_validate_path(path),
        None => pillbox_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            pillbox_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check) => {
            check::run_check(&config);
            Ok(())
        }
        Some(Commands::Sweep) => sweep::run_sweep(config).await,
        None => {
            println!("pillbox: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
