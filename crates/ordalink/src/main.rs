// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordalink - multi-tenant webhook CRM core.
//!
//! Binary entry point: loads and validates configuration, then dispatches
//! to the requested subcommand.

use clap::{Parser, Subcommand};

mod serve;

/// Ordalink - multi-tenant webhook CRM core.
#[derive(Parser, Debug)]
#[command(name = "ordalink", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Ordalink server.
    Serve,
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ordalink_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            ordalink_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("ordalink serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("ordalink: use --help for available commands");
        }
    }
}
