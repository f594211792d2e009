// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod placeholders;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir Placeholder CLI
#[derive(Parser, Debug)]
#[command(name = "placeholder-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Generate blurred image placeholders locally", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate placeholders for local image files
    Generate(placeholders::GenerateArgs),

    /// Download images by URL and generate placeholders
    Fetch(placeholders::FetchArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate(args) => placeholders::generate(args).await,
        Commands::Fetch(args) => placeholders::fetch(args).await,
    }
}
