// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod client;

use clap::Parser;
use std::path::PathBuf;

/// Toy transformer server
#[derive(Parser, Debug)]
#[command(name = "toy-transformer")]
#[command(version)]
#[command(about = "Turns uploaded photos into toy renditions", long_about = None)]
pub struct ServerArgs {
    /// TOML configuration file
    #[arg(long, env = "TOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind address (overrides config and TOY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides config and TOY_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Toy transformer upload client
#[derive(Parser, Debug)]
#[command(name = "toy-client")]
#[command(version)]
#[command(about = "Upload a photo to a toy transformer server", long_about = None)]
pub struct ClientArgs {
    /// Photo to transform
    pub file: PathBuf,

    /// Server base URL
    #[arg(long, env = "TOY_SERVER_URL", default_value = "http://127.0.0.1:8000")]
    pub server: String,

    /// Where to write the generated image (defaults to `<stem>_toy.<ext>` next to the input)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 500)]
    pub timeout_secs: u64,
}
