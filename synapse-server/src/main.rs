// Copyright 2025 Synapse Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use synapse_server::{
    config::{LogFormat, ServerConfig},
    run_server,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "SYNAPSE_HTTP_ADDR")]
    http_addr: Option<String>,

    /// Directory uploads are written under (overrides config file)
    #[arg(long, env = "SYNAPSE_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.http_addr {
        config.server.listen_addr = addr;
    }
    if let Some(dir) = args.public_dir {
        config.storage.public_dir = dir;
    }
    if args.json_logs {
        config.server.log_format = LogFormat::Json;
    }

    run_server(config).await
}
