// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use tracing::error;

use atrium::{agent, login, logout, status};
use atrium_session::config::SessionConfig;

/// Command-line client for the atrium learning platform.
#[derive(Debug, Parser)]
#[command(name = "atrium", version, about)]
struct Cli {
    /// Log filter (e.g. "info", "atrium=debug").
    #[arg(long, default_value = "info", env = "ATRIUM_LOG")]
    log_level: String,

    /// Log output format: "text" or "json".
    #[arg(long, default_value = "text", env = "ATRIUM_LOG_FORMAT")]
    log_format: String,

    #[command(flatten)]
    session: SessionConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store issued credentials and establish a session.
    Login(login::LoginArgs),
    /// Clear the session on this machine.
    Logout,
    /// Show the current session.
    Status,
    /// Run the session agent (watchdog + realtime feed) until interrupted.
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Login(args) => login::run(&cli.session, args),
        Command::Logout => logout::run(&cli.session),
        Command::Status => status::run(&cli.session),
        Command::Run => agent::run(&cli.session).await,
    }
}
