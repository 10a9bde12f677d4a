#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod backend;
mod cli;
mod commands;
mod error_fmt;
mod logging;

use clap::Parser;
use std::path::Path;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{ConfigError, exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn load_config(path: &Path) -> eyre::Result<transducer_config::Config> {
    let config_error = |msg: String| ConfigError {
        path: path.display().to_string(),
        msg,
    };
    let text = std::fs::read_to_string(path).map_err(|e| config_error(format!("read: {e}")))?;
    let cfg = transducer_config::load_toml(&text).map_err(|e| config_error(e.to_string()))?;
    cfg.validate().map_err(|e| config_error(e.to_string()))?;
    Ok(cfg)
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.cmd {
        Commands::Run {
            port,
            duration_ms,
            enable,
        } => commands::run(&cfg, port.as_deref(), duration_ms, &enable),
        Commands::Calibrate { port } => commands::calibrate(&cfg, port.as_deref()),
        Commands::Show => commands::show(&cfg, cli.json),
        Commands::Import { file, dry_run } => commands::import(&cfg, &file, dry_run, cli.json),
        Commands::Monitor { port, count } => commands::monitor(&cfg, port.as_deref(), count),
        Commands::SelfCheck => commands::self_check(&cfg),
    }
}
