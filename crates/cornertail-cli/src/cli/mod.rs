//! CLI entry and dispatch.

use std::io::{Write, stdout};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cornertail_core::config::{Corner, DEFAULT_SHELL, OverlayConfig};
use cornertail_core::interrupt;
use cornertail_core::logging::{self, LogConfig, LogLevel};
use cornertail_core::pipeline::{DEFAULT_CHAR_LIMIT, DEFAULT_MAX_LINES, WrapConfig};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "cornertail")]
#[command(version)]
#[command(about = "Tail a shell command's output in a corner of the terminal")]
struct Cli {
    /// Corner to pin the overlay to
    #[arg(long, env = "CORNERTAIL_CORNER", default_value_t = Corner::TopRight)]
    corner: Corner,

    /// Number of wrapped lines kept on screen
    #[arg(
        long,
        env = "CORNERTAIL_MAX_LINES",
        default_value_t = DEFAULT_MAX_LINES as u16,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    max_lines: u16,

    /// Shell used to run the command (invoked as `<shell> -c <command>`)
    #[arg(long, env = "CORNERTAIL_SHELL", default_value = DEFAULT_SHELL)]
    shell: String,

    /// Write logs to this file (no logs are written otherwise)
    #[arg(long, env = "CORNERTAIL_LOG_FILE", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Command to run; all words are joined with spaces
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    fn command_line(&self) -> String {
        self.command.join(" ")
    }

    fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig {
            corner: self.corner,
            wrap: WrapConfig::new(DEFAULT_CHAR_LIMIT, usize::from(self.max_lines)),
            shell: self.shell.clone(),
            ..OverlayConfig::default()
        }
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            file: self.log_file.clone(),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let command_line = cli.command_line();
    if command_line.trim().is_empty() {
        Cli::command()
            .error(ErrorKind::InvalidValue, "the command must not be blank")
            .exit();
    }

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = logging::init(&cli.log_config())?;

    interrupt::init()?;

    let config = cli.overlay_config();
    debug!(?config, "configuration resolved");

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    let snapshot = rt.block_on(cornertail_tui::run_overlay(&config, &command_line))?;

    let mut out = stdout().lock();
    for line in snapshot {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
