//! CLI argument definitions and shared statics.

use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "sandman", version, about = "Motorized bed controller")]
#[command(group(
    ArgGroup::new("mode")
        .args(["daemon", "shutdown", "command", "check_config"])
        .multiple(false)
))]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/sandman.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); defaults to [logging] level, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Detach and serve commands on the Unix socket
    #[arg(long, action = ArgAction::SetTrue)]
    pub daemon: bool,

    /// Ask a running daemon to exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub shutdown: bool,

    /// Send one command to a running daemon; underscores stand for spaces
    #[arg(long, value_name = "TEXT")]
    pub command: Option<String>,

    /// Load and validate the config, then exit
    #[arg(long = "check-config", action = ArgAction::SetTrue)]
    pub check_config: bool,
}

/// What this invocation does, from the mutually exclusive mode flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    Daemon,
    Shutdown,
    Command(String),
    CheckConfig,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.daemon {
            Mode::Daemon
        } else if self.shutdown {
            Mode::Shutdown
        } else if let Some(text) = &self.command {
            Mode::Command(text.replace('_', " "))
        } else if self.check_config {
            Mode::CheckConfig
        } else {
            Mode::Interactive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sandman").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_underscores_become_spaces() {
        assert_eq!(
            parse(&["--command=back_raise_50"]).mode(),
            Mode::Command("back raise 50".into())
        );
    }

    #[test]
    fn no_mode_flag_is_interactive() {
        let cli = parse(&[]);
        assert_eq!(cli.mode(), Mode::Interactive);
        assert_eq!(cli.config, PathBuf::from("etc/sandman.toml"));
    }

    #[test]
    fn mode_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["sandman", "--daemon", "--shutdown"]).is_err());
    }
}
