#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod daemon;
mod devices;
mod error;
mod error_fmt;
mod logging;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::Result;
use sandman_config::{Config, Logging};
use sandman_core::Sandman;

use crate::cli::{Cli, JSON_MODE, Mode};
use crate::daemon::CommandSocket;
use crate::error::CliError;
use crate::logging::LogSetup;
use crate::session::Source;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(&cli) {
        tracing::error!(error = %err, "sandman failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg = sandman_config::load_toml(&text).map_err(|e| CliError::ConfigParse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    cfg.validate()
        .map_err(|e| CliError::ConfigInvalid(e.to_string()))?;
    // The daemon changes directory to `/`.
    cfg.paths.data_dir = absolute(&cfg.paths.data_dir);
    cfg.paths.socket = absolute(&cfg.paths.socket);
    Ok(cfg)
}

fn absolute(p: &Path) -> PathBuf {
    std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf())
}

fn init_console_logging(cli: &Cli, logging: &Logging) {
    logging::init(&LogSetup {
        json: cli.json,
        level: cli.log_level.as_deref(),
        logging,
        console: true,
        fallback_file: None,
    });
}

fn run(cli: &Cli) -> Result<()> {
    let mode = cli.mode();
    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_console_logging(cli, &Logging::default());
            return Err(e);
        }
    };

    match mode {
        Mode::CheckConfig => {
            init_console_logging(cli, &cfg.logging);
            println!(
                "config ok: {} actuator(s), {} binding(s)",
                cfg.controls.actuators.len(),
                cfg.input.bindings.len()
            );
            Ok(())
        }
        Mode::Shutdown => {
            init_console_logging(cli, &cfg.logging);
            daemon::send(&cfg.paths.socket, daemon::SHUTDOWN_MESSAGE)?;
            println!("shutdown sent");
            Ok(())
        }
        Mode::Command(text) => {
            init_console_logging(cli, &cfg.logging);
            daemon::send(&cfg.paths.socket, &text)?;
            println!("sent: {text}");
            Ok(())
        }
        Mode::Daemon => {
            // Bind before detaching so a busy socket is reported on the terminal.
            let socket = CommandSocket::bind(&cfg.paths.socket)?;
            daemon::daemonize()?;
            logging::init(&LogSetup {
                json: cli.json,
                level: cli.log_level.as_deref(),
                logging: &cfg.logging,
                console: false,
                fallback_file: Some(cfg.paths.data_dir.join("sandman.log")),
            });
            tracing::info!(pid = std::process::id(), socket = ?socket.path(), "daemon running");
            serve(&cfg, &Source::Socket(socket))
        }
        Mode::Interactive => {
            init_console_logging(cli, &cfg.logging);
            let keyboard = session::spawn_keyboard()?;
            serve(&cfg, &Source::Keyboard(keyboard))
        }
    }
}

fn serve(cfg: &Config, source: &Source) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let devices = devices::open(cfg)?;
    let mut builder = Sandman::builder()
        .with_boxed_pins(devices.pins)
        .with_boxed_power(devices.power);
    if let Some(input) = devices.input {
        builder = builder.with_boxed_input(input);
    }
    let mut app = builder.build(cfg)?;
    tracing::info!(
        actuators = app.registry().len(),
        data_dir = ?cfg.paths.data_dir,
        "sandman ready"
    );
    session::run(&mut app, source, &stop);
    Ok(())
}
