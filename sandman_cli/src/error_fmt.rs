//! Human-readable error descriptions and structured JSON error formatting.

use crate::error::CliError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use sandman_core::error::{BuildError, SandmanError};

    // Typed matches first
    if let Some(ce) = err.downcast_ref::<CliError>() {
        return match ce {
            CliError::ConfigRead { path, source } => format!(
                "What happened: Could not read the config file {path:?} ({source}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with the path to a readable sandman TOML file."
            ),
            CliError::ConfigParse { message, .. } => format!(
                "What happened: The config file is not valid TOML for sandman ({message}).\nLikely causes: A typo, a wrong value type, or an unknown action string.\nHow to fix: Edit the TOML config and try again; `sandman --check-config` validates without starting."
            ),
            CliError::ConfigInvalid(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range timings, an actuator with the same up and down pin, or a bad name.\nHow to fix: Edit the [controls] section of the config, then rerun."
            ),
            CliError::DaemonUnreachable { socket, source } => format!(
                "What happened: No sandman daemon answered on {socket:?} ({source}).\nLikely causes: The daemon is not running, or it uses a different [paths] socket.\nHow to fix: Start it with `sandman --daemon` using the same --config."
            ),
            CliError::Socket { socket, source } => format!(
                "What happened: Could not listen on the command socket {socket:?} ({source}).\nLikely causes: Another daemon is running, or the directory is not writable.\nHow to fix: Stop the other daemon with `sandman --shutdown`, or change [paths] socket."
            ),
            CliError::Daemonize(msg) => format!(
                "What happened: Could not detach into the background ({msg}).\nLikely causes: Process limits or an unsupported platform.\nHow to fix: Run in the foreground without --daemon, or check system limits."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPins => {
                "What happened: No relay outputs were provided to the controller.\nLikely causes: GPIO failed to initialize or was not wired into the builder.\nHow to fix: Ensure the GPIO driver is created successfully and passed via with_pins(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sandman.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SandmanError>() {
        return format!(
            "What happened: {se}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from hardware init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("gpio") {
        return "What happened: Failed to initialize the relay GPIO.\nLikely causes: Not running on a Raspberry Pi or insufficient GPIO permissions.\nHow to fix: Run on the target board as a user in the gpio group, or build without the hardware feature to simulate.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration problems, 3 when the daemon is unreachable, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use sandman_core::error::BuildError;
    if let Some(ce) = err.downcast_ref::<CliError>() {
        return match ce {
            CliError::ConfigRead { .. }
            | CliError::ConfigParse { .. }
            | CliError::ConfigInvalid(_) => 2,
            CliError::DaemonUnreachable { .. } => 3,
            CliError::Socket { .. } | CliError::Daemonize(_) => 1,
        };
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 2;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<CliError>() {
        Some(CliError::ConfigRead { .. }) => "ConfigRead",
        Some(CliError::ConfigParse { .. }) => "ConfigParse",
        Some(CliError::ConfigInvalid(_)) => "ConfigInvalid",
        Some(CliError::DaemonUnreachable { .. }) => "DaemonUnreachable",
        Some(CliError::Socket { .. }) => "Socket",
        Some(CliError::Daemonize(_)) => "Daemonize",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unreachable_daemon_maps_to_three() {
        let err = eyre::Report::new(CliError::DaemonUnreachable {
            socket: PathBuf::from("/tmp/x.sock"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(exit_code_for_error(&err), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "DaemonUnreachable");
        assert!(v["message"].as_str().unwrap().contains("sandman --daemon"));
    }

    #[test]
    fn invalid_build_config_maps_to_two() {
        let err = eyre::Report::new(sandman_core::BuildError::InvalidConfig("x".into()));
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).starts_with("What happened: Invalid configuration"));
    }

    #[test]
    fn untyped_errors_fall_back_to_generic() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("Original: boom"));
    }
}
