//! Tracing subscriber setup: console layer, optional file layer.

use std::path::{Path, PathBuf};

use sandman_config::Logging;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::FILE_GUARD;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub struct LogSetup<'a> {
    pub json: bool,
    /// `--log-level`, which wins over the config.
    pub level: Option<&'a str>,
    pub logging: &'a Logging,
    /// Console output is off once stdio is detached.
    pub console: bool,
    /// Used when the config names no file.
    pub fallback_file: Option<PathBuf>,
}

fn appender(file: &Path, rotation: Option<&str>) -> RollingFileAppender {
    let dir = file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = file.file_name().map_or_else(|| "sandman.log".into(), |n| n.to_os_string());
    match rotation {
        Some("daily") => rolling::daily(dir, name),
        Some("hourly") => rolling::hourly(dir, name),
        _ => rolling::never(dir, name),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the computed level.
pub fn init(setup: &LogSetup<'_>) {
    let level = setup
        .level
        .or(setup.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if setup.console {
        let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
        layers.push(if setup.json {
            console.json().boxed()
        } else {
            console.boxed()
        });
    }

    let file = setup
        .logging
        .file
        .as_deref()
        .map(PathBuf::from)
        .or_else(|| setup.fallback_file.clone());
    if let Some(file) = file {
        if let Some(dir) = file.parent()
            && !dir.as_os_str().is_empty()
        {
            let _ = std::fs::create_dir_all(dir);
        }
        let (writer, guard) =
            tracing_appender::non_blocking(appender(&file, setup.logging.rotation.as_deref()));
        let _ = FILE_GUARD.set(guard);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(if setup.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();
}
