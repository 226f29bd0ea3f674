use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path:?}: {message}")]
    ConfigParse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("daemon not reachable at {socket:?}: {source}")]
    DaemonUnreachable {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("command socket {socket:?}: {source}")]
    Socket {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("daemonize: {0}")]
    Daemonize(String),
}
