//! Background mode: detach from the terminal and serve the command socket.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sandman_core::command::{COMMAND_BUFFER_LEN, truncate_to_buffer};

use crate::error::CliError;

/// Socket literal that stops the daemon.
pub const SHUTDOWN_MESSAGE: &str = "shutdown";

const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Fork into the background. Returns in the child only; the parent exits.
pub fn daemonize() -> eyre::Result<()> {
    use nix::sys::stat::{Mode, umask};
    use nix::unistd::{ForkResult, chdir, dup2, fork, setsid};

    // SAFETY: no other threads exist yet; the child only continues our own code.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            println!("sandman daemon started (pid {child})");
            std::process::exit(0);
        }
        Ok(ForkResult::Child) => {}
        Err(e) => return Err(eyre::Report::new(CliError::Daemonize(format!("fork: {e}")))),
    }

    umask(Mode::empty());
    setsid().map_err(|e| eyre::Report::new(CliError::Daemonize(format!("setsid: {e}"))))?;
    chdir("/").map_err(|e| eyre::Report::new(CliError::Daemonize(format!("chdir: {e}"))))?;

    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|e| eyre::Report::new(CliError::Daemonize(format!("open /dev/null: {e}"))))?;
    for fd in 0..=2 {
        dup2(null.as_raw_fd(), fd)
            .map_err(|e| eyre::Report::new(CliError::Daemonize(format!("redirect fd {fd}: {e}"))))?;
    }
    Ok(())
}

/// Non-blocking listener; one message per connection.
#[derive(Debug)]
pub struct CommandSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl CommandSocket {
    /// Bind at `path`, replacing a stale socket file left by an earlier run.
    pub fn bind(path: &Path) -> eyre::Result<Self> {
        let socket_err = |source| {
            eyre::Report::new(CliError::Socket {
                socket: path.to_path_buf(),
                source,
            })
        };
        if UnixStream::connect(path).is_ok() {
            return Err(socket_err(std::io::Error::new(
                ErrorKind::AddrInUse,
                "another daemon is listening",
            )));
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(socket = ?path, "removed stale socket"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(socket_err(e)),
        }
        let listener = UnixListener::bind(path).map_err(socket_err)?;
        listener.set_nonblocking(true).map_err(socket_err)?;
        tracing::info!(socket = ?path, "listening for commands");
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept at most one pending connection and read its message.
    pub fn poll(&self) -> Option<String> {
        let mut stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                return None;
            }
        };
        // Accepted sockets may inherit non-blocking mode.
        let _ = stream.set_nonblocking(false);
        let _ = stream.set_read_timeout(Some(READ_TIMEOUT));

        let mut buf = Vec::with_capacity(COMMAND_BUFFER_LEN);
        let mut chunk = [0u8; COMMAND_BUFFER_LEN];
        while buf.len() < COMMAND_BUFFER_LEN {
            match stream.read(&mut chunk[..COMMAND_BUFFER_LEN - buf.len()]) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    if buf.is_empty() {
                        tracing::warn!(error = %e, "reading command failed");
                        return None;
                    }
                    break;
                }
            }
        }
        let text = String::from_utf8_lossy(&buf);
        let message = truncate_to_buffer(text.trim_end_matches(['\0', '\r', '\n'])).to_string();
        tracing::info!(message = %message, "received socket message");
        Some(message)
    }
}

impl Drop for CommandSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Deliver one message to the daemon listening at `path`.
pub fn send(path: &Path, message: &str) -> eyre::Result<()> {
    let unreachable = |source| {
        eyre::Report::new(CliError::DaemonUnreachable {
            socket: path.to_path_buf(),
            source,
        })
    };
    let mut stream = UnixStream::connect(path).map_err(unreachable)?;
    stream
        .write_all(truncate_to_buffer(message).as_bytes())
        .map_err(unreachable)?;
    tracing::debug!(socket = ?path, message, "sent");
    Ok(())
}
