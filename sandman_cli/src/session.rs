//! The frame loop and its two command sources.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, TryRecvError};
use sandman_core::{ParseOutcome, Sandman};

use crate::daemon::{CommandSocket, SHUTDOWN_MESSAGE};

/// Keyboard literal that ends an interactive session.
pub const QUIT: &str = "quit";

pub enum Source {
    /// Lines read from stdin on a helper thread.
    Keyboard(Receiver<String>),
    Socket(CommandSocket),
}

enum Next {
    Idle,
    Text(String),
    Stop,
}

impl Source {
    fn next(&self) -> Next {
        match self {
            Self::Keyboard(rx) => match rx.try_recv() {
                Ok(line) if line.trim_end() == QUIT => Next::Stop,
                Ok(line) => Next::Text(line),
                Err(TryRecvError::Empty) => Next::Idle,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("keyboard input closed");
                    Next::Stop
                }
            },
            Self::Socket(socket) => match socket.poll() {
                Some(msg) if msg == SHUTDOWN_MESSAGE => Next::Stop,
                Some(msg) if msg.trim().is_empty() => Next::Idle,
                Some(msg) => Next::Text(msg),
                None => Next::Idle,
            },
        }
    }

    fn is_keyboard(&self) -> bool {
        matches!(self, Self::Keyboard(_))
    }
}

/// Start the stdin reader. The thread ends at EOF or once the receiver is gone.
pub fn spawn_keyboard() -> eyre::Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("keyboard".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn reply(outcome: ParseOutcome) -> String {
    match outcome {
        ParseOutcome::Success => "ok".to_string(),
        ParseOutcome::Invalid => "not understood".to_string(),
        ParseOutcome::MissingConfirmation(prompt) => format!("{prompt} (yes/no)"),
    }
}

/// Run frames until the source asks to stop, `stop` is raised, or the host reboots.
pub fn run(app: &mut Sandman, source: &Source, stop: &AtomicBool) {
    app.startup();
    let mut out = std::io::stdout();
    loop {
        let frame_start = app.now();
        if stop.load(Ordering::SeqCst) {
            tracing::info!("interrupted");
            break;
        }
        match source.next() {
            Next::Stop => break,
            Next::Text(text) => {
                let outcome = app.handle_text_command(&text);
                tracing::debug!(command = %text, ?outcome, "handled command");
                if source.is_keyboard() {
                    let _ = writeln!(out, "{}", reply(outcome));
                    let _ = out.flush();
                }
            }
            Next::Idle => {}
        }
        app.tick();
        if app.has_rebooted() {
            break;
        }
        app.pause(frame_start);
    }
    app.shutdown();
    tracing::info!("session ended");
}
