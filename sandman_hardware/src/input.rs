//! Linux evdev input (`/dev/input/event*`) read without blocking the tick.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sandman_traits::{DeviceNotice, InputSource, KeyEvent};
use tracing::{info, warn};

/// Minimum time between attempts to reopen a failed device.
pub const REOPEN_DELAY: Duration = Duration::from_millis(1000);

const EV_KEY: u16 = 0x01;
const EVENTS_PER_READ: usize = 64;

const EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();
const TYPE_OFFSET: usize = std::mem::size_of::<libc::timeval>();

/// Decode whole `input_event` records from `buf`, keeping only `EV_KEY`
/// events. A trailing partial record is ignored.
pub fn decode_events(buf: &[u8]) -> Vec<KeyEvent> {
    buf.chunks_exact(EVENT_SIZE)
        .filter_map(|raw| {
            let ty = u16::from_ne_bytes([raw[TYPE_OFFSET], raw[TYPE_OFFSET + 1]]);
            if ty != EV_KEY {
                return None;
            }
            let code = u16::from_ne_bytes([raw[TYPE_OFFSET + 2], raw[TYPE_OFFSET + 3]]);
            let value = i32::from_ne_bytes([
                raw[TYPE_OFFSET + 4],
                raw[TYPE_OFFSET + 5],
                raw[TYPE_OFFSET + 6],
                raw[TYPE_OFFSET + 7],
            ]);
            Some(KeyEvent { code, value })
        })
        .collect()
}

/// Size of one raw event record on this platform.
pub const fn event_size() -> usize {
    EVENT_SIZE
}

pub struct EventDevice {
    path: PathBuf,
    file: Option<File>,
    last_failure: Option<Instant>,
    // Set on a failure, cleared on the next successful open.
    has_failed: bool,
    notices: Vec<DeviceNotice>,
}

impl EventDevice {
    /// The device is opened lazily on the first poll.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            last_failure: None,
            has_failed: false,
            notices: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self, now: Instant) {
        if self.has_failed
            && let Some(at) = self.last_failure
            && now.saturating_duration_since(at) < REOPEN_DELAY
        {
            return;
        }
        match OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
        {
            Ok(f) => {
                info!(device = %self.path.display(), "input device opened");
                self.file = Some(f);
                self.has_failed = false;
                self.notices.push(DeviceNotice::Connected);
            }
            Err(e) => {
                self.last_failure = Some(now);
                self.fail(&format!("open failed: {e}"));
            }
        }
    }

    fn fail(&mut self, reason: &str) {
        self.file = None;
        if self.has_failed {
            return;
        }
        self.has_failed = true;
        warn!(device = %self.path.display(), reason, "input device unavailable");
        self.notices.push(DeviceNotice::Disconnected);
    }
}

impl InputSource for EventDevice {
    fn poll(&mut self, now: Instant) -> Vec<KeyEvent> {
        if self.file.is_none() {
            self.open(now);
        }
        let Some(file) = self.file.as_mut() else {
            return Vec::new();
        };
        let mut buf = [0u8; EVENT_SIZE * EVENTS_PER_READ];
        match file.read(&mut buf) {
            Ok(n) => decode_events(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Vec::new(),
            Err(e) => {
                self.last_failure = Some(now);
                self.fail(&format!("read failed: {e}"));
                Vec::new()
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.file.is_some()
    }

    fn take_notice(&mut self) -> Option<DeviceNotice> {
        if self.notices.is_empty() {
            None
        } else {
            Some(self.notices.remove(0))
        }
    }
}
