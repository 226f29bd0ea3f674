//! Activity reports: one JSON-lines file per evening.
//!
//! A report "day" starts at 17:00 local time, so a night's activity lands in
//! a single file named for the following date. Items are buffered by
//! [`ReportSink::add`] and only hit the disk in [`ReportWriter::write_pending`].

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::Serialize;
use serde::ser::Serializer;

use crate::actuator::Action;

pub const REPORT_VERSION: u32 = 3;
/// Local hour at which a new report file begins.
pub const STARTING_HOUR: u32 = 17;
/// Items kept while no file can be opened; older ones are dropped.
const MAX_PENDING: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    Command,
    /// The built-in schedule.
    Schedule,
    /// A routine read from file or supplied by the caller.
    #[default]
    Routine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReportEvent {
    Control {
        control: String,
        #[serde(serialize_with = "action_name")]
        action: Action,
        source: ReportSource,
    },
    Schedule {
        action: ScheduleAction,
    },
    Status,
}

fn action_name<S: Serializer>(action: &Action, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(match action {
        Action::Stop => "stop",
        Action::Up => "move up",
        Action::Down => "move down",
    })
}

/// Where report items go.
pub trait ReportSink {
    fn add(&mut self, event: ReportEvent);

    /// Called once per tick; buffered sinks write here.
    fn process(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullReports;

impl ReportSink for NullReports {
    fn add(&mut self, _event: ReportEvent) {}
}

#[derive(Serialize)]
struct Header<'a> {
    version: u32,
    #[serde(rename = "startingTime")]
    starting_time: &'a str,
}

#[derive(Serialize)]
struct Item<'a> {
    #[serde(rename = "dateTime")]
    date_time: String,
    event: &'a ReportEvent,
}

const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S %Z";

/// The date a report file is named for: tomorrow once 17:00 has passed.
pub fn effective_date(at: &DateTime<Local>) -> NaiveDate {
    let today = at.date_naive();
    if at.hour() >= STARTING_HOUR {
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    } else {
        today
    }
}

/// 17:00 on the evening the report containing `at` began.
pub fn starting_time(at: &DateTime<Local>) -> String {
    let today = at.date_naive();
    let day = if at.hour() < STARTING_HOUR {
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    } else {
        today
    };
    let naive = day.and_time(NaiveTime::from_hms_opt(STARTING_HOUR, 0, 0).unwrap_or_default());
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => naive.format("%Y/%m/%d %H:%M:%S").to_string(),
    }
}

pub fn report_file_name(date: NaiveDate) -> String {
    format!("sandman{}.rpt", date.format("%Y-%m-%d"))
}

type TimeSource = Box<dyn Fn() -> DateTime<Local>>;

pub struct ReportWriter {
    dir: PathBuf,
    file: Option<BufWriter<File>>,
    date: Option<NaiveDate>,
    pending: Vec<(DateTime<Local>, ReportEvent)>,
    now: TimeSource,
}

impl std::fmt::Debug for ReportWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportWriter")
            .field("dir", &self.dir)
            .field("date", &self.date)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl ReportWriter {
    /// Reports go under `dir`, which is created if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_time_source(dir, Box::new(Local::now))
    }

    pub fn with_time_source(dir: impl Into<PathBuf>, now: TimeSource) -> Self {
        let mut writer = Self {
            dir: dir.into(),
            file: None,
            date: None,
            pending: Vec::new(),
            now,
        };
        if let Err(e) = fs::create_dir_all(&writer.dir) {
            tracing::warn!(
                dir = %writer.dir.display(),
                error = %e,
                "reports directory unavailable"
            );
        }
        writer.ensure_open();
        writer
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Path of the file currently open, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.date.map(|d| self.dir.join(report_file_name(d)))
    }

    /// Write and flush buffered items, then roll over to a new file if the
    /// report day changed.
    pub fn write_pending(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let mut failed = None;
            for (at, event) in &self.pending {
                let item = Item {
                    date_time: at.format(TIME_FORMAT).to_string(),
                    event,
                };
                let line = match serde_json::to_string(&item) {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(error = %e, "report item not serializable");
                        continue;
                    }
                };
                if let Err(e) = writeln!(file, "{line}") {
                    failed = Some(e);
                    break;
                }
            }
            let flushed = match failed {
                Some(e) => Err(e),
                None => file.flush(),
            };
            match flushed {
                Ok(()) => self.pending.clear(),
                Err(e) => {
                    tracing::warn!(error = %e, "report write failed; will reopen");
                    self.file = None;
                    self.date = None;
                }
            }
        }
        self.ensure_open();
    }

    fn ensure_open(&mut self) {
        let date = effective_date(&(self.now)());
        if self.file.is_some() && self.date == Some(date) {
            return;
        }
        if let Some(mut old) = self.file.take() {
            let _ = old.flush();
            tracing::info!(date = ?self.date, "closing report file");
        }
        self.date = None;

        let path = self.dir.join(report_file_name(date));
        let existed = path.exists();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "report file could not be opened"
                );
                return;
            }
        };
        tracing::info!(path = %path.display(), existed, "report file opened");
        let mut file = BufWriter::new(file);
        if !existed {
            let start = starting_time(&(self.now)());
            let header = Header {
                version: REPORT_VERSION,
                starting_time: &start,
            };
            let written = serde_json::to_string(&header)
                .map_err(std::io::Error::other)
                .and_then(|h| writeln!(file, "{h}"));
            if let Err(e) = written {
                tracing::warn!(path = %path.display(), error = %e, "report header not written");
            }
        }
        self.file = Some(file);
        self.date = Some(date);
    }
}

impl ReportSink for ReportWriter {
    fn add(&mut self, event: ReportEvent) {
        if self.pending.len() >= MAX_PENDING {
            tracing::warn!("report backlog full; dropping oldest item");
            self.pending.remove(0);
        }
        self.pending.push(((self.now)(), event));
    }

    fn process(&mut self) {
        self.write_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .earliest()
            .expect("valid local time")
    }

    #[test]
    fn day_rolls_over_at_five_pm() {
        let before = local(2024, 3, 10, 16, 59);
        let after = local(2024, 3, 10, 17, 0);
        assert_eq!(effective_date(&before), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(effective_date(&after), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn starting_time_is_previous_evening_before_five() {
        let morning = local(2024, 3, 10, 7, 30);
        assert!(starting_time(&morning).starts_with("2024/03/09 17:00:00"));
        let evening = local(2024, 3, 10, 22, 0);
        assert!(starting_time(&evening).starts_with("2024/03/10 17:00:00"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let control = ReportEvent::Control {
            control: "back".into(),
            action: Action::Up,
            source: ReportSource::Schedule,
        };
        assert_eq!(
            serde_json::to_string(&control).unwrap(),
            r#"{"type":"control","control":"back","action":"move up","source":"schedule"}"#
        );
        let routine = ReportEvent::Control {
            control: "legs".into(),
            action: Action::Down,
            source: ReportSource::Routine,
        };
        assert!(
            serde_json::to_string(&routine)
                .unwrap()
                .ends_with(r#""source":"routine"}"#)
        );
        assert_eq!(
            serde_json::to_string(&ReportEvent::Status).unwrap(),
            r#"{"type":"status"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReportEvent::Schedule {
                action: ScheduleAction::Stop
            })
            .unwrap(),
            r#"{"type":"schedule","action":"stop"}"#
        );
    }

    #[test]
    fn file_name_uses_iso_date() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(report_file_name(d), "sandman2024-01-05.rpt");
    }
}
