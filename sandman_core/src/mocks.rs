//! Test and helper mocks for sandman_core

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use sandman_traits::Notifier;

use crate::reports::{ReportEvent, ReportSink};

/// Records every notification id.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub ids: Vec<String>,
    pub finished: Option<Instant>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ids)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, id: &str) {
        self.ids.push(id.to_string());
    }

    fn last_finished(&self) -> Option<Instant> {
        self.finished
    }
}

/// Collects report events; clones share the list.
#[derive(Debug, Clone, Default)]
pub struct ReportSpy {
    events: Rc<RefCell<Vec<ReportEvent>>>,
}

impl ReportSpy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.borrow().clone()
    }
}

impl ReportSink for ReportSpy {
    fn add(&mut self, event: ReportEvent) {
        self.events.borrow_mut().push(event);
    }
}
