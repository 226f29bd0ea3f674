//! Unattended, cyclic movement schedules.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use sandman_config::RoutineStepCfg;
use sandman_traits::Notifier;

use crate::actuator::{Action, Mode};
use crate::error::RoutineError;
use crate::registry::ActuatorRegistry;
use crate::reports::{ReportEvent, ReportSink, ReportSource, ScheduleAction};
use crate::timer::Timer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineStep {
    /// How long the runner stays on this step before moving to the next one
    /// and dispatching its action.
    pub delay: Duration,
    pub control: String,
    pub action: Action,
}

impl RoutineStep {
    pub fn new(delay_sec: u64, control: &str, action: Action) -> Self {
        Self {
            delay: Duration::from_secs(delay_sec),
            control: control.to_string(),
            action,
        }
    }
}

impl From<RoutineStepCfg> for RoutineStep {
    fn from(c: RoutineStepCfg) -> Self {
        Self {
            delay: Duration::from_secs(c.delay_sec),
            control: c.control,
            action: c.action.into(),
        }
    }
}

impl fmt::Display for RoutineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.delay.as_secs();
        write!(
            f,
            "+{}h {:02}m {:02}s -> {}, {}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60,
            self.control,
            self.action.as_str()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routine {
    steps: Vec<RoutineStep>,
    source: ReportSource,
}

impl Routine {
    pub fn new(steps: Vec<RoutineStep>) -> Self {
        Self {
            steps,
            source: ReportSource::Routine,
        }
    }

    /// The schedule used when no routine file is present.
    pub fn builtin() -> Self {
        const HALF_HOUR: u64 = 30 * 60;
        Self {
            steps: vec![
                RoutineStep::new(HALF_HOUR, "legs", Action::Up),
                RoutineStep::new(HALF_HOUR, "legs", Action::Down),
                RoutineStep::new(HALF_HOUR, "back", Action::Up),
                RoutineStep::new(HALF_HOUR, "back", Action::Down),
            ],
            source: ReportSource::Schedule,
        }
    }

    /// Load `path`, falling back to [`Routine::builtin`] when it does not exist.
    pub fn load_or_builtin(path: &Path) -> Result<Self, RoutineError> {
        match sandman_config::load_routine(path) {
            Ok(Some(steps)) => {
                let steps = steps.into_iter().map(RoutineStep::from).collect();
                Ok(Self::new(steps))
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no routine file; using built-in schedule");
                Ok(Self::builtin())
            }
            Err(e) => Err(RoutineError::Load(e.to_string())),
        }
    }

    pub fn steps(&self) -> &[RoutineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// How moves dispatched from this routine are reported.
    pub fn report_source(&self) -> ReportSource {
        self.source
    }

    pub fn log_loaded(&self) {
        if self.steps.is_empty() {
            tracing::info!("schedule loaded: <empty>");
            return;
        }
        for step in &self.steps {
            tracing::info!(step = %step, "schedule step");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    index: usize,
    since: Timer,
}

/// Walks a routine, one step per elapsed delay, wrapping forever.
#[derive(Debug)]
pub struct RoutineRunner {
    routine: Routine,
    cursor: Option<Cursor>,
}

impl RoutineRunner {
    pub fn new(routine: Routine) -> Self {
        Self {
            routine,
            cursor: None,
        }
    }

    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor.map(|c| c.index)
    }

    /// Reports the request even when already running.
    pub fn start(
        &mut self,
        now: Instant,
        notifier: &mut dyn Notifier,
        reports: &mut dyn ReportSink,
    ) {
        reports.add(ReportEvent::Schedule {
            action: ScheduleAction::Start,
        });
        if self.cursor.is_some() {
            return;
        }
        self.cursor = Some(Cursor {
            index: 0,
            since: Timer::started_at(now),
        });
        notifier.notify("schedule_start");
        tracing::info!(steps = self.routine.len(), "schedule started");
    }

    /// Reports the request even when not running.
    pub fn stop(&mut self, notifier: &mut dyn Notifier, reports: &mut dyn ReportSink) {
        reports.add(ReportEvent::Schedule {
            action: ScheduleAction::Stop,
        });
        if self.cursor.take().is_none() {
            return;
        }
        notifier.notify("schedule_stop");
        tracing::info!("schedule stopped");
    }

    pub fn process(
        &mut self,
        now: Instant,
        registry: &mut ActuatorRegistry,
        reports: &mut dyn ReportSink,
    ) {
        let count = self.routine.len();
        let source = self.routine.source;
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        if count == 0 {
            return;
        }
        let Some(step) = self.routine.steps.get(cursor.index) else {
            cursor.index = 0;
            return;
        };
        if cursor.since.elapsed(now) < step.delay {
            return;
        }

        cursor.index = (cursor.index + 1) % count;
        cursor.since.restart(now);
        let index = cursor.index;
        let Some(next) = self.routine.steps.get(index) else {
            return;
        };

        let Some(handle) = registry.handle(&next.control) else {
            tracing::warn!(
                control = %next.control,
                index,
                "schedule control not found; moving on"
            );
            return;
        };
        if registry.set_desired_action(handle, next.action, Mode::Timed, 100) {
            reports.add(ReportEvent::Control {
                control: next.control.clone(),
                action: next.action,
                source,
            });
        }
        tracing::info!(index, "schedule moved to step");
    }
}
