//! The assembled controller and its tick loop.
//!
//! [`Sandman`] owns every component and is driven by calling [`Sandman::tick`]
//! from a single thread. Text commands from the local socket or the terminal
//! enter through [`Sandman::handle_text_command`]; voice commands arrive on the
//! dialogue [`Link`] and are drained during the tick.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use sandman_config::Config;
use sandman_traits::clock::{Clock, MonotonicClock};
use sandman_traits::{DeviceNotice, InputSource, Notifier, OutputPins, PowerControl};

use crate::actuator::{ActuatorConfig, GlobalSettings};
use crate::command::{CommandContext, Confirmation, Interpreter, ParseOutcome, Token, tokenize_text};
use crate::dialogue::{Dialogue, Link, SpeechNotifier};
use crate::error::{BuildError, Result};
use crate::hw_error::map_hw_error;
use crate::input::InputBindings;
use crate::reboot::RebootSequence;
use crate::registry::ActuatorRegistry;
use crate::reports::{ReportSink, ReportWriter};
use crate::routine::{Routine, RoutineRunner};

/// Target frame length for the daemon's tick loop (60 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

struct InputPort {
    source: Box<dyn InputSource>,
    bindings: InputBindings,
}

pub struct Sandman {
    clock: Box<dyn Clock>,
    registry: ActuatorRegistry,
    routine: RoutineRunner,
    interpreter: Interpreter,
    text_confirmation: Confirmation,
    speech: SpeechNotifier,
    dialogue: Dialogue,
    reports: Box<dyn ReportSink>,
    input: Option<InputPort>,
    power: Option<Box<dyn PowerControl>>,
    reboot: RebootSequence,
    rebooted: bool,
}

impl std::fmt::Debug for Sandman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandman")
            .field("registry", &self.registry)
            .field("routine", &self.routine)
            .field("dialogue", &self.dialogue)
            .field("reboot", &self.reboot)
            .finish_non_exhaustive()
    }
}

impl Sandman {
    /// Start building a controller.
    pub fn builder() -> SandmanBuilder<Missing> {
        SandmanBuilder::default()
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn registry(&self) -> &ActuatorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActuatorRegistry {
        &mut self.registry
    }

    pub fn routine(&self) -> &RoutineRunner {
        &self.routine
    }

    pub fn speech(&self) -> &SpeechNotifier {
        &self.speech
    }

    pub fn dialogue(&self) -> &Dialogue {
        &self.dialogue
    }

    pub fn is_reboot_armed(&self) -> bool {
        self.reboot.is_armed()
    }

    /// True once the host reboot has been requested.
    pub fn has_rebooted(&self) -> bool {
        self.rebooted
    }

    /// Whether a text command is waiting for yes/no.
    pub fn is_awaiting_confirmation(&self) -> bool {
        self.text_confirmation.is_awaiting()
    }

    /// Enable the actuators and announce readiness.
    pub fn startup(&mut self) {
        self.registry.set_enabled(true);
        self.routine.routine().log_loaded();
        self.speech.notify("initialized");
        tracing::info!(actuators = self.registry.len(), "sandman initialized");
    }

    /// Stop everything, write out pending reports, and release the pins.
    pub fn shutdown(&mut self) {
        tracing::info!("sandman shutting down");
        self.registry.set_enabled(false);
        let now = self.clock.now();
        self.registry.process_all(now, &mut self.speech);
        self.reports.process();
        self.registry.release_all();
    }

    /// Interpret one text command.
    ///
    /// A bare `yes`/`no` completes a held command; anything else cancels it.
    pub fn handle_text_command(&mut self, text: &str) -> ParseOutcome {
        let tokens = tokenize_text(text);
        tracing::info!(command = text.trim_end(), "text command received");
        let is_response = tokens.first().is_some_and(|t| t.is_confirmation());
        let Some(tokens) = self.text_confirmation.combine(tokens, is_response) else {
            return ParseOutcome::Invalid;
        };
        let now = self.clock.now();
        let outcome = self.interpret(&tokens, now);
        match outcome {
            ParseOutcome::MissingConfirmation(prompt) => {
                tracing::info!(prompt, "awaiting confirmation");
                self.text_confirmation.hold(tokens);
            }
            ParseOutcome::Invalid => tracing::info!("text command not understood"),
            ParseOutcome::Success => {}
        }
        outcome
    }

    /// One pass of the control loop.
    pub fn tick(&mut self) {
        let now = self.clock.now();

        while let Some(tokens) = self.dialogue.next_command(now, &mut self.speech) {
            let outcome = self.interpret(&tokens, now);
            self.dialogue.respond(tokens, outcome);
        }

        if let Some(port) = self.input.as_mut() {
            let events = port.source.poll(now);
            while let Some(notice) = port.source.take_notice() {
                match notice {
                    DeviceNotice::Connected => self.speech.notify("control_connected"),
                    DeviceNotice::Disconnected => self.speech.notify("control_disconnected"),
                }
            }
            port.bindings.apply(&events, &mut self.registry);
        }

        for (handle, t) in self.registry.process_all(now, &mut self.speech) {
            tracing::debug!(
                index = handle.index(),
                from = %t.from,
                to = %t.to,
                "actuator transition"
            );
        }
        self.routine.process(now, &mut self.registry, self.reports.as_mut());
        self.reports.process();
        self.dialogue.flush(now, &mut self.speech);

        if self.reboot.poll(now, self.speech.last_finished()) {
            self.request_reboot();
        }
    }

    /// Sleep off the remainder of a frame that began at `frame_start`.
    pub fn pause(&self, frame_start: Instant) {
        let spent = self.clock.now().saturating_duration_since(frame_start);
        if let Some(rest) = TICK_INTERVAL.checked_sub(spent) {
            self.clock.sleep(rest);
        }
    }

    fn interpret(&mut self, tokens: &[Token], now: Instant) -> ParseOutcome {
        let input_connected = self.input.as_ref().is_some_and(|p| p.source.is_connected());
        let mut ctx = CommandContext {
            now,
            registry: &mut self.registry,
            routine: &mut self.routine,
            notifier: &mut self.speech,
            reports: self.reports.as_mut(),
            reboot: &mut self.reboot,
            input_connected,
        };
        self.interpreter.parse(tokens, &mut ctx)
    }

    fn request_reboot(&mut self) {
        self.registry.set_enabled(false);
        // The host goes down before another tick runs.
        self.registry.all_outputs_low();
        self.reports.process();
        self.rebooted = true;
        match self.power.as_mut() {
            Some(power) => {
                tracing::warn!("rebooting host");
                if let Err(e) = power.reboot() {
                    tracing::error!(error = %map_hw_error(e.as_ref()), "reboot failed");
                }
            }
            None => tracing::warn!("reboot requested but no power control configured"),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Missing;
#[derive(Debug, Default)]
pub struct Set;

/// Type-state builder; `build()` is only available once pins are given.
pub struct SandmanBuilder<P> {
    pins: Option<Box<dyn OutputPins>>,
    clock: Option<Box<dyn Clock>>,
    routine: Option<Routine>,
    reports: Option<Box<dyn ReportSink>>,
    input: Option<Box<dyn InputSource>>,
    power: Option<Box<dyn PowerControl>>,
    link: Option<Link>,
    _p: PhantomData<P>,
}

impl<P> Default for SandmanBuilder<P> {
    fn default() -> Self {
        Self {
            pins: None,
            clock: None,
            routine: None,
            reports: None,
            input: None,
            power: None,
            link: None,
            _p: PhantomData,
        }
    }
}

impl SandmanBuilder<Missing> {
    pub fn with_pins(self, pins: impl OutputPins + 'static) -> SandmanBuilder<Set> {
        self.with_boxed_pins(Box::new(pins))
    }

    pub fn with_boxed_pins(self, pins: Box<dyn OutputPins>) -> SandmanBuilder<Set> {
        SandmanBuilder {
            pins: Some(pins),
            clock: self.clock,
            routine: self.routine,
            reports: self.reports,
            input: self.input,
            power: self.power,
            link: self.link,
            _p: PhantomData,
        }
    }
}

impl<P> SandmanBuilder<P> {
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Use this schedule instead of loading the routine file.
    pub fn with_routine(mut self, routine: Routine) -> Self {
        self.routine = Some(routine);
        self
    }

    pub fn with_reports(mut self, reports: impl ReportSink + 'static) -> Self {
        self.reports = Some(Box::new(reports));
        self
    }

    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn with_boxed_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_power(mut self, power: impl PowerControl + 'static) -> Self {
        self.power = Some(Box::new(power));
        self
    }

    pub fn with_boxed_power(mut self, power: Box<dyn PowerControl>) -> Self {
        self.power = Some(power);
        self
    }

    /// Attach the dialogue link; without one, voice output is held forever.
    pub fn with_link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    /// Build without the type-state check.
    pub fn try_build(self, cfg: &Config) -> Result<Sandman> {
        let Some(pins) = self.pins else {
            return Err(eyre::Report::new(BuildError::MissingPins));
        };
        let rest = SandmanBuilder::<Set> {
            pins: None,
            clock: self.clock,
            routine: self.routine,
            reports: self.reports,
            input: self.input,
            power: self.power,
            link: self.link,
            _p: PhantomData,
        };
        rest.assemble(pins, cfg)
    }

    fn assemble(self, pins: Box<dyn OutputPins>, cfg: &Config) -> Result<Sandman> {
        cfg.validate()
            .map_err(|e| eyre::Report::new(BuildError::InvalidConfig(e.to_string())))?;

        let clock = self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let now = clock.now();

        let mut registry = ActuatorRegistry::new(pins, GlobalSettings::from(&cfg.controls));
        let configs: Vec<ActuatorConfig> = cfg
            .controls
            .actuators
            .iter()
            .map(ActuatorConfig::from)
            .collect();
        let rejected = registry.initialize(&configs, now);
        if !rejected.is_empty() {
            tracing::warn!(count = rejected.len(), "some actuators were not registered");
        }
        // Requests are refused until startup.
        registry.set_enabled(false);

        let routine = match self.routine {
            Some(r) => r,
            None => load_routine(cfg.paths.routine_file()),
        };

        let reports = self
            .reports
            .unwrap_or_else(|| Box::new(ReportWriter::new(cfg.paths.reports_dir())));

        let input = self.input.map(|source| InputPort {
            source,
            bindings: InputBindings::new(&cfg.input.bindings),
        });

        let link = self.link.unwrap_or_else(|| Link::channel().0);

        Ok(Sandman {
            clock,
            registry,
            routine: RoutineRunner::new(routine),
            interpreter: Interpreter::new(),
            text_confirmation: Confirmation::Idle,
            speech: SpeechNotifier::new(),
            dialogue: Dialogue::new(link),
            reports,
            input,
            power: self.power,
            reboot: RebootSequence::new(),
            rebooted: false,
        })
    }
}

impl SandmanBuilder<Set> {
    pub fn build(mut self, cfg: &Config) -> Result<Sandman> {
        let Some(pins) = self.pins.take() else {
            return Err(eyre::Report::new(BuildError::MissingPins));
        };
        self.assemble(pins, cfg)
    }
}

fn load_routine(path: PathBuf) -> Routine {
    match Routine::load_or_builtin(&path) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "schedule not loaded; running without one"
            );
            Routine::default()
        }
    }
}
