use std::time::{Duration, Instant};

use rstest::rstest;
use sandman_core::command::{CommandContext, REBOOT_PROMPT, tokenize_text};
use sandman_core::mocks::{RecordingNotifier, ReportSpy};
use sandman_core::{
    Action, ActuatorConfig, ActuatorRegistry, GlobalSettings, Interpreter, Mode, ParseOutcome,
    RebootSequence, ReportEvent, ReportSource, Routine, RoutineRunner, ScheduleAction, Token,
};
use sandman_hardware::SimulatedPins;

struct Bed {
    now: Instant,
    registry: ActuatorRegistry,
    routine: RoutineRunner,
    notifier: RecordingNotifier,
    reports: ReportSpy,
    reboot: RebootSequence,
    interpreter: Interpreter,
    input_connected: bool,
}

impl Bed {
    fn new() -> Self {
        let now = Instant::now();
        let mut registry =
            ActuatorRegistry::new(Box::new(SimulatedPins::new()), GlobalSettings::default());
        let configs: Vec<ActuatorConfig> = [("back", 20, 16), ("legs", 13, 26), ("elev", 5, 6)]
            .into_iter()
            .map(|(name, up, down)| ActuatorConfig {
                name: name.into(),
                up_pin: up,
                down_pin: down,
                standard_duration: Duration::from_millis(1_000),
            })
            .collect();
        assert!(registry.initialize(&configs, now).is_empty());
        Self {
            now,
            registry,
            routine: RoutineRunner::new(Routine::builtin()),
            notifier: RecordingNotifier::new(),
            reports: ReportSpy::new(),
            reboot: RebootSequence::new(),
            interpreter: Interpreter::new(),
            input_connected: false,
        }
    }

    fn parse(&mut self, tokens: &[Token]) -> ParseOutcome {
        let mut ctx = CommandContext {
            now: self.now,
            registry: &mut self.registry,
            routine: &mut self.routine,
            notifier: &mut self.notifier,
            reports: &mut self.reports,
            reboot: &mut self.reboot,
            input_connected: self.input_connected,
        };
        self.interpreter.parse(tokens, &mut ctx)
    }

    fn run(&mut self, text: &str) -> ParseOutcome {
        self.parse(&tokenize_text(text))
    }

    fn actuator(&self, name: &str) -> &sandman_core::Actuator {
        self.registry.get(self.registry.handle(name).unwrap()).unwrap()
    }
}

#[test]
fn tokenizes_move_with_percent() {
    assert_eq!(
        tokenize_text("back raise 50"),
        vec![Token::Back, Token::Raise, Token::Integer(50)]
    );
    assert_eq!(tokenize_text("LEGS Lower\r\n"), vec![Token::Legs, Token::Lower]);
}

#[test]
fn move_with_percent_dispatches_timed_action() {
    let mut bed = Bed::new();
    assert_eq!(bed.run("back raise 50"), ParseOutcome::Success);
    let back = bed.actuator("back");
    assert_eq!(back.desired_action(), Action::Up);
    assert_eq!(back.mode(), Mode::Timed);
    assert_eq!(
        back.moving_limit(bed.registry.settings()),
        Duration::from_millis(500)
    );
    assert_eq!(
        bed.reports.events(),
        vec![ReportEvent::Control {
            control: "back".into(),
            action: Action::Up,
            source: ReportSource::Command,
        }]
    );
}

#[rstest]
#[case("legs lower", "legs", Action::Down)]
#[case("elevation raise", "elev", Action::Up)]
#[case("please back lower now", "back", Action::Down)]
fn segments_map_to_actuators(#[case] text: &str, #[case] name: &str, #[case] action: Action) {
    let mut bed = Bed::new();
    assert_eq!(bed.run(text), ParseOutcome::Success);
    assert_eq!(bed.actuator(name).desired_action(), action);
}

#[test]
fn default_percent_is_full_duration() {
    let mut bed = Bed::new();
    bed.run("legs raise");
    assert_eq!(
        bed.actuator("legs").moving_limit(bed.registry.settings()),
        Duration::from_millis(1_000)
    );
}

#[rstest]
#[case("")]
#[case(" ")]
#[case("back")]
#[case("back stop")]
#[case("raise back")]
#[case("schedule")]
#[case("schedule status")]
#[case("hello world")]
fn unmatched_input_is_invalid(#[case] text: &str) {
    let mut bed = Bed::new();
    assert_eq!(bed.run(text), ParseOutcome::Invalid);
}

#[test]
fn double_space_breaks_the_pattern() {
    let mut bed = Bed::new();
    assert_eq!(bed.run("back  raise"), ParseOutcome::Invalid);
    assert_eq!(bed.actuator("back").desired_action(), Action::Stop);
}

#[test]
fn oversized_input_is_truncated_not_rejected() {
    let mut bed = Bed::new();
    let long = format!("back raise {}", "x".repeat(500));
    assert_eq!(bed.run(&long), ParseOutcome::Success);
}

#[test]
fn bare_stop_stops_everything() {
    let mut bed = Bed::new();
    bed.run("back raise");
    bed.run("legs lower");
    assert_eq!(bed.run("stop"), ParseOutcome::Success);
    for a in bed.registry.iter() {
        assert_eq!(a.desired_action(), Action::Stop);
        assert_eq!(a.mode(), Mode::Manual);
    }
    assert_eq!(
        bed.reports.events().last(),
        Some(&ReportEvent::Control {
            control: "all".into(),
            action: Action::Stop,
            source: ReportSource::Command,
        })
    );
}

#[test]
fn schedule_start_and_stop_toggle_runner() {
    let mut bed = Bed::new();
    assert_eq!(bed.run("schedule start"), ParseOutcome::Success);
    assert!(bed.routine.is_running());
    assert_eq!(bed.run("schedule start"), ParseOutcome::Success);
    assert_eq!(bed.run("schedule stop"), ParseOutcome::Success);
    assert!(!bed.routine.is_running());
    assert_eq!(bed.notifier.take(), vec!["schedule_start", "schedule_stop"]);
    let recorded: Vec<_> = bed.reports.events();
    assert_eq!(
        recorded,
        vec![
            ReportEvent::Schedule { action: ScheduleAction::Start },
            ReportEvent::Schedule { action: ScheduleAction::Start },
            ReportEvent::Schedule { action: ScheduleAction::Stop },
        ]
    );
}

#[rstest]
#[case(false, false, &["running"])]
#[case(true, false, &["running", "schedule_running"])]
#[case(false, true, &["running", "control_connected"])]
#[case(true, true, &["running", "schedule_running", "control_connected"])]
fn status_notifies_conditionally(
    #[case] running: bool,
    #[case] connected: bool,
    #[case] expected: &[&str],
) {
    let mut bed = Bed::new();
    bed.input_connected = connected;
    if running {
        bed.run("schedule start");
        bed.notifier.take();
    }
    assert_eq!(bed.run("status"), ParseOutcome::Success);
    assert_eq!(bed.notifier.take(), expected);
    assert_eq!(bed.reports.events().last(), Some(&ReportEvent::Status));
}

#[test]
fn reboot_alone_asks_for_confirmation() {
    let mut bed = Bed::new();
    assert_eq!(bed.run("reboot"), ParseOutcome::MissingConfirmation(REBOOT_PROMPT));
    assert!(!bed.reboot.is_armed());
    assert!(bed.notifier.ids.is_empty());
}

#[test]
fn confirmed_reboot_arms_sequence() {
    let mut bed = Bed::new();
    assert_eq!(bed.parse(&[Token::Reboot, Token::Yes]), ParseOutcome::Success);
    assert!(bed.reboot.is_armed());
    assert_eq!(bed.notifier.take(), vec!["restarting"]);
}

#[rstest]
#[case(Token::No)]
#[case(Token::Status)]
#[case(Token::Invalid)]
fn declined_reboot_is_canceled(#[case] follow: Token) {
    let mut bed = Bed::new();
    assert_eq!(bed.parse(&[Token::Reboot, follow]), ParseOutcome::Invalid);
    assert!(!bed.reboot.is_armed());
    assert_eq!(bed.notifier.take(), vec!["canceled"]);
}

#[test]
fn missing_actuator_keeps_scanning() {
    let now = Instant::now();
    let mut registry =
        ActuatorRegistry::new(Box::new(SimulatedPins::new()), GlobalSettings::default());
    registry.initialize(
        &[ActuatorConfig {
            name: "legs".into(),
            up_pin: 1,
            down_pin: 2,
            standard_duration: Duration::from_secs(1),
        }],
        now,
    );
    let mut bed = Bed::new();
    bed.registry = registry;
    assert_eq!(bed.run("back raise legs lower"), ParseOutcome::Success);
    assert_eq!(bed.actuator("legs").desired_action(), Action::Down);
}

#[test]
fn disabled_registry_makes_moves_invalid() {
    let mut bed = Bed::new();
    bed.registry.set_enabled(false);
    assert_eq!(bed.run("back raise"), ParseOutcome::Invalid);
    assert!(bed.reports.events().is_empty());
}
