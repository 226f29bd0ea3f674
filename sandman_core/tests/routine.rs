use std::time::{Duration, Instant};

use sandman_core::mocks::{RecordingNotifier, ReportSpy};
use sandman_core::{
    Action, ActuatorConfig, ActuatorRegistry, GlobalSettings, Mode, ReportEvent, ReportSource,
    Routine, RoutineRunner, RoutineStep, ScheduleAction,
};
use sandman_hardware::SimulatedPins;

fn registry(names: &[&str], now: Instant) -> ActuatorRegistry {
    let mut reg = ActuatorRegistry::new(Box::new(SimulatedPins::new()), GlobalSettings::default());
    let configs: Vec<ActuatorConfig> = names
        .iter()
        .zip(0u8..)
        .map(|(name, i)| ActuatorConfig {
            name: (*name).into(),
            up_pin: i * 2,
            down_pin: i * 2 + 1,
            standard_duration: Duration::from_secs(10),
        })
        .collect();
    assert!(reg.initialize(&configs, now).is_empty());
    reg
}

fn knee_head() -> Routine {
    Routine::new(vec![
        RoutineStep::new(30, "knee", Action::Down),
        RoutineStep::new(0, "head", Action::Up),
        RoutineStep::new(45, "head", Action::Down),
        RoutineStep::new(0, "knee", Action::Up),
    ])
}

fn secs(t0: Instant, s: u64) -> Instant {
    t0 + Duration::from_secs(s)
}

#[test]
fn not_running_does_nothing() {
    let t0 = Instant::now();
    let mut reg = registry(&["knee", "head"], t0);
    let mut runner = RoutineRunner::new(knee_head());
    let mut reports = ReportSpy::new();
    runner.process(secs(t0, 100), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), None);
    assert!(reports.events().is_empty());
}

#[test]
fn advances_after_delay_and_dispatches_new_step() {
    let t0 = Instant::now();
    let mut reg = registry(&["knee", "head"], t0);
    let mut runner = RoutineRunner::new(knee_head());
    let mut n = RecordingNotifier::new();
    let mut reports = ReportSpy::new();
    runner.start(t0, &mut n, &mut reports);
    assert_eq!(runner.current_index(), Some(0));

    runner.process(secs(t0, 29), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(0));

    runner.process(secs(t0, 30), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(1));
    let head = reg.get(reg.handle("head").unwrap()).unwrap();
    assert_eq!(head.desired_action(), Action::Up);
    assert_eq!(head.mode(), Mode::Timed);
    assert_eq!(
        reports.events().last(),
        Some(&ReportEvent::Control {
            control: "head".into(),
            action: Action::Up,
            source: ReportSource::Routine,
        })
    );
}

#[test]
fn builtin_moves_are_reported_as_schedule() {
    let t0 = Instant::now();
    let mut reg = registry(&["legs", "back"], t0);
    let mut runner = RoutineRunner::new(Routine::builtin());
    let mut reports = ReportSpy::new();
    runner.start(t0, &mut RecordingNotifier::new(), &mut reports);
    runner.process(secs(t0, 1_800), &mut reg, &mut reports);
    assert_eq!(
        reports.events().last(),
        Some(&ReportEvent::Control {
            control: "legs".into(),
            action: Action::Down,
            source: ReportSource::Schedule,
        })
    );
}

#[test]
fn wraps_back_to_first_step() {
    let t0 = Instant::now();
    let mut reg = registry(&["knee", "head"], t0);
    let mut runner = RoutineRunner::new(knee_head());
    let mut reports = ReportSpy::new();
    runner.start(t0, &mut RecordingNotifier::new(), &mut reports);

    runner.process(secs(t0, 30), &mut reg, &mut reports);
    runner.process(secs(t0, 30), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(2));
    runner.process(secs(t0, 74), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(2));
    runner.process(secs(t0, 75), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(3));
    runner.process(secs(t0, 75), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(0));
    assert_eq!(
        reg.get(reg.handle("knee").unwrap()).unwrap().desired_action(),
        Action::Down
    );
}

#[test]
fn unknown_control_is_skipped_and_schedule_continues() {
    let t0 = Instant::now();
    let mut reg = registry(&["knee"], t0);
    let mut runner = RoutineRunner::new(knee_head());
    let mut reports = ReportSpy::new();
    runner.start(t0, &mut RecordingNotifier::new(), &mut reports);
    runner.process(secs(t0, 30), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(1));
    assert!(runner.is_running());
    runner.process(secs(t0, 30), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(2));
    assert_eq!(reports.events().len(), 1, "only the start was reported");
}

#[test]
fn start_and_stop_are_idempotent_but_always_reported() {
    let t0 = Instant::now();
    let mut runner = RoutineRunner::new(knee_head());
    let mut n = RecordingNotifier::new();
    let mut reports = ReportSpy::new();
    runner.stop(&mut n, &mut reports);
    runner.start(t0, &mut n, &mut reports);
    runner.start(secs(t0, 5), &mut n, &mut reports);
    runner.stop(&mut n, &mut reports);
    assert_eq!(n.take(), vec!["schedule_start", "schedule_stop"]);
    assert_eq!(
        reports.events(),
        vec![
            ReportEvent::Schedule { action: ScheduleAction::Stop },
            ReportEvent::Schedule { action: ScheduleAction::Start },
            ReportEvent::Schedule { action: ScheduleAction::Start },
            ReportEvent::Schedule { action: ScheduleAction::Stop },
        ]
    );
}

#[test]
fn restart_begins_at_first_step() {
    let t0 = Instant::now();
    let mut reg = registry(&["knee", "head"], t0);
    let mut runner = RoutineRunner::new(knee_head());
    let mut n = RecordingNotifier::new();
    let mut reports = ReportSpy::new();
    runner.start(t0, &mut n, &mut reports);
    runner.process(secs(t0, 30), &mut reg, &mut reports);
    runner.stop(&mut n, &mut reports);
    runner.start(secs(t0, 40), &mut n, &mut reports);
    assert_eq!(runner.current_index(), Some(0));
    runner.process(secs(t0, 69), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(0));
}

#[test]
fn empty_routine_never_advances() {
    let t0 = Instant::now();
    let mut reg = registry(&["knee"], t0);
    let mut runner = RoutineRunner::new(Routine::default());
    let mut reports = ReportSpy::new();
    runner.start(t0, &mut RecordingNotifier::new(), &mut reports);
    runner.process(secs(t0, 1_000), &mut reg, &mut reports);
    assert_eq!(runner.current_index(), Some(0));
}

#[test]
fn builtin_schedule_alternates_legs_and_back() {
    let builtin = Routine::builtin();
    assert_eq!(builtin.len(), 4);
    assert!(builtin.steps().iter().all(|s| s.delay == Duration::from_secs(1_800)));
    assert_eq!(builtin.steps()[0].control, "legs");
    assert_eq!(builtin.steps()[2].control, "back");
}

#[test]
fn step_display_is_readable() {
    let step = RoutineStep::new(3_725, "legs", Action::Down);
    assert_eq!(step.to_string(), "+1h 02m 05s -> legs, down");
}

#[test]
fn missing_file_uses_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let routine = Routine::load_or_builtin(&dir.path().join("sandman.rtn")).unwrap();
    assert_eq!(routine, Routine::builtin());
}

#[test]
fn routine_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sandman.rtn");
    std::fs::write(
        &path,
        r#"{"steps":[
            {"delaySec":30,"controlAction":{"control":"legs","action":"down"}},
            {"delaySec":0,"controlAction":{"control":"back","action":"up"}}]}"#,
    )
    .unwrap();
    let routine = Routine::load_or_builtin(&path).unwrap();
    assert_eq!(
        routine.steps(),
        &[
            RoutineStep::new(30, "legs", Action::Down),
            RoutineStep::new(0, "back", Action::Up)
        ]
    );
    assert_eq!(routine.report_source(), ReportSource::Routine);
}

#[test]
fn unparsable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sandman.rtn");
    std::fs::write(&path, "not json").unwrap();
    assert!(Routine::load_or_builtin(&path).is_err());
}
