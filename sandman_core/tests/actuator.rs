use std::time::{Duration, Instant};

use rstest::rstest;
use sandman_core::mocks::RecordingNotifier;
use sandman_core::{Action, Actuator, ActuatorConfig, CoolDownPolicy, GlobalSettings, Mode, State};
use sandman_hardware::SimulatedPins;
use sandman_traits::OutputPins;

const UP: u8 = 20;
const DOWN: u8 = 16;

struct Rig {
    t0: Instant,
    actuator: Actuator,
    pins: SimulatedPins,
    notifier: RecordingNotifier,
    settings: GlobalSettings,
}

impl Rig {
    fn new(standard_ms: u64, policy: CoolDownPolicy) -> Self {
        let t0 = Instant::now();
        let mut pins = SimulatedPins::new();
        pins.acquire_output(UP).unwrap();
        pins.acquire_output(DOWN).unwrap();
        let actuator = Actuator::new(
            ActuatorConfig {
                name: "back".into(),
                up_pin: UP,
                down_pin: DOWN,
                standard_duration: Duration::from_millis(standard_ms),
            },
            t0,
        );
        Self {
            t0,
            actuator,
            pins,
            notifier: RecordingNotifier::new(),
            settings: GlobalSettings {
                max_moving: Duration::from_millis(5_000),
                cool_down: Duration::from_millis(2_000),
                cool_down_policy: policy,
            },
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    fn tick(&mut self, ms: u64) -> State {
        let now = self.at(ms);
        self.actuator
            .process(now, &self.settings, &mut self.pins, &mut self.notifier);
        self.actuator.state()
    }
}

#[test]
fn idle_with_stop_does_nothing() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    assert_eq!(rig.tick(10), State::Idle);
    assert!(rig.pins.history().is_empty());
    assert!(rig.notifier.ids.is_empty());
}

#[test]
fn timed_move_drives_pin_and_announces() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    assert_eq!(rig.tick(0), State::MovingUp);
    assert!(rig.pins.is_high(UP));
    assert!(!rig.pins.is_high(DOWN));
    assert_eq!(rig.notifier.take(), vec!["back_moving_up"]);
}

#[test]
fn opposite_pin_goes_low_before_target_goes_high() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Down, Mode::Timed, 100);
    rig.tick(0);
    let history = rig.pins.history();
    let low = history.iter().position(|&(p, h)| p == UP && !h).unwrap();
    let high = history.iter().position(|&(p, h)| p == DOWN && h).unwrap();
    assert!(low < high, "history: {history:?}");
}

#[rstest]
#[case(100, 1_000)]
#[case(50, 500)]
#[case(250, 1_000)]
fn timed_move_stops_after_scaled_duration(#[case] percent: u32, #[case] limit_ms: u64) {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, percent);
    rig.tick(0);
    assert_eq!(rig.actuator.moving_limit(&rig.settings), Duration::from_millis(limit_ms));
    assert_eq!(rig.tick(limit_ms - 1), State::MovingUp);
    assert_eq!(rig.tick(limit_ms), State::CoolingDown);
    assert!(!rig.pins.is_high(UP));
    assert!(!rig.pins.is_high(DOWN));
}

#[test]
fn manual_move_uses_global_limit_and_is_silent() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Down, Mode::Manual, 10);
    rig.tick(0);
    assert_eq!(rig.tick(4_999), State::MovingDown);
    assert_eq!(rig.tick(5_000), State::CoolingDown);
    assert!(rig.notifier.ids.is_empty());
}

#[test]
fn manual_limit_follows_global_settings_change() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Manual, 100);
    rig.tick(0);
    rig.settings.max_moving = Duration::from_millis(1_500);
    assert_eq!(rig.tick(1_500), State::CoolingDown);
}

#[test]
fn reversing_skips_cool_down() {
    let mut rig = Rig::new(10_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    rig.tick(0);
    rig.actuator.set_desired_action(Action::Down, Mode::Timed, 100);
    assert_eq!(rig.tick(100), State::MovingDown);
    assert!(rig.pins.is_high(DOWN));
    assert!(!rig.pins.is_high(UP));
    assert_eq!(rig.notifier.take(), vec!["back_moving_up", "back_moving_down"]);
}

#[test]
fn stop_request_enters_cool_down_and_announces() {
    let mut rig = Rig::new(10_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    rig.tick(0);
    rig.actuator.set_desired_action(Action::Stop, Mode::Timed, 100);
    assert_eq!(rig.tick(200), State::CoolingDown);
    assert_eq!(rig.notifier.take(), vec!["back_moving_up", "back_stop"]);
}

#[test]
fn hold_policy_ignores_requests_during_cool_down() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    rig.tick(0);
    assert_eq!(rig.tick(1_000), State::CoolingDown);

    rig.actuator.set_desired_action(Action::Down, Mode::Timed, 100);
    assert_eq!(rig.tick(1_500), State::CoolingDown);
    assert_eq!(rig.actuator.desired_action(), Action::Stop);
    assert!(!rig.pins.is_high(DOWN));

    assert_eq!(rig.tick(2_999), State::CoolingDown);
    assert_eq!(rig.tick(3_000), State::Idle);
    // The discarded request does not start a move afterwards.
    assert_eq!(rig.tick(3_010), State::Idle);
}

#[test]
fn rearm_policy_restarts_cool_down_on_request() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::RearmOnInput);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    rig.tick(0);
    assert_eq!(rig.tick(1_000), State::CoolingDown);

    rig.actuator.set_desired_action(Action::Up, Mode::Manual, 100);
    assert_eq!(rig.tick(2_500), State::CoolingDown);
    assert_eq!(rig.actuator.desired_action(), Action::Stop);

    // 2 s from the re-arm, not from entry.
    assert_eq!(rig.tick(3_000), State::CoolingDown);
    assert_eq!(rig.tick(4_499), State::CoolingDown);
    assert_eq!(rig.tick(4_500), State::Idle);
}

#[test]
fn idle_after_cool_down_accepts_new_move() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    rig.tick(0);
    rig.tick(1_000);
    assert_eq!(rig.tick(3_000), State::Idle);
    rig.actuator.set_desired_action(Action::Down, Mode::Timed, 100);
    assert_eq!(rig.tick(3_001), State::MovingDown);
    assert_eq!(rig.actuator.state_entered(), rig.at(3_001));
}

#[test]
fn pin_failures_do_not_block_state_changes() {
    let mut rig = Rig::new(1_000, CoolDownPolicy::Hold);
    rig.pins.fail_on(UP);
    rig.actuator.set_desired_action(Action::Up, Mode::Timed, 100);
    assert_eq!(rig.tick(0), State::MovingUp);
    assert!(!rig.pins.is_high(UP));
}
