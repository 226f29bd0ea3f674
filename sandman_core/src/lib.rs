#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Bed control logic (hardware-agnostic).
//!
//! This crate drives the bed's linear actuators through relay outputs. All
//! hardware interactions go through the `sandman_traits` seams: `OutputPins`,
//! `InputSource`, `Notifier` and `PowerControl`.
//!
//! ## Architecture
//!
//! - **Actuators**: per-actuator Idle/Moving/CoolDown state machine (`actuator`)
//! - **Registry**: named actuators that own the relay pins (`registry`)
//! - **Commands**: tokenizer, interpreter, two-phase confirmation (`command`)
//! - **Voice**: intents, notifications, dialogue sessions (`intent`, `dialogue`)
//! - **Schedule**: cyclic routines of timed moves (`routine`)
//! - **Reports**: per-evening JSON-lines activity log (`reports`)
//! - **App**: the assembled controller and its tick loop (`app`)
//!
//! Everything runs on one thread. Nothing here blocks except
//! [`Sandman::pause`](app::Sandman::pause).

pub mod actuator;
pub mod app;
pub mod command;
pub mod dialogue;
pub mod error;
pub mod hw_error;
pub mod input;
pub mod intent;
pub mod mocks;
pub mod reboot;
pub mod registry;
pub mod reports;
pub mod routine;
pub mod timer;

pub use actuator::{
    Action, Actuator, ActuatorConfig, CoolDownPolicy, GlobalSettings, Mode, State, Transition,
};
pub use app::{Sandman, SandmanBuilder, TICK_INTERVAL};
pub use command::{Confirmation, Interpreter, ParseOutcome, Token, tokenize_text};
pub use dialogue::{Dialogue, Inbound, Link, Outbound, SpeechNotifier, TransportEnd};
pub use error::{BuildError, RegistryError, Report, Result, RoutineError, SandmanError};
pub use intent::{Intent, parse_intent};
pub use reboot::{REBOOT_CEILING, RebootSequence};
pub use registry::{ActuatorHandle, ActuatorRegistry};
pub use reports::{NullReports, ReportEvent, ReportSink, ReportSource, ReportWriter, ScheduleAction};
pub use routine::{Routine, RoutineRunner, RoutineStep};
