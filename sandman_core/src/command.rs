//! Command tokens and the interpreter that turns them into actions.
//!
//! Text commands are split on single spaces, so `"back  raise"` yields an
//! empty token in the middle. Empty and unknown words become
//! [`Token::Invalid`], which never matches anything and is skipped.

use std::time::Instant;

use sandman_traits::Notifier;

use crate::actuator::{Action, Mode};
use crate::reboot::RebootSequence;
use crate::registry::{ActuatorHandle, ActuatorRegistry};
use crate::reports::{ReportEvent, ReportSink, ReportSource};
use crate::routine::RoutineRunner;

/// Size of the fixed input buffer for text commands, in bytes.
pub const COMMAND_BUFFER_LEN: usize = 100;

/// Spoken back when a reboot needs confirming.
pub const REBOOT_PROMPT: &str = "Are you sure you want to restart?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Back,
    Legs,
    Elevation,
    Raise,
    Lower,
    Stop,
    Schedule,
    Start,
    Status,
    Reboot,
    Yes,
    No,
    /// Duration percentage for a move.
    Integer(u32),
    Invalid,
}

const KEYWORDS: &[(&str, Token)] = &[
    ("back", Token::Back),
    ("legs", Token::Legs),
    ("elevation", Token::Elevation),
    ("raise", Token::Raise),
    ("lower", Token::Lower),
    ("stop", Token::Stop),
    ("schedule", Token::Schedule),
    ("start", Token::Start),
    ("status", Token::Status),
    ("reboot", Token::Reboot),
    ("yes", Token::Yes),
    ("no", Token::No),
];

impl Token {
    /// Classify one word. Keywords match exactly after ASCII lowercasing; an
    /// integer must be all digits and fit in `u32`.
    pub fn from_word(word: &str) -> Self {
        let lower = word.to_ascii_lowercase();
        if let Some((_, t)) = KEYWORDS.iter().find(|(k, _)| *k == lower) {
            return *t;
        }
        if !lower.is_empty() && lower.bytes().all(|b| b.is_ascii_digit()) {
            return lower.parse().map_or(Self::Invalid, Self::Integer);
        }
        Self::Invalid
    }

    pub fn is_confirmation(self) -> bool {
        matches!(self, Self::Yes | Self::No)
    }
}

/// Cut `text` to the command buffer, backing off to a char boundary.
pub fn truncate_to_buffer(text: &str) -> &str {
    if text.len() <= COMMAND_BUFFER_LEN {
        return text;
    }
    let mut end = COMMAND_BUFFER_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Tokenize a text command. Trailing CR/LF is ignored.
pub fn tokenize_text(text: &str) -> Vec<Token> {
    let text = truncate_to_buffer(text).trim_end_matches(['\r', '\n']);
    text.split(' ').map(Token::from_word).collect()
}

/// Result of interpreting a token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Success,
    Invalid,
    /// The command needs a yes/no; carries the prompt to speak.
    MissingConfirmation(&'static str),
}

/// Two-phase confirmation bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Confirmation {
    #[default]
    Idle,
    AwaitingConfirmation { pending: Vec<Token> },
}

impl Confirmation {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingConfirmation { .. })
    }

    /// Hold `tokens` until the next response.
    pub fn hold(&mut self, tokens: Vec<Token>) {
        *self = Self::AwaitingConfirmation { pending: tokens };
    }

    /// Decide what to parse for an incoming command.
    ///
    /// A response is appended to the held tokens. A response with nothing
    /// held is dropped. Any other command while one is held cancels the held
    /// one and is itself dropped.
    pub fn combine(&mut self, incoming: Vec<Token>, is_response: bool) -> Option<Vec<Token>> {
        match (std::mem::take(self), is_response) {
            (Self::Idle, false) => Some(incoming),
            (Self::Idle, true) => {
                tracing::info!("confirmation received with nothing pending; ignored");
                None
            }
            (Self::AwaitingConfirmation { mut pending }, true) => {
                pending.extend(incoming);
                Some(pending)
            }
            (Self::AwaitingConfirmation { pending }, false) => {
                tracing::info!(
                    discarded = ?pending,
                    "pending confirmation canceled by a new command"
                );
                None
            }
        }
    }
}

/// Everything a command may act on.
pub struct CommandContext<'a> {
    pub now: Instant,
    pub registry: &'a mut ActuatorRegistry,
    pub routine: &'a mut RoutineRunner,
    pub notifier: &'a mut dyn Notifier,
    pub reports: &'a mut dyn ReportSink,
    pub reboot: &'a mut RebootSequence,
    pub input_connected: bool,
}

/// Maps token sequences to actions. Keeps resolved handles, which stay
/// valid because the registry never removes entries.
#[derive(Debug, Default)]
pub struct Interpreter {
    back: Option<ActuatorHandle>,
    legs: Option<ActuatorHandle>,
    elevation: Option<ActuatorHandle>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&mut self, segment: Token, registry: &ActuatorRegistry) -> Option<ActuatorHandle> {
        let (slot, name) = match segment {
            Token::Back => (&mut self.back, "back"),
            Token::Legs => (&mut self.legs, "legs"),
            Token::Elevation => (&mut self.elevation, "elev"),
            _ => return None,
        };
        if slot.is_none() {
            *slot = registry.handle(name);
        }
        if slot.is_none() {
            tracing::warn!(control = name, "no actuator registered for command");
        }
        *slot
    }

    /// Scan left to right and run the first command that matches.
    pub fn parse(&mut self, tokens: &[Token], ctx: &mut CommandContext<'_>) -> ParseOutcome {
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                seg @ (Token::Back | Token::Legs | Token::Elevation) => {
                    if let Some(outcome) = self.parse_move(seg, tokens, &mut i, ctx) {
                        return outcome;
                    }
                }
                Token::Stop => {
                    ctx.registry.stop_all();
                    ctx.reports.add(ReportEvent::Control {
                        control: "all".into(),
                        action: Action::Stop,
                        source: ReportSource::Command,
                    });
                    return ParseOutcome::Success;
                }
                Token::Schedule => {
                    i += 1;
                    match tokens.get(i) {
                        Some(Token::Start) => {
                            ctx.routine.start(ctx.now, ctx.notifier, ctx.reports);
                            return ParseOutcome::Success;
                        }
                        Some(Token::Stop) => {
                            ctx.routine.stop(ctx.notifier, ctx.reports);
                            return ParseOutcome::Success;
                        }
                        _ => {}
                    }
                }
                Token::Status => {
                    ctx.notifier.notify("running");
                    if ctx.routine.is_running() {
                        ctx.notifier.notify("schedule_running");
                    }
                    if ctx.input_connected {
                        ctx.notifier.notify("control_connected");
                    }
                    ctx.reports.add(ReportEvent::Status);
                    return ParseOutcome::Success;
                }
                Token::Reboot => {
                    return match tokens.get(i + 1) {
                        None => ParseOutcome::MissingConfirmation(REBOOT_PROMPT),
                        Some(Token::Yes) => {
                            ctx.notifier.notify("restarting");
                            ctx.reboot.arm(ctx.now);
                            ParseOutcome::Success
                        }
                        Some(other) => {
                            tracing::info!(token = ?other, "reboot not confirmed; ignoring");
                            ctx.notifier.notify("canceled");
                            ParseOutcome::Invalid
                        }
                    };
                }
                _ => {}
            }
            i += 1;
        }
        ParseOutcome::Invalid
    }

    // `<segment> raise|lower [percent]`. Leaves `i` on the last consumed
    // token; None means keep scanning.
    fn parse_move(
        &mut self,
        segment: Token,
        tokens: &[Token],
        i: &mut usize,
        ctx: &mut CommandContext<'_>,
    ) -> Option<ParseOutcome> {
        let handle = self.resolve(segment, ctx.registry)?;
        *i += 1;
        let action = match tokens.get(*i)? {
            Token::Raise => Action::Up,
            Token::Lower => Action::Down,
            _ => return None,
        };
        let mut percent = 100;
        if let Some(Token::Integer(p)) = tokens.get(*i + 1) {
            percent = *p;
            *i += 1;
        }
        if !ctx.registry.set_desired_action(handle, action, Mode::Timed, percent) {
            return None;
        }
        let control = ctx
            .registry
            .get(handle)
            .map(|a| a.name().to_string())
            .unwrap_or_default();
        ctx.reports.add(ReportEvent::Control {
            control,
            action,
            source: ReportSource::Command,
        });
        Some(ParseOutcome::Success)
    }
}
