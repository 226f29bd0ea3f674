//! Voice assistant plumbing over a Hermes-style message bus.
//!
//! The network client lives outside this crate. It talks to the tick loop
//! through a [`Link`]: inbound messages arrive on a crossbeam channel drained
//! once per tick, and outbound messages go back on another. While the client
//! reports itself disconnected, outbound messages are held.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use sandman_traits::Notifier;
use serde_json::json;

use crate::command::{Confirmation, ParseOutcome, Token};
use crate::intent::parse_intent;

/// How often the very first notification is re-sent until speech is up.
pub const FIRST_NOTIFICATION_RETRY: Duration = Duration::from_secs(5);
const MAX_HELD: usize = 64;
/// Notifications kept while speech output is unavailable.
pub const MAX_QUEUED: usize = 64;

pub const TOPIC_START_SESSION: &str = "hermes/dialogueManager/startSession";
pub const TOPIC_CONTINUE_SESSION: &str = "hermes/dialogueManager/continueSession";
pub const TOPIC_END_SESSION: &str = "hermes/dialogueManager/endSession";
/// Topic filters the client should subscribe to.
pub const SUBSCRIPTIONS: [&str; 3] = [
    "hermes/intent/#",
    "hermes/tts/#",
    "hermes/dialogueManager/#",
];

const NOTIFICATIONS: &[(&str, &str)] = &[
    ("initialized", "Sandman initialized"),
    ("running", "Sandman is running"),
    ("schedule_running", "Schedule is running"),
    ("schedule_start", "Schedule started"),
    ("schedule_stop", "Schedule stopped"),
    ("control_connected", "Controller connected"),
    ("control_disconnected", "Controller disconnected"),
    ("back_moving_up", "Raising the back"),
    ("back_moving_down", "Lowering the back"),
    ("back_stop", "Back stopped"),
    ("elev_moving_up", "Raising the elevation"),
    ("elev_moving_down", "Lowering the elevation"),
    ("elev_stop", "Elevation stopped"),
    ("legs_moving_up", "Raising the legs"),
    ("legs_moving_down", "Lowering the legs"),
    ("legs_stop", "Legs stopped"),
    ("canceled", "Canceled"),
    ("restarting", "Restarting"),
];

/// Spoken text for a notification id.
pub fn notification_text(id: &str) -> Option<&'static str> {
    NOTIFICATIONS.iter().find(|(k, _)| *k == id).map(|(_, t)| *t)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Connected,
    Disconnected,
    Message { topic: String, payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
}

impl Outbound {
    fn new(topic: &str, payload: &serde_json::Value) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.to_string(),
        }
    }
}

/// The client's side of a [`Link`].
#[derive(Debug, Clone)]
pub struct TransportEnd {
    pub inbound: Sender<Inbound>,
    pub outbound: Receiver<Outbound>,
}

#[derive(Debug)]
pub struct Link {
    inbox: Receiver<Inbound>,
    outgoing: Sender<Outbound>,
    connected: bool,
    held: VecDeque<Outbound>,
}

impl Link {
    pub fn channel() -> (Self, TransportEnd) {
        let (in_tx, in_rx) = crossbeam_channel::unbounded();
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        (
            Self {
                inbox: in_rx,
                outgoing: out_tx,
                connected: false,
                held: VecDeque::new(),
            },
            TransportEnd {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn held(&self) -> usize {
        self.held.len()
    }

    pub fn publish(&mut self, msg: Outbound) {
        if self.connected {
            if let Err(e) = self.outgoing.send(msg) {
                tracing::warn!("transport gone; holding message");
                self.connected = false;
                self.hold(e.into_inner());
            }
        } else {
            self.hold(msg);
        }
    }

    fn hold(&mut self, msg: Outbound) {
        if self.held.len() >= MAX_HELD {
            self.held.pop_front();
        }
        self.held.push_back(msg);
    }

    fn flush_held(&mut self) {
        while self.connected {
            let Some(msg) = self.held.pop_front() else {
                break;
            };
            self.publish(msg);
        }
    }
}

/// Queues notifications as spoken sessions.
///
/// Until speech has finished at least once, only the first notification is
/// sent, and it is re-sent every [`FIRST_NOTIFICATION_RETRY`]. The speech
/// service may still be starting.
#[derive(Debug, Default)]
pub struct SpeechNotifier {
    queue: VecDeque<&'static str>,
    first: Option<&'static str>,
    first_sent_at: Option<Instant>,
    speech_ready: bool,
    last_finished: Option<Instant>,
}

impl SpeechNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Record that an announcement finished playing.
    pub fn mark_finished(&mut self, now: Instant) {
        self.speech_ready = true;
        self.first = None;
        self.last_finished = Some(now);
    }

    pub fn flush(&mut self, now: Instant, link: &mut Link) {
        if !link.is_connected() {
            return;
        }
        if self.speech_ready {
            while let Some(text) = self.queue.pop_front() {
                link.publish(start_session(text));
            }
            return;
        }
        match self.first {
            None => {
                if let Some(text) = self.queue.pop_front() {
                    link.publish(start_session(text));
                    self.first = Some(text);
                    self.first_sent_at = Some(now);
                    tracing::debug!("first notification attempted");
                }
            }
            Some(text) => {
                let due = self
                    .first_sent_at
                    .is_none_or(|t| now.saturating_duration_since(t) >= FIRST_NOTIFICATION_RETRY);
                if due {
                    link.publish(start_session(text));
                    self.first_sent_at = Some(now);
                    tracing::debug!("first notification re-attempted");
                }
            }
        }
    }
}

fn start_session(text: &str) -> Outbound {
    Outbound::new(
        TOPIC_START_SESSION,
        &json!({"init": {"type": "notification", "text": text}, "siteId": "default"}),
    )
}

impl Notifier for SpeechNotifier {
    fn notify(&mut self, id: &str) {
        match notification_text(id) {
            Some(text) => {
                tracing::info!(id, text, "notification");
                if self.queue.len() >= MAX_QUEUED
                    && let Some(dropped) = self.queue.pop_front()
                {
                    tracing::warn!(dropped, "notification queue full; oldest dropped");
                }
                self.queue.push_back(text);
            }
            None => tracing::warn!(id, "unknown notification"),
        }
    }

    fn last_finished(&self) -> Option<Instant> {
        self.last_finished
    }
}

/// Session tracking and the voice side of the confirmation protocol.
#[derive(Debug)]
pub struct Dialogue {
    link: Link,
    confirmation: Confirmation,
    session_id: String,
}

impl Dialogue {
    pub fn new(link: Link) -> Self {
        Self {
            link,
            confirmation: Confirmation::Idle,
            session_id: String::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.confirmation.is_awaiting()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Drain the inbox up to and including the next voice command.
    ///
    /// The command must be answered with [`Dialogue::respond`] before the
    /// next call, so a confirmation arriving in the same batch sees the
    /// prompt it answers. `None` once the inbox is empty.
    pub fn next_command(
        &mut self,
        now: Instant,
        speech: &mut SpeechNotifier,
    ) -> Option<Vec<Token>> {
        loop {
            match self.link.inbox.try_recv() {
                Ok(Inbound::Connected) => {
                    tracing::info!("message bus connected");
                    self.link.connected = true;
                    self.link.flush_held();
                }
                Ok(Inbound::Disconnected) => {
                    tracing::warn!("message bus disconnected");
                    self.link.connected = false;
                }
                Ok(Inbound::Message { topic, payload }) => {
                    if let Some(tokens) = self.handle_message(now, &topic, &payload, speech) {
                        return Some(tokens);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    if self.link.connected {
                        tracing::warn!("message bus client exited");
                    }
                    self.link.connected = false;
                    return None;
                }
            }
        }
    }

    fn handle_message(
        &mut self,
        now: Instant,
        topic: &str,
        payload: &str,
        speech: &mut SpeechNotifier,
    ) -> Option<Vec<Token>> {
        if topic.contains("hermes/tts/sayFinished") {
            speech.mark_finished(now);
            return None;
        }
        if topic.contains("hermes/dialogueManager/") {
            self.handle_session(topic, payload);
            return None;
        }
        if !topic.contains("hermes/intent/") {
            return None;
        }
        let intent = match parse_intent(payload) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(topic, error = %e, "unparsable intent ignored");
                return None;
            }
        };
        tracing::info!(topic, ?intent, "intent received");
        let tokens = intent.tokens();
        match self
            .confirmation
            .combine(tokens, intent.is_confirmation_response())
        {
            Some(t) if !t.is_empty() => Some(t),
            _ => {
                self.end_session();
                None
            }
        }
    }

    fn handle_session(&mut self, topic: &str, payload: &str) {
        let doc: serde_json::Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(topic, error = %e, "unparsable dialogue message");
                return;
            }
        };
        let id = doc.get("sessionId").and_then(|v| v.as_str()).unwrap_or("");
        if topic.contains("sessionStarted") {
            tracing::info!(session = id, "dialogue session started");
            self.session_id = id.to_string();
        } else if topic.contains("sessionEnded") {
            let reason = doc
                .pointer("/termination/reason")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            tracing::info!(session = id, reason, "dialogue session ended");
            self.session_id.clear();
        }
    }

    /// Close out a command returned by [`Dialogue::next_command`].
    pub fn respond(&mut self, tokens: Vec<Token>, outcome: ParseOutcome) {
        match outcome {
            ParseOutcome::Success => {}
            ParseOutcome::Invalid => self.end_session(),
            ParseOutcome::MissingConfirmation(prompt) => {
                self.confirmation.hold(tokens);
                let msg = Outbound::new(
                    TOPIC_CONTINUE_SESSION,
                    &json!({"sessionId": self.session_id, "text": prompt}),
                );
                self.link.publish(msg);
            }
        }
    }

    /// Publish queued notifications.
    pub fn flush(&mut self, now: Instant, speech: &mut SpeechNotifier) {
        speech.flush(now, &mut self.link);
    }

    fn end_session(&mut self) {
        let msg = Outbound::new(
            TOPIC_END_SESSION,
            &json!({"sessionId": self.session_id, "text": ""}),
        );
        self.link.publish(msg);
    }
}
