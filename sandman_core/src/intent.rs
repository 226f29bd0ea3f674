//! Voice-assistant intents (Hermes JSON) and their command tokens.

use serde::Deserialize;

use crate::command::Token;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentName {
    intent_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Slot {
    slot_name: String,
    raw_value: String,
}

#[derive(Deserialize)]
struct IntentMessage {
    intent: IntentName,
    #[serde(default)]
    slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    GetStatus,
    MovePart {
        name: Option<String>,
        direction: Option<String>,
    },
    SetSchedule {
        action: Option<String>,
    },
    Reboot,
    ConfirmationResponse {
        response: Option<String>,
    },
    Unknown(String),
}

/// Parse an intent payload. Names may carry a `user:` style prefix.
pub fn parse_intent(payload: &str) -> Result<Intent, serde_json::Error> {
    let msg: IntentMessage = serde_json::from_str(payload)?;
    let slot = |name: &str| {
        msg.slots
            .iter()
            .find(|s| s.slot_name == name)
            .map(|s| s.raw_value.clone())
    };
    let full = msg.intent.intent_name.as_str();
    let name = full.rsplit(':').next().unwrap_or(full);
    Ok(match name {
        "GetStatus" => Intent::GetStatus,
        "MovePart" => Intent::MovePart {
            name: slot("name"),
            direction: slot("direction"),
        },
        "SetSchedule" => Intent::SetSchedule {
            action: slot("action"),
        },
        "Reboot" => Intent::Reboot,
        "ConfirmationResponse" => Intent::ConfirmationResponse {
            response: slot("response"),
        },
        _ => Intent::Unknown(full.to_string()),
    })
}

fn slot_token(intent: &str, slot: &str, value: Option<&String>) -> Option<Token> {
    match value {
        Some(v) => Some(Token::from_word(v)),
        None => {
            tracing::warn!(intent, slot, "intent is missing a slot");
            None
        }
    }
}

impl Intent {
    pub fn is_confirmation_response(&self) -> bool {
        matches!(self, Self::ConfirmationResponse { .. })
    }

    /// Tokens for the interpreter. Unknown intents produce none.
    pub fn tokens(&self) -> Vec<Token> {
        match self {
            Self::GetStatus => vec![Token::Status],
            Self::MovePart { name, direction } => [
                slot_token("MovePart", "name", name.as_ref()),
                slot_token("MovePart", "direction", direction.as_ref()),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Self::SetSchedule { action } => std::iter::once(Some(Token::Schedule))
                .chain(std::iter::once(slot_token("SetSchedule", "action", action.as_ref())))
                .flatten()
                .collect(),
            Self::Reboot => vec![Token::Reboot],
            Self::ConfirmationResponse { response } => {
                slot_token("ConfirmationResponse", "response", response.as_ref())
                    .into_iter()
                    .collect()
            }
            Self::Unknown(name) => {
                tracing::info!(intent = %name, "unrecognized intent ignored");
                Vec::new()
            }
        }
    }
}
