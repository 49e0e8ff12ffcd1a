//! Shape validation for every inbound event
//!
//! Frames are decoded into typed events here and nowhere else. A frame that
//! fails any check never reaches game state; the error names the event and the
//! field that failed so the caller can log it and decide whether the sender
//! deserves a warning.

use serde::de::DeserializeOwned;
use shared::{ChatMessage, DamageRequest, PlayerData, RawEvent, MAX_CHAT_LEN, MAX_NAME_LEN};
use thiserror::Error;

pub const PLAYER_DATA: &str = "playerData";
pub const CHAT_MSG: &str = "chatMsg";
pub const LATENCY_TEST: &str = "latencyTest";
pub const APPLY_DAMAGE: &str = "applyDamage";

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PlayerData(PlayerData),
    ChatMsg(ChatMessage),
    LatencyTest,
    ApplyDamage(DamageRequest),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("frame is not an event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("{event}: malformed payload: {source}")]
    Shape {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{event}: `{field}` is {len} characters, limit is {max}")]
    TooLong {
        event: &'static str,
        field: String,
        len: usize,
        max: usize,
    },

    #[error("{event}: `{field}` reports version {got:?}, server runs {expected:?}")]
    VersionMismatch {
        event: &'static str,
        field: String,
        got: String,
        expected: String,
    },

    #[error("{event}: `{field}` must be a finite number")]
    NotFinite { event: &'static str, field: String },
}

impl ValidationError {
    /// The event the rejected frame claimed to be, when it got that far.
    pub fn event(&self) -> Option<&'static str> {
        match self {
            ValidationError::Envelope(_) | ValidationError::UnknownEvent(_) => None,
            ValidationError::Shape { event, .. }
            | ValidationError::TooLong { event, .. }
            | ValidationError::VersionMismatch { event, .. }
            | ValidationError::NotFinite { event, .. } => Some(event),
        }
    }
}

/// Validates inbound frames against the running game version.
#[derive(Debug, Clone)]
pub struct Validator {
    game_version: String,
}

impl Validator {
    pub fn new(game_version: &str) -> Self {
        Self {
            game_version: game_version.to_string(),
        }
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    /// Decodes and validates one text frame.
    pub fn parse_frame(&self, text: &str) -> Result<ClientEvent, ValidationError> {
        let raw: RawEvent = serde_json::from_str(text).map_err(ValidationError::Envelope)?;
        self.validate(raw)
    }

    pub fn validate(&self, raw: RawEvent) -> Result<ClientEvent, ValidationError> {
        match raw.event.as_str() {
            PLAYER_DATA => {
                let player: PlayerData = decode(PLAYER_DATA, raw.data)?;
                self.check_player(PLAYER_DATA, "", &player)?;
                Ok(ClientEvent::PlayerData(player))
            }
            CHAT_MSG => {
                let msg: ChatMessage = decode(CHAT_MSG, raw.data)?;
                check_len(CHAT_MSG, "name", &msg.name, MAX_NAME_LEN)?;
                check_len(CHAT_MSG, "message", &msg.message, MAX_CHAT_LEN)?;
                Ok(ClientEvent::ChatMsg(msg))
            }
            LATENCY_TEST => Ok(ClientEvent::LatencyTest),
            APPLY_DAMAGE => {
                let request: DamageRequest = decode(APPLY_DAMAGE, raw.data)?;
                self.check_player(APPLY_DAMAGE, "localPlayer.", &request.local_player)?;
                self.check_player(APPLY_DAMAGE, "targetPlayer.", &request.target_player)?;
                if !request.damage.is_finite() {
                    return Err(ValidationError::NotFinite {
                        event: APPLY_DAMAGE,
                        field: "damage".to_string(),
                    });
                }
                Ok(ClientEvent::ApplyDamage(request))
            }
            other => Err(ValidationError::UnknownEvent(other.to_string())),
        }
    }

    fn check_player(
        &self,
        event: &'static str,
        prefix: &str,
        player: &PlayerData,
    ) -> Result<(), ValidationError> {
        if player.game_version != self.game_version {
            return Err(ValidationError::VersionMismatch {
                event,
                field: format!("{}gameVersion", prefix),
                got: player.game_version.clone(),
                expected: self.game_version.clone(),
            });
        }
        check_len(event, &format!("{}name", prefix), &player.name, MAX_NAME_LEN)?;
        check_len(
            event,
            &format!("{}chatMsg", prefix),
            &player.chat_msg,
            MAX_CHAT_LEN,
        )?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(
    event: &'static str,
    data: serde_json::Value,
) -> Result<T, ValidationError> {
    serde_json::from_value(data).map_err(|source| ValidationError::Shape { event, source })
}

fn check_len(
    event: &'static str,
    field: &str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    // UTF-16 code units, so lengths agree with browser clients
    let len = value.encode_utf16().count();
    if len > max {
        return Err(ValidationError::TooLong {
            event,
            field: field.to_string(),
            len,
            max,
        });
    }
    Ok(())
}
