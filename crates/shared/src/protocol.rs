use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::Participant, error::ProtocolError};

pub const STATUS_SUCCESSFUL: &str = "STATUS:SUCCESSFUL";
pub const STATUS_FAILED: &str = "STATUS:FAILED";

/// Wire identifiers carried in the `step` field.
pub mod step {
    pub const ALL_PLAYERS: &str = "LOBBY:ALL_PLAYERS";
    pub const GET_PLAYERS: &str = "LOBBY:GET_PLAYERS";
    pub const AUTHORIZE: &str = "LOBBY:AUTHORIZE";
    pub const AUTHORIZE_AS_OWNER: &str = "LOBBY:AUTHORIZE_AS_OWNER";
    pub const CLOSED: &str = "LOBBY:CLOSED";
    pub const UPDATED_RESPONSE: &str = "MEMBER:UPDATED_RESPONSE";
    pub const NEXT_QUESTION: &str = "QUIZ:NEXT_QUESTION";
    pub const RESET: &str = "QUIZ:RESET";
    pub const START: &str = "QUIZ:START";
    pub const READING_CONFIRMATION_REQUESTED: &str = "QUIZ:READING_CONFIRMATION_REQUESTED";
    pub const CURRENT_STATE: &str = "QUIZ:CURRENT_STATE";
}

/// The envelope shared by socket frames and HTTP responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub status: String,
    pub step: String,
    #[serde(default)]
    pub payload: Value,
}

impl SessionMessage {
    pub fn new(step: impl Into<String>, payload: Value) -> Self {
        Self {
            status: STATUS_SUCCESSFUL.to_string(),
            step: step.into(),
            payload,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status == STATUS_SUCCESSFUL
    }

    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(|source| ProtocolError::MalformedPayload {
            step: self.step.clone(),
            source,
        })
    }

    pub fn question_state(&self) -> Result<QuestionStatePayload, ProtocolError> {
        self.decode_payload()
    }

    /// The absolute start of the active question's countdown window, if the payload has one.
    pub fn start_timestamp(&self) -> Result<DateTime<Utc>, ProtocolError> {
        self.question_state()?
            .start_timestamp
            .ok_or_else(|| ProtocolError::MissingStartTimestamp {
                step: self.step.clone(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllPlayersPayload {
    pub members: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedResponsePayload {
    pub nickname: Participant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionPayload {
    pub question_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizNamePayload {
    pub quiz_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizePayload {
    pub quiz_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Inbound session events this client reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AllPlayers(Vec<Participant>),
    ResponseUpdated(Participant),
    NextQuestion { question_index: usize },
    Reset,
    Closed,
    QuizStarted,
    ReadingConfirmationRequested,
}

impl SessionEvent {
    pub fn step(&self) -> &'static str {
        match self {
            Self::AllPlayers(_) => step::ALL_PLAYERS,
            Self::ResponseUpdated(_) => step::UPDATED_RESPONSE,
            Self::NextQuestion { .. } => step::NEXT_QUESTION,
            Self::Reset => step::RESET,
            Self::Closed => step::CLOSED,
            Self::QuizStarted => step::START,
            Self::ReadingConfirmationRequested => step::READING_CONFIRMATION_REQUESTED,
        }
    }
}

impl TryFrom<&SessionMessage> for SessionEvent {
    type Error = ProtocolError;

    fn try_from(message: &SessionMessage) -> Result<Self, Self::Error> {
        Ok(match message.step.as_str() {
            step::ALL_PLAYERS => {
                let AllPlayersPayload { members } = message.decode_payload()?;
                Self::AllPlayers(members)
            }
            step::UPDATED_RESPONSE => {
                let UpdatedResponsePayload { nickname } = message.decode_payload()?;
                Self::ResponseUpdated(nickname)
            }
            step::NEXT_QUESTION => {
                let NextQuestionPayload { question_index } = message.decode_payload()?;
                Self::NextQuestion { question_index }
            }
            step::RESET => Self::Reset,
            step::CLOSED => Self::Closed,
            step::START => Self::QuizStarted,
            step::READING_CONFIRMATION_REQUESTED => Self::ReadingConfirmationRequested,
            other => return Err(ProtocolError::UnknownStep(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(raw: Value) -> SessionMessage {
        serde_json::from_value(raw).expect("frame")
    }

    #[test]
    fn decodes_next_question() {
        let message = frame(json!({
            "status": STATUS_SUCCESSFUL,
            "step": "QUIZ:NEXT_QUESTION",
            "payload": {"questionIndex": 3}
        }));
        let event = SessionEvent::try_from(&message).expect("event");
        assert_eq!(event, SessionEvent::NextQuestion { question_index: 3 });
    }

    #[test]
    fn unknown_steps_are_forward_compatible() {
        let message = frame(json!({"status": STATUS_SUCCESSFUL, "step": "QUIZ:SOMETHING_NEW"}));
        let err = SessionEvent::try_from(&message).expect_err("unknown");
        assert!(err.is_forward_compatible());
    }

    #[test]
    fn malformed_payload_is_reported() {
        let message = frame(json!({
            "status": STATUS_SUCCESSFUL,
            "step": "QUIZ:NEXT_QUESTION",
            "payload": {"questionIndex": "three"}
        }));
        let err = SessionEvent::try_from(&message).expect_err("malformed");
        assert!(matches!(err, ProtocolError::MalformedPayload { .. }));
        assert!(!err.is_forward_compatible());
    }

    #[test]
    fn start_timestamp_is_epoch_millis() {
        let message = SessionMessage::new(
            step::START,
            json!({"startTimestamp": 1_700_000_000_000_i64}),
        );
        let start = message.start_timestamp().expect("timestamp");
        assert_eq!(start.timestamp_millis(), 1_700_000_000_000);

        let empty = SessionMessage::new(step::START, Value::Null);
        assert!(matches!(
            empty.start_timestamp(),
            Err(ProtocolError::MalformedPayload { .. })
        ));

        let missing = SessionMessage::new(step::START, json!({}));
        assert!(matches!(
            missing.start_timestamp(),
            Err(ProtocolError::MissingStartTimestamp { .. })
        ));
    }
}
