use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(QuestionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Attendee,
}

impl Role {
    pub fn is_owner(self) -> bool {
        self == Self::Owner
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(rename = "answerText")]
    pub answer_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Ranged,
    FreeText,
    Choice {
        #[serde(default, rename = "answerOptionList")]
        answer_options: Vec<AnswerOption>,
    },
    Survey {
        #[serde(default, rename = "answerOptionList")]
        answer_options: Vec<AnswerOption>,
    },
}

/// A single question of a quiz. Immutable once the session has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// Countdown window in seconds.
    pub timer: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn answer_options(&self) -> &[AnswerOption] {
        match &self.kind {
            QuestionKind::Choice { answer_options } | QuestionKind::Survey { answer_options } => {
                answer_options
            }
            QuestionKind::Ranged | QuestionKind::FreeText => &[],
        }
    }

    pub fn is_survey(&self) -> bool {
        matches!(self.kind, QuestionKind::Survey { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub reading_confirmation_enabled: bool,
    #[serde(default)]
    pub confidence_slider_enabled: bool,
    #[serde(default)]
    pub show_response_progress: bool,
}

/// What one participant submitted for one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    #[serde(default)]
    pub value: Value,
    /// Self-reported confidence, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_confirmation: Option<bool>,
}

impl ParticipantResponse {
    /// Whether the submitted value counts as an answer. Mirrors the loose truthiness the
    /// browser clients apply to the same payload: `null`, `false`, `0` and `""` do not count.
    pub fn has_value(&self) -> bool {
        match &self.value {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
            Value::String(text) => !text.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn confirmed_reading(&self) -> bool {
        self.reading_confirmation == Some(true)
    }
}

/// A roster entry. `responses` is indexed by question index; holes are `null` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    #[serde(default)]
    pub responses: Vec<Option<ParticipantResponse>>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Vec::new(),
        }
    }

    pub fn response(&self, question_index: usize) -> Option<&ParticipantResponse> {
        self.responses.get(question_index)?.as_ref()
    }

    pub fn set_response(&mut self, question_index: usize, response: ParticipantResponse) {
        if self.responses.len() <= question_index {
            self.responses.resize(question_index + 1, None);
        }
        self.responses[question_index] = Some(response);
    }

    pub fn has_answered(&self, question_index: usize) -> bool {
        self.response(question_index)
            .is_some_and(ParticipantResponse::has_value)
    }
}

/// The static part of a quiz session, as loaded from a quiz definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub hashtag: String,
    #[serde(rename = "questionList")]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub session_config: SessionConfig,
}
