use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown session step: {0}")]
    UnknownStep(String),
    #[error("malformed payload for {step}: {source}")]
    MalformedPayload {
        step: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{step} carried no start timestamp")]
    MissingStartTimestamp { step: String },
    #[error("countdown of {timer}s from {started_at} ends outside the supported time range")]
    CountdownOutOfRange {
        started_at: chrono::DateTime<chrono::Utc>,
        timer: u32,
    },
}

impl ProtocolError {
    /// Unknown steps are expected from newer servers and are not worth surfacing.
    pub fn is_forward_compatible(&self) -> bool {
        matches!(self, Self::UnknownStep(_))
    }
}
