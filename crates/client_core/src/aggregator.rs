use serde::Serialize;
use shared::domain::ParticipantResponse;

use crate::state::Roster;

/// A summary figure shown next to a question: `absolute` out of `base` participants, plus a
/// display percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseStats {
    pub base: usize,
    pub absolute: usize,
    pub percent: String,
}

impl ResponseStats {
    fn empty(base: usize) -> Self {
        Self {
            base,
            absolute: 0,
            percent: String::from("0"),
        }
    }
}

/// Formats a ratio as a whole percentage, e.g. `0.7` as `70%`.
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", (ratio * 100.0).round() as i64)
}

/// Read-only statistics over the roster. A `None` question index means no question is
/// selected and yields zeroed figures.
pub struct ResponseAggregator<'a> {
    roster: &'a Roster,
}

impl<'a> ResponseAggregator<'a> {
    pub fn new(roster: &'a Roster) -> Self {
        Self { roster }
    }

    fn responses(&self, question_index: usize) -> impl Iterator<Item = &'a ParticipantResponse> {
        let roster = self.roster;
        roster
            .participants()
            .iter()
            .filter_map(move |participant| participant.response(question_index))
    }

    pub fn confidence_stats(&self, question_index: Option<usize>) -> ResponseStats {
        let base = self.roster.len();
        let Some(question_index) = question_index else {
            return ResponseStats::empty(base);
        };

        // A confidence of 0 adds nothing to the sum and does not count as reported.
        let (absolute, total) = self
            .responses(question_index)
            .filter_map(|response| response.confidence)
            .fold((0usize, 0u64), |(count, sum), confidence| {
                (count + usize::from(confidence > 0), sum + u64::from(confidence))
            });

        ResponseStats {
            base,
            absolute,
            percent: format_percent(total as f64 / absolute.max(1) as f64 / 100.0),
        }
    }

    pub fn reading_confirmation_stats(&self, question_index: Option<usize>) -> ResponseStats {
        let base = self.roster.len();
        let Some(question_index) = question_index else {
            return ResponseStats::empty(base);
        };

        let absolute = self
            .responses(question_index)
            .filter(|response| response.confirmed_reading())
            .count();

        ResponseStats {
            base,
            absolute,
            percent: format_percent(absolute as f64 / base.max(1) as f64),
        }
    }

    /// How many participants have answered, for the response-progress display.
    pub fn response_stats(&self, question_index: Option<usize>) -> ResponseStats {
        let base = self.roster.len();
        let Some(question_index) = question_index else {
            return ResponseStats::empty(base);
        };

        let absolute = self.answered_count(question_index);
        ResponseStats {
            base,
            absolute,
            percent: format_percent(absolute as f64 / base.max(1) as f64),
        }
    }

    pub fn answered_count(&self, question_index: usize) -> usize {
        self.roster
            .participants()
            .iter()
            .filter(|participant| participant.has_answered(question_index))
            .count()
    }

    /// True when every participant has answered. An empty lobby never counts as answered.
    pub fn all_answered(&self, question_index: usize) -> bool {
        !self.roster.is_empty()
            && self
                .roster
                .participants()
                .iter()
                .all(|participant| participant.has_answered(question_index))
    }

    pub fn has_confidence(&self, question_index: usize) -> bool {
        self.responses(question_index)
            .any(|response| response.confidence.is_some_and(|confidence| confidence > 0))
    }

    pub fn has_reading_confirmation(&self, question_index: usize) -> bool {
        self.responses(question_index)
            .any(ParticipantResponse::confirmed_reading)
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
