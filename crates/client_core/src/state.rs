use shared::domain::{Participant, Question, QuizDefinition, Role, SessionConfig};

/// The live session as seen by this client. Owned by the controller and lent to the
/// dispatcher for the duration of one event.
#[derive(Debug, Clone)]
pub struct QuizSession {
    pub quiz: QuizDefinition,
    pub role: Role,
    pub current_question_index: usize,
    /// The question the local view is showing; follows `current_question_index` on advance.
    pub selected_question_index: usize,
    pub reading_confirmation_requested: bool,
}

impl QuizSession {
    pub fn new(quiz: QuizDefinition, role: Role) -> Self {
        Self {
            quiz,
            role,
            current_question_index: 0,
            selected_question_index: 0,
            reading_confirmation_requested: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.quiz.hashtag
    }

    pub fn config(&self) -> SessionConfig {
        self.quiz.session_config
    }

    pub fn is_owner(&self) -> bool {
        self.role.is_owner()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.quiz.questions.get(index)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.question(self.current_question_index)
    }

    pub fn question_count(&self) -> usize {
        self.quiz.questions.len()
    }

    pub fn is_final_question(&self) -> bool {
        self.current_question_index + 1 == self.question_count()
    }

    pub fn set_current_question(&mut self, index: usize) {
        self.current_question_index = index;
        self.selected_question_index = index;
    }
}

/// Participants known to this client, in join order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Adds a participant, or replaces the entry with the same name.
    pub fn merge(&mut self, participant: Participant) {
        match self.participants.iter_mut().find(|p| p.name == participant.name) {
            Some(existing) => *existing = participant,
            None => self.participants.push(participant),
        }
    }

    /// Replaces the response records of `participant`. Unknown names join the roster.
    pub fn update_responses(&mut self, participant: Participant) {
        match self.participants.iter_mut().find(|p| p.name == participant.name) {
            Some(existing) => existing.responses = participant.responses,
            None => self.participants.push(participant),
        }
    }

    pub fn clear_responses(&mut self) {
        for participant in &mut self.participants {
            participant.responses.clear();
        }
    }
}

impl FromIterator<Participant> for Roster {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        let mut roster = Self::default();
        for participant in iter {
            roster.merge(participant);
        }
        roster
    }
}
