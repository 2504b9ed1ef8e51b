//! Entry and exit orchestration for the live-results screen.
//!
//! The controller owns the session and roster state and lends them to the dispatcher one event
//! at a time. Owner commands go out through the request facility; their effects on other clients
//! come back as ordinary session events.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use shared::{
    domain::{Question, QuestionKind, QuizDefinition, Role},
    protocol::{step, SessionMessage},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{
    aggregator::{ResponseAggregator, ResponseStats},
    clock::Clock,
    countdown::CountdownTimer,
    dispatcher::{DispatchContext, SessionEventDispatcher},
    error::CommandError,
    navigation::{Destination, Navigator},
    state::{QuizSession, Roster},
    transport::{SessionApi, SessionConnection},
};

/// Affordances installed in the owner's action bar while the results screen is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerAction {
    Back,
    Leaderboard,
    ReadingConfirmation,
    ConfidenceSlider,
    ResponseProgress,
    Fullscreen,
    Sound,
}

impl OwnerAction {
    pub const IN_PROGRESS: [OwnerAction; 6] = [
        OwnerAction::Back,
        OwnerAction::ReadingConfirmation,
        OwnerAction::ConfidenceSlider,
        OwnerAction::ResponseProgress,
        OwnerAction::Fullscreen,
        OwnerAction::Sound,
    ];

    pub const END_OF_SESSION: [OwnerAction; 3] = [
        OwnerAction::Back,
        OwnerAction::Leaderboard,
        OwnerAction::Fullscreen,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    ReadingConfirmationRequested,
    QuestionStarted { question_index: usize },
}

/// Labels summarising the possible outcomes of `question`.
pub fn answer_summary(question: &Question) -> Vec<String> {
    match &question.kind {
        QuestionKind::Ranged => ["guessed_correct", "guessed_in_range", "guessed_wrong"]
            .map(String::from)
            .to_vec(),
        QuestionKind::FreeText => ["correct_answer", "wrong_answer"].map(String::from).to_vec(),
        QuestionKind::Choice { .. } | QuestionKind::Survey { .. } => question
            .answer_options()
            .iter()
            .map(|option| option.answer_text.clone())
            .collect(),
    }
}

pub struct Collaborators {
    pub connection: Arc<dyn SessionConnection>,
    pub api: Arc<dyn SessionApi>,
    pub navigator: Arc<dyn Navigator>,
    pub clock: Arc<dyn Clock>,
}

pub struct QuizResultsController {
    session: QuizSession,
    roster: Roster,
    countdown: Option<CountdownTimer>,
    answers: Vec<String>,
    owner_actions: Vec<OwnerAction>,
    dispatcher: SessionEventDispatcher,
    events: Option<broadcast::Receiver<SessionMessage>>,
    collaborators: Collaborators,
}

impl QuizResultsController {
    pub fn new(quiz: QuizDefinition, role: Role, collaborators: Collaborators) -> Self {
        Self::with_roster(QuizSession::new(quiz, role), Roster::default(), collaborators)
    }

    /// Resumes with state carried over from a previous screen, e.g. the lobby roster.
    pub fn with_roster(session: QuizSession, roster: Roster, collaborators: Collaborators) -> Self {
        let dispatcher = SessionEventDispatcher::new(session.role);
        Self {
            session,
            roster,
            countdown: None,
            answers: Vec::new(),
            owner_actions: Vec::new(),
            dispatcher,
            events: None,
            collaborators,
        }
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn countdown(&self) -> Option<&CountdownTimer> {
        self.countdown.as_ref()
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn owner_actions(&self) -> &[OwnerAction] {
        &self.owner_actions
    }

    pub fn is_active(&self) -> bool {
        self.events.is_some()
    }

    pub async fn enter(&mut self) -> Result<()> {
        let quiz_name = self.session.name().to_string();
        self.events = Some(self.collaborators.connection.subscribe());

        if self.roster.is_empty() {
            let request = SessionMessage::new(step::GET_PLAYERS, json!({ "quizName": quiz_name }));
            if let Err(err) = self.collaborators.connection.send(request).await {
                warn!(quiz = %quiz_name, "results: roster request failed: {err:#}");
            }
        }

        match self.collaborators.api.current_state(&quiz_name).await {
            Ok(state) if state.is_successful() => self.apply_current_state(&state),
            Ok(state) => debug!(
                quiz = %quiz_name,
                status = %state.status,
                "results: no active question on the server"
            ),
            Err(err) => warn!(quiz = %quiz_name, "results: fetching current state failed: {err:#}"),
        }

        self.owner_actions = if !self.session.is_owner() {
            Vec::new()
        } else if self.session.is_final_question() {
            OwnerAction::END_OF_SESSION.to_vec()
        } else {
            OwnerAction::IN_PROGRESS.to_vec()
        };

        let authorized = self
            .collaborators
            .connection
            .authorize(&quiz_name, self.session.role)
            .await;
        if let Err(err) = authorized {
            warn!(quiz = %quiz_name, "results: authorization failed: {err:#}");
            self.exit();
            return Err(err).with_context(|| format!("failed to authorize for {quiz_name}"));
        }

        if self.aggregator().all_answered(self.session.current_question_index) {
            if let Some(countdown) = &self.countdown {
                info!(quiz = %quiz_name, "results: everyone already answered, stopping countdown");
                countdown.stop();
            }
        }

        info!(
            quiz = %quiz_name,
            role = ?self.session.role,
            question_index = self.session.current_question_index,
            "results: entered"
        );
        Ok(())
    }

    fn apply_current_state(&mut self, state: &SessionMessage) {
        let payload = match state.question_state() {
            Ok(payload) => payload,
            Err(err) => {
                warn!("results: unreadable current state: {err}");
                return;
            }
        };
        if let Some(question_index) = payload.question_index {
            self.session.set_current_question(question_index);
        }
        let Some(question) = self.session.current_question().cloned() else {
            warn!(
                question_index = self.session.current_question_index,
                "results: current question is not part of the quiz"
            );
            return;
        };
        if let Some(started_at) = payload.start_timestamp {
            match CountdownTimer::start(&question, started_at, self.collaborators.clock.as_ref()) {
                Ok(countdown) => self.countdown = Some(countdown),
                Err(err) => warn!("results: skipping countdown: {err}"),
            }
        }
        self.answers = answer_summary(&question);
    }

    /// Requests reading confirmation when the session asks for it and it is still pending,
    /// otherwise starts the current question.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome> {
        self.require_owner("advance")?;
        let quiz_name = self.session.name().to_string();
        let api = Arc::clone(&self.collaborators.api);
        let request_confirmation = self.session.config().reading_confirmation_enabled
            && !self.session.reading_confirmation_requested;
        let response = if request_confirmation {
            api.request_reading_confirmation(&quiz_name).await
        } else {
            api.start_question(&quiz_name).await
        };
        let response = response
            .inspect_err(|err| warn!(quiz = %quiz_name, "results: advance failed: {err:#}"))?;

        if !response.is_successful() {
            warn!(quiz = %quiz_name, status = %response.status, "results: advance rejected");
            return Err(CommandError::Unsuccessful {
                step: response.step,
                status: response.status,
            }
            .into());
        }

        if response.step == step::READING_CONFIRMATION_REQUESTED {
            self.refresh_answers_for_current()?;
            self.session.reading_confirmation_requested = true;
            info!(quiz = %quiz_name, "results: reading confirmation requested");
            return Ok(AdvanceOutcome::ReadingConfirmationRequested);
        }

        let started_at = response.start_timestamp().map_err(CommandError::from)?;
        let question_index = response
            .question_state()
            .map_err(CommandError::from)?
            .question_index;
        let question_index = question_index.unwrap_or(self.session.current_question_index);
        let question = self
            .session
            .question(question_index)
            .cloned()
            .ok_or(CommandError::NoSuchQuestion {
                index: question_index,
            })?;

        let countdown =
            CountdownTimer::start(&question, started_at, self.collaborators.clock.as_ref())
                .map_err(CommandError::from)
                .inspect_err(|err| warn!(quiz = %quiz_name, "results: advance failed: {err}"))?;

        self.session.set_current_question(question_index);
        self.answers = answer_summary(&question);
        self.session.reading_confirmation_requested = false;
        self.countdown = Some(countdown);
        if self.session.is_final_question() {
            self.owner_actions = OwnerAction::END_OF_SESSION.to_vec();
        }

        info!(quiz = %quiz_name, question_index, "results: question started");
        Ok(AdvanceOutcome::QuestionStarted { question_index })
    }

    fn refresh_answers_for_current(&mut self) -> Result<(), CommandError> {
        let index = self.session.current_question_index;
        let question = self
            .session
            .current_question()
            .ok_or(CommandError::NoSuchQuestion { index })?;
        self.answers = answer_summary(question);
        Ok(())
    }

    /// Resets the session on the server and returns to the lobby.
    pub async fn reset(&mut self) -> Result<()> {
        self.require_owner("reset")?;
        let quiz_name = self.session.name().to_string();
        let response = self
            .collaborators
            .api
            .reset_session(&quiz_name)
            .await
            .inspect_err(|err| warn!(quiz = %quiz_name, "results: reset failed: {err:#}"))?;

        if !response.is_successful() {
            warn!(quiz = %quiz_name, status = %response.status, "results: reset rejected");
            return Err(CommandError::Unsuccessful {
                step: response.step,
                status: response.status,
            }
            .into());
        }

        self.session.set_current_question(0);
        info!(quiz = %quiz_name, "results: session reset");
        self.collaborators.navigator.navigate(Destination::Lobby);
        Ok(())
    }

    /// Leaves the screen: stops consuming events, removes owner affordances and discards the
    /// countdown.
    pub fn exit(&mut self) {
        self.events = None;
        self.owner_actions.clear();
        self.countdown = None;
        debug!(quiz = self.session.name(), "results: exited");
    }

    /// Waits for the next inbound frame and applies it. Returns `false` once the connection is
    /// gone or the screen was exited.
    pub async fn process_next(&mut self) -> bool {
        loop {
            let Some(events) = self.events.as_mut() else {
                return false;
            };
            let received = events.recv().await;
            match received {
                Ok(message) => {
                    self.handle_message(&message);
                    return true;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "results: event stream lagged, frames were lost");
                }
                Err(RecvError::Closed) => {
                    debug!("results: event stream closed");
                    self.events = None;
                    return false;
                }
            }
        }
    }

    pub fn handle_message(&mut self, message: &SessionMessage) -> bool {
        let ctx = DispatchContext {
            session: &mut self.session,
            roster: &mut self.roster,
            countdown: self.countdown.as_ref(),
            navigator: self.collaborators.navigator.as_ref(),
        };
        self.dispatcher.dispatch_message(ctx, message)
    }

    /// Applies events until the stream ends or the screen is exited.
    pub async fn run(&mut self) {
        while self.process_next().await {}
    }

    /// Shows `index` locally without changing the session's current question.
    pub fn select_question(&mut self, index: usize) -> Result<(), CommandError> {
        let question = self
            .session
            .question(index)
            .ok_or(CommandError::NoSuchQuestion { index })?;
        self.answers = answer_summary(question);
        self.session.selected_question_index = index;
        Ok(())
    }

    fn require_owner(&self, command: &'static str) -> Result<(), CommandError> {
        if self.session.is_owner() {
            Ok(())
        } else {
            Err(CommandError::OwnerOnly { command })
        }
    }

    pub fn aggregator(&self) -> ResponseAggregator<'_> {
        ResponseAggregator::new(&self.roster)
    }

    pub fn confidence_stats(&self, question_index: Option<usize>) -> ResponseStats {
        self.aggregator().confidence_stats(question_index)
    }

    pub fn reading_confirmation_stats(&self, question_index: Option<usize>) -> ResponseStats {
        self.aggregator().reading_confirmation_stats(question_index)
    }

    pub fn response_stats(&self, question_index: Option<usize>) -> ResponseStats {
        self.aggregator().response_stats(question_index)
    }

    pub fn show_start_button(&self) -> bool {
        let session = &self.session;
        let countdown_running = self.countdown.as_ref().is_some_and(CountdownTimer::is_running);
        session.is_owner()
            && !countdown_running
            && session.current_question_index == session.selected_question_index
            && (session.current_question_index + 1 < session.question_count()
                || (session.config().reading_confirmation_enabled
                    && session.reading_confirmation_requested))
    }

    pub fn show_confidence_rate(&self, question_index: usize) -> bool {
        self.aggregator().has_confidence(question_index)
            || self.session.config().confidence_slider_enabled
    }

    pub fn show_reading_confirmation(&self, question_index: usize) -> bool {
        self.aggregator().has_reading_confirmation(question_index)
            || self.session.config().reading_confirmation_enabled
    }

    pub fn show_response_progress(&self) -> bool {
        self.session.config().show_response_progress
    }

    pub fn show_leaderboard_button(&self, question_index: usize) -> bool {
        self.session
            .question(question_index)
            .is_some_and(|question| !question.is_survey())
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
