use super::*;
use crate::{
    clock::FixedClock,
    navigation::RecordingNavigator,
    tests::fixtures::{answered, frame, free_text, quiz},
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use shared::{
    domain::{Participant, SessionConfig},
    protocol::step,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

struct Harness {
    session: QuizSession,
    roster: Roster,
    navigator: RecordingNavigator,
    dispatcher: SessionEventDispatcher,
}

impl Harness {
    fn new(role: Role) -> Self {
        let quiz = quiz(
            vec![free_text(1, 30), free_text(2, 30), free_text(3, 30)],
            SessionConfig::default(),
        );
        Self {
            session: QuizSession::new(quiz, role),
            roster: Roster::default(),
            navigator: RecordingNavigator::default(),
            dispatcher: SessionEventDispatcher::new(role),
        }
    }

    fn send(&mut self, message: SessionMessage, countdown: Option<&CountdownTimer>) -> bool {
        let ctx = DispatchContext {
            session: &mut self.session,
            roster: &mut self.roster,
            countdown,
            navigator: &self.navigator,
        };
        self.dispatcher.dispatch_message(ctx, &message)
    }
}

fn players(members: &[Participant]) -> SessionMessage {
    frame(step::ALL_PLAYERS, json!({ "members": members }))
}

fn response(participant: &Participant) -> SessionMessage {
    frame(step::UPDATED_RESPONSE, json!({ "nickname": participant }))
}

#[test]
fn role_handler_matches_role() {
    assert_eq!(role_handler(Role::Owner).role(), Role::Owner);
    assert_eq!(role_handler(Role::Attendee).role(), Role::Attendee);
    assert_eq!(SessionEventDispatcher::new(Role::Attendee).role(), Role::Attendee);
}

#[test]
fn roster_snapshot_is_merged() {
    let mut harness = Harness::new(Role::Owner);
    harness.roster.merge(Participant::new("ada"));

    assert!(harness.send(
        players(&[Participant::new("ada"), Participant::new("bob")]),
        None
    ));
    assert_eq!(harness.roster.len(), 2);
}

#[test]
fn response_update_replaces_records() {
    let mut harness = Harness::new(Role::Owner);
    harness.send(players(&[Participant::new("ada")]), None);
    harness.send(response(&answered("ada", 0)), None);

    assert!(harness.roster.participants()[0].has_answered(0));
}

#[test]
fn next_question_moves_both_indices() {
    let mut harness = Harness::new(Role::Attendee);
    harness.send(frame(step::NEXT_QUESTION, json!({ "questionIndex": 2 })), None);
    assert_eq!(harness.session.current_question_index, 2);
    assert_eq!(harness.session.selected_question_index, 2);
    assert!(harness.navigator.visited().is_empty());
}

#[test]
fn reset_clears_responses_and_returns_to_lobby() {
    let mut harness = Harness::new(Role::Owner);
    harness.send(players(&[answered("ada", 0), answered("bob", 0)]), None);
    harness.session.set_current_question(2);

    harness.send(frame(step::RESET, json!({})), None);

    assert_eq!(harness.session.current_question_index, 0);
    assert_eq!(harness.roster.len(), 2);
    assert!(harness
        .roster
        .participants()
        .iter()
        .all(|participant| participant.responses.is_empty()));
    assert_eq!(harness.navigator.visited(), vec![Destination::Lobby]);
}

#[test]
fn closed_session_navigates_to_root() {
    let mut harness = Harness::new(Role::Attendee);
    harness.send(frame(step::CLOSED, json!(null)), None);
    assert_eq!(harness.navigator.visited(), vec![Destination::Root]);
}

#[test]
fn attendee_follows_quiz_flow() {
    let mut harness = Harness::new(Role::Attendee);
    harness.send(frame(step::START, json!({})), None);
    harness.send(frame(step::READING_CONFIRMATION_REQUESTED, json!({})), None);
    assert_eq!(
        harness.navigator.visited(),
        vec![Destination::Voting, Destination::ReadingConfirmation]
    );
}

#[test]
fn owner_stays_on_results_for_quiz_flow_events() {
    let mut harness = Harness::new(Role::Owner);
    harness.send(frame(step::START, json!({})), None);
    harness.send(frame(step::READING_CONFIRMATION_REQUESTED, json!({})), None);
    assert!(harness.navigator.visited().is_empty());
}

#[test]
fn unknown_and_malformed_frames_are_ignored() {
    let mut harness = Harness::new(Role::Attendee);
    harness.session.set_current_question(1);

    assert!(!harness.send(frame("QUIZ:FUTURE_FEATURE", json!({ "x": 1 })), None));
    assert!(!harness.send(
        frame(step::NEXT_QUESTION, json!({ "questionIndex": "two" })),
        None
    ));

    assert_eq!(harness.session.current_question_index, 1);
    assert!(harness.navigator.visited().is_empty());
}

#[tokio::test(start_paused = true)]
async fn last_answer_shortens_running_countdown_to_one_tick() {
    let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let clock = FixedClock(now);
    let countdown =
        CountdownTimer::start(&free_text(1, 10), now - chrono::Duration::seconds(3), &clock)
            .expect("countdown");
    let notifications = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notifications);
    countdown.subscribe(move |remaining| sink.lock().unwrap().push(remaining));

    let mut harness = Harness::new(Role::Owner);
    harness.send(
        players(&[Participant::new("ada"), Participant::new("bob")]),
        Some(&countdown),
    );

    harness.send(response(&answered("ada", 0)), Some(&countdown));
    assert_eq!(countdown.remaining_time(), 7);

    harness.send(response(&answered("bob", 0)), Some(&countdown));
    assert_eq!(countdown.remaining_time(), 1);
    assert!(countdown.is_running());

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(!countdown.is_running());
    assert_eq!(countdown.remaining_time(), 0);

    // A repeated answer after the stop must not restart or re-notify.
    harness.send(response(&answered("bob", 0)), Some(&countdown));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(notifications.lock().unwrap().clone(), vec![0]);
}

#[test]
fn answers_without_countdown_change_nothing_else() {
    let mut harness = Harness::new(Role::Owner);
    harness.send(players(&[Participant::new("ada")]), None);
    harness.send(response(&answered("ada", 0)), None);
    assert!(harness.navigator.visited().is_empty());
}
