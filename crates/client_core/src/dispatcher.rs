use shared::{
    domain::Role,
    protocol::{SessionEvent, SessionMessage},
};
use tracing::{debug, info, warn};

use crate::{
    aggregator::ResponseAggregator,
    countdown::CountdownTimer,
    navigation::{Destination, Navigator},
    state::{QuizSession, Roster},
};

/// Everything one event may touch, lent by the controller for the duration of the call.
pub struct DispatchContext<'a> {
    pub session: &'a mut QuizSession,
    pub roster: &'a mut Roster,
    pub countdown: Option<&'a CountdownTimer>,
    pub navigator: &'a dyn Navigator,
}

/// Role-specific reactions layered on top of the shared event table.
pub trait RoleHandler: Send + Sync {
    fn role(&self) -> Role;
    fn on_event(&self, event: &SessionEvent, navigator: &dyn Navigator);
}

pub struct OwnerHandler;

impl RoleHandler for OwnerHandler {
    fn role(&self) -> Role {
        Role::Owner
    }

    fn on_event(&self, _event: &SessionEvent, _navigator: &dyn Navigator) {}
}

pub struct AttendeeHandler;

impl RoleHandler for AttendeeHandler {
    fn role(&self) -> Role {
        Role::Attendee
    }

    fn on_event(&self, event: &SessionEvent, navigator: &dyn Navigator) {
        match event {
            SessionEvent::QuizStarted => navigator.navigate(Destination::Voting),
            SessionEvent::ReadingConfirmationRequested => {
                navigator.navigate(Destination::ReadingConfirmation)
            }
            _ => {}
        }
    }
}

pub fn role_handler(role: Role) -> Box<dyn RoleHandler> {
    match role {
        Role::Owner => Box::new(OwnerHandler),
        Role::Attendee => Box::new(AttendeeHandler),
    }
}

/// Applies inbound session events to the local session state, one at a time.
pub struct SessionEventDispatcher {
    role_handler: Box<dyn RoleHandler>,
}

impl SessionEventDispatcher {
    pub fn new(role: Role) -> Self {
        Self::with_handler(role_handler(role))
    }

    pub fn with_handler(role_handler: Box<dyn RoleHandler>) -> Self {
        Self { role_handler }
    }

    pub fn role(&self) -> Role {
        self.role_handler.role()
    }

    /// Decodes and applies a raw frame. Frames that cannot be decoded are dropped; returns
    /// whether the frame was applied.
    pub fn dispatch_message(&self, ctx: DispatchContext<'_>, message: &SessionMessage) -> bool {
        match SessionEvent::try_from(message) {
            Ok(event) => {
                self.dispatch(ctx, &event);
                true
            }
            Err(err) if err.is_forward_compatible() => {
                debug!(step = %message.step, "dispatch: ignoring unknown session step");
                false
            }
            Err(err) => {
                warn!(step = %message.step, "dispatch: dropping undecodable frame: {err}");
                false
            }
        }
    }

    pub fn dispatch(&self, ctx: DispatchContext<'_>, event: &SessionEvent) {
        let DispatchContext {
            session,
            roster,
            countdown,
            navigator,
        } = ctx;
        debug!(step = event.step(), "dispatch: applying session event");

        match event {
            SessionEvent::AllPlayers(members) => {
                for member in members {
                    roster.merge(member.clone());
                }
                debug!(participants = roster.len(), "dispatch: roster snapshot merged");
            }
            SessionEvent::ResponseUpdated(participant) => {
                debug!(participant = %participant.name, "dispatch: response updated");
                roster.update_responses(participant.clone());
                let question_index = session.current_question_index;
                if let Some(countdown) = countdown {
                    if countdown.is_running()
                        && ResponseAggregator::new(roster).all_answered(question_index)
                    {
                        info!(question_index, "dispatch: everyone answered, ending countdown");
                        countdown.signal_all_answered();
                    }
                }
            }
            SessionEvent::NextQuestion { question_index } => {
                session.set_current_question(*question_index);
                info!(question_index, "dispatch: advanced to question");
            }
            SessionEvent::Reset => {
                roster.clear_responses();
                session.set_current_question(0);
                info!(quiz = session.name(), "dispatch: session reset");
                navigator.navigate(Destination::Lobby);
            }
            SessionEvent::Closed => {
                info!(quiz = session.name(), "dispatch: session closed");
                navigator.navigate(Destination::Root);
            }
            SessionEvent::QuizStarted | SessionEvent::ReadingConfirmationRequested => {}
        }

        self.role_handler.on_event(event, navigator);
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
