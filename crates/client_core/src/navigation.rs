use tokio::sync::mpsc;
use tracing::debug;

/// Screens the live session can send a client to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Lobby,
    Voting,
    ReadingConfirmation,
    Results,
    Root,
}

impl Destination {
    pub fn path(self) -> &'static str {
        match self {
            Self::Lobby => "/quiz/flow/lobby",
            Self::Voting => "/quiz/flow/voting",
            Self::ReadingConfirmation => "/quiz/flow/reading-confirmation",
            Self::Results => "/quiz/flow/results",
            Self::Root => "/",
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

/// Forwards navigation requests to whoever owns the receiving half.
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Destination>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Destination>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, destination: Destination) {
        if self.tx.send(destination).is_err() {
            debug!(path = destination.path(), "navigation: receiver dropped");
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingNavigator {
    visited: std::sync::Mutex<Vec<Destination>>,
}

#[cfg(test)]
impl RecordingNavigator {
    pub(crate) fn visited(&self) -> Vec<Destination> {
        self.visited.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination) {
        self.visited.lock().unwrap().push(destination);
    }
}
