pub mod aggregator;
pub mod clock;
pub mod controller;
pub mod countdown;
pub mod dispatcher;
pub mod error;
pub mod navigation;
pub mod state;
pub mod transport;

pub use aggregator::{ResponseAggregator, ResponseStats};
pub use clock::{Clock, SystemClock};
pub use controller::{AdvanceOutcome, Collaborators, OwnerAction, QuizResultsController};
pub use countdown::{CountdownTimer, ListenerId};
pub use dispatcher::{RoleHandler, SessionEventDispatcher};
pub use error::CommandError;
pub use navigation::{ChannelNavigator, Destination, Navigator};
pub use transport::{
    ConnectionCredentials, HttpSessionApi, SessionApi, SessionConnection, WebSocketConnection,
};
