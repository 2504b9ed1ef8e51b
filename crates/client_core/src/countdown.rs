//! Countdown shared by every client viewing the same question.
//!
//! The remaining time is derived once from the server-issued start timestamp, so a client that
//! joins late or reloads lands on the same value as everyone else. After that the timer only
//! ticks cosmetically, one decrement per second.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use shared::{domain::Question, error::ProtocolError};
use tokio::{
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::debug;

use crate::clock::Clock;

const TICK: Duration = Duration::from_secs(1);

pub type CountdownListener = Arc<dyn Fn(i64) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct CountdownState {
    remaining: i64,
    running: bool,
    listeners: Vec<(ListenerId, CountdownListener)>,
    next_listener: u64,
}

impl CountdownState {
    fn listeners(&self) -> Vec<CountdownListener> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

fn lock(state: &Mutex<CountdownState>) -> MutexGuard<'_, CountdownState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// Listeners run after the lock is released so they may call back into the timer.
fn notify(listeners: &[CountdownListener], remaining: i64) {
    for listener in listeners {
        listener(remaining);
    }
}

/// Whole seconds between `now` and `end`, rounded half up.
pub fn remaining_seconds(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (end - now).num_milliseconds();
    (millis as f64 / 1000.0 + 0.5).floor() as i64
}

pub struct CountdownTimer {
    state: Arc<Mutex<CountdownState>>,
    end: DateTime<Utc>,
    ticker: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Anchors a countdown for `question` at `started_at`. A window that has already elapsed
    /// yields a stopped timer that never ticks.
    ///
    /// A running timer ticks on the ambient Tokio runtime, so this must be called from within
    /// one. Fails when the window ends past the range `DateTime` can represent.
    pub fn start(
        question: &Question,
        started_at: DateTime<Utc>,
        clock: &dyn Clock,
    ) -> Result<Self, ProtocolError> {
        let end = started_at
            .checked_add_signed(chrono::Duration::seconds(i64::from(question.timer)))
            .ok_or(ProtocolError::CountdownOutOfRange {
                started_at,
                timer: question.timer,
            })?;
        let remaining = remaining_seconds(end, clock.now());
        let running = remaining > 0;
        let state = Arc::new(Mutex::new(CountdownState {
            remaining: remaining.max(0),
            running,
            listeners: Vec::new(),
            next_listener: 0,
        }));

        debug!(
            question_id = question.id.0,
            remaining, running, "countdown: anchored to server start"
        );

        let ticker = running.then(|| spawn_ticker(Arc::clone(&state)));
        Ok(Self { state, end, ticker })
    }

    pub fn remaining_time(&self) -> i64 {
        lock(&self.state).remaining
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.end
    }

    /// Registers a listener for tick notifications. Listeners are called in registration order
    /// and only see notifications emitted after they subscribed.
    pub fn subscribe(&self, listener: impl Fn(i64) + Send + Sync + 'static) -> ListenerId {
        let mut state = lock(&self.state);
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = lock(&self.state);
        let before = state.listeners.len();
        state.listeners.retain(|(registered, _)| *registered != id);
        state.listeners.len() != before
    }

    /// Stops the countdown at zero. Only the call that actually stops a running timer notifies.
    pub fn stop(&self) {
        let listeners = {
            let mut state = lock(&self.state);
            let was_running = state.running;
            state.running = false;
            state.remaining = 0;
            if !was_running {
                return;
            }
            state.listeners()
        };
        if let Some(ticker) = &self.ticker {
            ticker.abort();
        }
        debug!("countdown: stopped explicitly");
        notify(&listeners, 0);
    }

    /// Shortens a running countdown to its final second once everybody has answered. The tick
    /// loop then performs the last decrement and stop itself, so the stop notification is
    /// emitted exactly once. Returns whether the timer was running.
    pub fn signal_all_answered(&self) -> bool {
        let mut state = lock(&self.state);
        if !state.running {
            return false;
        }
        state.remaining = 1;
        true
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

fn spawn_ticker(state: Arc<Mutex<CountdownState>>) -> JoinHandle<()> {
    let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            let (remaining, finished, listeners) = {
                let mut state = lock(&state);
                if !state.running {
                    return;
                }
                state.remaining -= 1;
                if state.remaining <= 0 {
                    state.remaining = 0;
                    state.running = false;
                }
                (state.remaining, !state.running, state.listeners())
            };
            notify(&listeners, remaining);
            if finished {
                debug!("countdown: elapsed");
                return;
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/countdown_tests.rs"]
mod tests;
