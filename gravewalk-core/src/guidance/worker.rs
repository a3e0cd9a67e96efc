use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use chrono::{DateTime, Utc};
use geo::Coord;
use log::{debug, warn};
use tokio::sync::watch;

use super::{GuidanceState, Session};
use crate::model::FeatureId;

#[derive(Debug, Clone, Copy)]
enum Command {
    StartRouting(FeatureId),
    StartRoutingFrom(Coord<f64>, FeatureId),
    Position(Coord<f64>, DateTime<Utc>),
    Cancel,
    Reset,
}

/// Runs a [`Session`] on its own thread
///
/// Calls only enqueue a command and return; results are observed through
/// [`SessionWorker::subscribe`]. Whatever is queued when the thread wakes up
/// is handled as one batch: of the position samples only the newest is
/// tracked, and samples queued before a start, cancel or reset are recorded as
/// the visitor position without being tracked.
#[derive(Debug)]
pub struct SessionWorker {
    commands: Sender<Command>,
    state: watch::Receiver<GuidanceState>,
    thread: JoinHandle<Session>,
}

impl SessionWorker {
    pub fn spawn(session: Session) -> Self {
        let (commands, receiver) = mpsc::channel();
        let state = session.subscribe();
        let thread = thread::spawn(move || run(session, &receiver));
        Self {
            commands,
            state,
            thread,
        }
    }

    pub fn start_routing(&self, destination: FeatureId) {
        self.send(Command::StartRouting(destination));
    }

    pub fn start_routing_from(&self, start: Coord<f64>, destination: FeatureId) {
        self.send(Command::StartRoutingFrom(start, destination));
    }

    pub fn submit_position(&self, coord: Coord<f64>, timestamp: DateTime<Utc>) {
        self.send(Command::Position(coord, timestamp));
    }

    pub fn cancel_routing(&self) {
        self.send(Command::Cancel);
    }

    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    pub fn state(&self) -> GuidanceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuidanceState> {
        self.state.clone()
    }

    /// Handles everything already queued, stops the thread and hands the
    /// session back. `None` if the session thread panicked.
    pub fn shutdown(self) -> Option<Session> {
        drop(self.commands);
        self.thread.join().ok()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Session thread is gone, dropping {command:?}");
        }
    }
}

fn run(mut session: Session, receiver: &Receiver<Command>) -> Session {
    while let Ok(first) = receiver.recv() {
        let mut batch = vec![first];
        batch.extend(receiver.try_iter());
        process(&mut session, batch);
    }
    debug!("Session thread finished");
    session
}

fn process(session: &mut Session, batch: Vec<Command>) {
    let mut pending: Option<(Coord<f64>, DateTime<Utc>)> = None;

    for command in batch {
        if let Command::Position(coord, timestamp) = command {
            if pending.is_none_or(|(_, newest)| timestamp >= newest) {
                pending = Some((coord, timestamp));
            }
            continue;
        }
        if let Some((coord, timestamp)) = pending.take() {
            session.note_position(coord, timestamp);
        }

        // Failures are published into the session state
        let _ = match command {
            Command::StartRouting(destination) => session.start_routing(destination),
            Command::StartRoutingFrom(start, destination) => {
                session.start_routing_from(start, destination)
            }
            Command::Cancel => {
                session.cancel_routing();
                Ok(())
            }
            Command::Reset => {
                session.reset();
                Ok(())
            }
            Command::Position(..) => Ok(()),
        };
    }

    if let Some((coord, timestamp)) = pending {
        let outcome = session.submit_position(coord, timestamp);
        debug!("Sample at {timestamp}: {outcome:?}");
    }
}
