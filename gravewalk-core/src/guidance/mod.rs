//! Live guidance: the per-visitor session state machine and the observable
//! state it publishes.

mod session;
mod state;
mod worker;

pub use session::{Phase, PositionSample, SampleOutcome, Session};
pub use state::{GuidancePublisher, GuidanceState};
pub use worker::SessionWorker;
