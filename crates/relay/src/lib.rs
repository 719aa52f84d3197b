//! The relay core: per-identity polling, duplicate suppression and delivery,
//! tied to the lifecycle of one chat session at a time.
//!
//! - [`NotificationGate`] owns the per-identity delivery state and exposes a
//!   single atomic check-and-record operation.
//! - [`DeliveryPipeline`] waits out the spoiler delay and posts the permalink.
//! - [`Supervisor`] connects, runs one [`PollLoop`] per tracked identity while
//!   the session is live, drains them all when it is lost and reconnects after
//!   a constant backoff.

pub mod delivery;
pub mod error;
pub mod gate;
pub mod poller;
pub mod supervisor;

pub use {
    delivery::DeliveryPipeline,
    error::DeliveryError,
    gate::{Decision, NotificationGate},
    poller::{CycleOutcome, PollContext, PollLoop},
    supervisor::{Supervisor, SupervisorEvent, SupervisorEventSink, SupervisorState},
};
