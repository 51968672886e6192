//! Concurrent session execution engine
//!
//! Two levels of concurrency: the [`Orchestrator`] runs every [`Session`] as
//! its own task, and each session's [`EventPipeline`] spawns one
//! [`ConfirmationPoller`] task per successfully submitted event. Both levels
//! are joined explicitly before results are handed out.

pub mod cancellation;
pub mod orchestrator;
pub mod pipeline;
pub mod poller;
pub mod session;

pub use cancellation::{CancelHandle, CancellationSignal};
pub use orchestrator::Orchestrator;
pub use pipeline::EventPipeline;
pub use poller::{ConfirmationPoller, PollerConfig};
pub use session::{Session, SessionConfig};
