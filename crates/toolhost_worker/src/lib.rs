//! Per-namespace persistent worker supervision: one long-lived
//! subprocess per discovered tool file, multiplexed calls by correlation
//! id, capped exponential backoff restarts, permanent failure for workers
//! that never became ready.

mod attachment;
mod backoff;
mod error;
mod state;
mod supervisor;

pub use attachment::run_attachment_loop;
pub use backoff::{restart_backoff, BACKOFF_CAP_SECS};
pub use error::WorkerError;
pub use state::WorkerStatus;
pub use supervisor::{WorkerCommand, WorkerSupervisor, CALL_TIMEOUT};
