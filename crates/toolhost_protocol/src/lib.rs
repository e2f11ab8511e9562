//! Wire frame types for the two duplex planes of the runtime:
//!
//! - the external client plane (`client` module): scripts and direct RPC
//!   calls in, results/errors/broadcasts out.
//! - the internal worker-attachment plane (`worker` module): the
//!   supervisor's side of talking to a persistent per-namespace worker
//!   subprocess.
//!
//! Both planes are plain JSON over a duplex channel and are demultiplexed
//! by a caller-chosen correlation id, never by message order.

pub mod client;
pub mod error;
pub mod metrics;
pub mod worker;

pub use client::{ClientRequest, ClientResponse, NamespaceSummary};
pub use error::ProtocolError;
pub use metrics::{Metrics, MetricsSnapshot, METRICS};
pub use worker::{ServerToWorker, WorkerToServer};
