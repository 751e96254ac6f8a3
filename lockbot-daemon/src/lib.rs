//! lockbot daemon runtime: interval scheduler + reconcile processor + control socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{DaemonClient, DaemonRequest, DaemonResponse};
pub use runtime::{init_tracing, run, start_blocking, PassSummary, RunHistory};
