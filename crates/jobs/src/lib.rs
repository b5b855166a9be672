//! Job runtime shared by the coordinator and the workers.
//!
//! - [`wrapper`] runs a job body against a loaded entity and always persists
//!   the resulting status, whatever the body did.
//! - [`bodies`] and [`table`] hold the closed set of job bodies.
//! - [`executor`], [`admission`] and [`memory`] implement the coordinator's
//!   memory-gated local executor.
//! - [`launcher`] and [`child`] run a single job in isolation (child process
//!   or supervised task).

pub mod admission;
pub mod bodies;
pub mod child;
pub mod computation;
pub mod context;
pub mod error;
pub mod executor;
pub mod launcher;
pub mod memory;
pub mod table;
pub mod wrapper;

pub use context::JobContext;
pub use error::{ExecError, JobError};
pub use table::{JobArgs, JobOutcome, JobRequest};
