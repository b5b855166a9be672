//! Domain types shared by the coordinator, the workers and the job runtime.
//!
//! Nothing in this crate performs I/O. Storage, brokering and execution live
//! in the sibling crates and speak in terms of the types defined here.

pub mod artifact;
pub mod entity;
pub mod error;
pub mod job;
pub mod kind;
pub mod metric_names;
pub mod status;
pub mod types;
