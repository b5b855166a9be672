//! Coordinator library.
//!
//! Exposes the registry, ledger, dispatcher, scheduler and HTTP surface so
//! integration tests and the binary entrypoint can both access them.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod registry;
pub mod response;
pub mod routes;
pub mod schedule;
pub mod signals;
pub mod state;
