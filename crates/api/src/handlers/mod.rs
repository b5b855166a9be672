pub mod callback;
pub mod controllers;
pub mod health;
pub mod metrics;
