//! Application-level orchestration.
//!
//! This module owns the dashboard session (credential, dispatch-and-poll
//! lifecycle) and the data refresh that feeds the normalizer and sort engine.
//! CLI code calls into this module to keep responsibilities separated.

mod controller;
mod refresh;

pub use controller::Dashboard;
