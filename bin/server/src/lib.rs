//! feedback-relay HTTP server.
//!
//! Hosts the chat widget API and runs the triage pipeline on a schedule.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
