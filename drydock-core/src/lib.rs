//! Drydock Core
//!
//! Core types and abstractions for the Drydock maintenance daemon.
//!
//! This crate contains:
//! - Domain types: commands, service status, run reports, schedule state, log entries
//! - Errors: the typed failures surfaced by host interaction

pub mod domain;
pub mod error;

pub use error::HostError;
