//! Core domain types
//!
//! This module contains the core domain structures used across Drydock crates.
//! They are shared between the daemon (which produces them) and the CLI
//! (which renders them).

pub mod command;
pub mod log;
pub mod report;
pub mod schedule;
pub mod service;
