//! Host layer
//!
//! Everything that touches the operating system goes through here:
//! - `runner`: external command execution with timeouts
//! - `controller`: processes and OS services built on top of the runner
//!
//! Both are trait-backed so the service layer can be tested against a
//! scripted host.

pub mod controller;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{Platform, ServiceController};
pub use runner::{CommandRunner, SystemCommandRunner};
