//! Service layer
//!
//! Services contain the maintenance logic. They orchestrate host operations
//! (commands, processes, OS services) into the Docker lifecycle, disk
//! compaction and the full maintenance pipeline.
//!
//! The scheduler sees the pipeline only through the [`MaintenanceTask`] trait.

pub mod docker;
pub mod pipeline;
pub mod vhd;

// Re-export traits
pub use pipeline::MaintenanceTask;

// Re-export implementations
pub use docker::{DockerLifecycle, RecoveryOutcome};
pub use pipeline::MaintenancePipeline;
pub use vhd::VhdOptimizer;
