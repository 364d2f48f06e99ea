//! The audit-log reconstruction pipeline built on top of the task graph
//! (spec §2 item 2): filtering, sorting, grouping, manifest reconstruction,
//! and resource lifetime detection.

pub mod filter;
pub mod group;
pub mod grouper;
pub mod lifetime;
pub mod manifest;
pub mod sort;
pub mod tasks;

pub use grouper::{ChangeTargetGrouper, SubresourceDefaultBehavior, TargetOperation, TargetRouting};
pub use lifetime::{LifetimeAnnotation, LifetimeState, ResourceLifetimeTracker};
pub use manifest::{ManifestGenerator, ManifestSnapshot, ManifestState};
