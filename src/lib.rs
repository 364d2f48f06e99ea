//! kubehist — offline Kubernetes audit-log history inspector.
//!
//! Reconstructs per-resource timelines of revisions and events from a batch
//! of Kubernetes audit log entries. [`pipeline::tasks::run_inspection`] is
//! the entry point; `src/main.rs` is a thin CLI shell over it.
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::must_use_candidate,   // internal helpers; callers are tests, not library consumers
    clippy::missing_errors_doc,   // most errors are self-explanatory from the variant name
    clippy::missing_panics_doc,   // Mutex::lock().unwrap() sites are local and can't deadlock
)]

pub mod cli;

pub mod config;
pub mod error;
pub mod history;
pub mod log;
pub mod modifiers;
pub mod node;
pub mod pipeline;
pub mod resource;
pub mod task;
