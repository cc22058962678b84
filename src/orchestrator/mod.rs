//! Application-level orchestration utilities.
//!
//! Post-run processing (persisting the run record and exports) lives here so
//! the text, JSON and silent modes share one path after the engine finishes.

mod post_process;

pub(crate) use post_process::{process_run_completion, Exports, ProcessedRun};
