//! Submission adapter and task polling state machine.
//!
//! Backends ([`TaskBackend`]) hide the three submission styles behind one
//! `submit`/`poll` contract; the [`TaskEngine`] fans jobs out into
//! [`TaskGroup`]s and aggregates member states on demand.

mod backend;
pub mod backends;
mod engine;
mod status;
mod types;

pub use backend::{BackendSet, TaskBackend};
pub use engine::TaskEngine;
pub use status::TaskStatus;
pub use types::{
    GenerationJob, GenerationTask, GroupReport, GroupStatus, TaskError, TaskGroup, TaskHandle,
    TaskSnapshot,
};
