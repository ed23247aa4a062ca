//! Durable task records and their status state machine.
//!
//! ```text
//! ACCEPTED -> PROCESSING -> SUBMITTED -> COMPLETED
//!     \            \             \
//!      +------------+-------------+--> FAILED
//! ```

mod state_store;
mod task;

pub use state_store::TaskStateStore;
pub use task::{new_task_id, IngestionTask, TaskStatus, TaskUpdate};
