//! The background ingestion pipeline and the intake step that feeds it.
//!
//! For one task, [`PipelineOrchestrator::run`] goes through these steps in order:
//!
//! 1. mark the task `PROCESSING`
//! 2. resolve the uploaded object to a local path
//! 3. validate it (failure ends the task `FAILED` with the validation detail)
//! 4. stage a copy in the directory shared with the ingestion engine
//! 5. build the ingestion spec (dynamic, or the fallback schema)
//! 6. submit it
//! 7. mark the task `SUBMITTED` with the external job id and row count
//! 8. poll the job to `COMPLETED` or `FAILED`
//! 9. remove temporary files

mod intake;
mod orchestrator;
mod staging;

pub use intake::UploadIntake;
pub use orchestrator::PipelineOrchestrator;
pub use staging::{staged_name, FileStager, StagedFile};
