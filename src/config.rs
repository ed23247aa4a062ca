//! Runtime configuration.
//!
//! Values come from [`PipelineConfig::default`], optionally a JSON file, then `INGEST_*`
//! environment variables. The resulting struct is passed to component constructors; nothing
//! reads configuration from global state.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::WorkerOptions;
use crate::inference::{SchemaInferenceEngine, DEFAULT_SAMPLE_ROWS};
use crate::ingest_spec::{FallbackSchema, IngestionSpecBuilder, SpecOptions};
use crate::submission::{JobMonitor, MonitorOptions};
use crate::validation::{ValidationService, DEFAULT_MAX_FILE_SIZE};

const ENV_PREFIX: &str = "INGEST_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite database holding task records.
    pub database_path: PathBuf,
    /// Root of the local object store for uploaded files.
    pub upload_dir: PathBuf,
    /// Staging directory readable by the ingestion engine.
    pub shared_dir: PathBuf,
    pub overlord_url: String,
    pub max_file_size: u64,
    pub sample_rows: usize,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub max_status_failures: u32,
    pub workers: usize,
    pub queue_capacity: usize,
    pub bind_addr: String,
    pub spec: SpecOptions,
    pub fallback_schema: FallbackSchema,
    /// Submit the fallback schema for every upload instead of inferring one.
    pub force_fallback_spec: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("ingest_tasks.db"),
            upload_dir: PathBuf::from("./uploads"),
            shared_dir: PathBuf::from("./shared"),
            overlord_url: "http://localhost:8081".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            poll_interval_secs: 10,
            poll_timeout_secs: 30 * 60,
            max_status_failures: 3,
            workers: 4,
            queue_capacity: 64,
            bind_addr: "0.0.0.0:8080".to_string(),
            spec: SpecOptions::default(),
            fallback_schema: FallbackSchema::default(),
            force_fallback_spec: false,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Defaults overlaid with `INGEST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Apply overrides from `lookup`, which maps an unprefixed key (e.g. `WORKERS`) to a value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHARED_DIR") {
            self.shared_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("OVERLORD_URL") {
            self.overlord_url = v;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        override_parsed(&lookup, "MAX_FILE_SIZE", &mut self.max_file_size)?;
        override_parsed(&lookup, "SAMPLE_ROWS", &mut self.sample_rows)?;
        override_parsed(&lookup, "POLL_INTERVAL_SECS", &mut self.poll_interval_secs)?;
        override_parsed(&lookup, "POLL_TIMEOUT_SECS", &mut self.poll_timeout_secs)?;
        override_parsed(&lookup, "MAX_STATUS_FAILURES", &mut self.max_status_failures)?;
        override_parsed(&lookup, "WORKERS", &mut self.workers)?;
        override_parsed(&lookup, "QUEUE_CAPACITY", &mut self.queue_capacity)?;
        override_parsed(&lookup, "FORCE_FALLBACK_SPEC", &mut self.force_fallback_spec)?;
        Ok(self)
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.poll_timeout_secs),
            max_consecutive_failures: self.max_status_failures,
        }
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn validation_service(&self) -> ValidationService {
        ValidationService::new(self.max_file_size)
    }

    pub fn inference_engine(&self) -> SchemaInferenceEngine {
        SchemaInferenceEngine::new(self.sample_rows)
    }

    pub fn spec_builder(&self) -> IngestionSpecBuilder {
        IngestionSpecBuilder::new(self.spec.clone(), self.fallback_schema.clone())
    }

    pub fn job_monitor(&self) -> JobMonitor {
        JobMonitor::new(self.monitor_options())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: format!("{ENV_PREFIX}{key}"),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
