//! Scalar telemetry sinks.
//!
//! Workers report `grad_norm` after every applied update; the evaluator reports
//! `episode_reward`, `episode_length`, `average_episode_reward` and `steps_per_second` after
//! every episode. The step attached to each value is the global counter at the time of recording.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

pub trait TelemetrySink: Send + Sync {
    fn record_scalar(&self, name: &str, value: f64, step: u64);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record_scalar(&self, _name: &str, _value: f64, _step: u64) {}
}

/// Forwards every scalar to the `log` facade at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record_scalar(&self, name: &str, value: f64, step: u64) {
        log::debug!(target: "a3c_nav::telemetry", "{} = {} at step {}", name, value, step);
    }
}

/// Appends scalars to `<log_dir>/<run_name>/scalars.csv` as `step,tag,value,wall_time`.
pub struct CsvTelemetry {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl CsvTelemetry {
    pub fn new<P: AsRef<Path>>(log_dir: P, run_name: &str) -> Result<Self> {
        let run_dir = log_dir.as_ref().join(run_name);
        create_dir_all(&run_dir)?;
        let path = run_dir.join("scalars.csv");

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "step,tag,value,wall_time")?;
        writer.flush()?;

        Ok(CsvTelemetry {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn wall_time() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TelemetrySink for CsvTelemetry {
    fn record_scalar(&self, name: &str, value: f64, step: u64) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writeln!(writer, "{},{},{},{}", step, name, value, Self::wall_time())
            .and_then(|_| writer.flush());
        if let Err(e) = written {
            log::warn!("failed to write telemetry to {}: {}", self.path.display(), e);
        }
    }
}

/// One recorded scalar
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRecord {
    pub name: String,
    pub value: f64,
    pub step: u64,
}

/// Keeps every scalar in memory
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    records: Mutex<Vec<ScalarRecord>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ScalarRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Values recorded under `name`, in recording order
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.value)
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_scalar(&self, name: &str, value: f64, step: u64) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ScalarRecord {
                name: name.to_string(),
                value,
                step,
            });
    }
}
