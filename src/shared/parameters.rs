use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::AtomicBuffer;
use crate::config::SyncMode;
use crate::error::{A3cError, Result};
use crate::layers::Parameterized;
use crate::optimizer::{Optimizer, OptimizerWrapper};

/// The flat parameter vector every worker trains and the evaluator reads.
///
/// Gradient applications hold the gate for reading in [`SyncMode::LockFree`], so they run
/// concurrently and may overwrite each other element by element. In [`SyncMode::Locked`]
/// they hold it for writing and are serialized. [`snapshot`](Self::snapshot) always takes the
/// write side, so a snapshot never observes a half-applied update in either mode.
pub struct SharedParameters {
    values: AtomicBuffer,
    optimizer: OptimizerWrapper,
    gate: RwLock<()>,
    version: AtomicU64,
    mode: SyncMode,
}

impl SharedParameters {
    pub fn new(initial: &[f32], optimizer: OptimizerWrapper, mode: SyncMode) -> Self {
        SharedParameters {
            values: AtomicBuffer::from_slice(initial),
            optimizer,
            gate: RwLock::new(()),
            version: AtomicU64::new(0),
            mode,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of gradient applications so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Consistent copy of the current parameters.
    pub fn snapshot(&self) -> ParameterSnapshot {
        // The gate guards no data, so a poisoned lock is still usable
        let _guard = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        ParameterSnapshot {
            version: self.version.load(Ordering::Acquire),
            values: self.values.to_vec(),
        }
    }

    /// Copy the current parameters into a local model and return the snapshot version.
    pub fn load_into<P: Parameterized>(&self, model: &mut P) -> Result<u64> {
        let snapshot = self.snapshot();
        model.load_flat(&snapshot.values)?;
        Ok(snapshot.version)
    }

    /// Apply a flat gradient through the shared optimizer and return the new version.
    pub fn apply_gradient(&self, gradients: &[f32], learning_rate: f32) -> Result<u64> {
        if gradients.len() != self.values.len() {
            return Err(A3cError::dimension_mismatch(
                format!("{} gradient entries", self.values.len()),
                format!("{} gradient entries", gradients.len()),
            ));
        }

        match self.mode {
            SyncMode::LockFree => {
                let _guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
                self.optimizer.step(&self.values, gradients, learning_rate);
            }
            SyncMode::Locked => {
                let _guard = self.gate.write().unwrap_or_else(PoisonError::into_inner);
                self.optimizer.step(&self.values, gradients, learning_rate);
            }
        }
        Ok(self.version.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Overwrite the parameters with a saved snapshot.
    pub fn restore(&self, snapshot: &ParameterSnapshot) -> Result<()> {
        if snapshot.values.len() != self.values.len() {
            return Err(A3cError::dimension_mismatch(
                format!("{} parameters", self.values.len()),
                format!("{} parameters", snapshot.values.len()),
            ));
        }
        let _guard = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        self.values.copy_from(&snapshot.values);
        self.version.store(snapshot.version, Ordering::Release);
        Ok(())
    }
}

/// A point-in-time copy of the shared parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub version: u64,
    pub values: Vec<f32>,
}

impl ParameterSnapshot {
    /// Write with bincode to a temporary sibling and rename it into place, so readers never
    /// see a partial file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        let mut writer = BufWriter::new(File::create(&temp_path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::SGD;

    fn sgd_store(values: &[f32], mode: SyncMode) -> SharedParameters {
        SharedParameters::new(values, OptimizerWrapper::SGD(SGD::new()), mode)
    }

    #[test]
    fn test_apply_gradient_sgd() {
        let shared = sgd_store(&[1.0, 2.0], SyncMode::Locked);
        let version = shared.apply_gradient(&[0.5, -1.0], 0.1).unwrap();
        assert_eq!(version, 1);
        let snapshot = shared.snapshot();
        assert!((snapshot.values[0] - 0.95).abs() < 1e-6);
        assert!((snapshot.values[1] - 2.1).abs() < 1e-6);
    }

    #[test]
    fn test_wrong_gradient_length() {
        let shared = sgd_store(&[0.0; 3], SyncMode::LockFree);
        assert!(shared.apply_gradient(&[1.0], 0.1).is_err());
        assert_eq!(shared.version(), 0);
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.bin");
        let snapshot = ParameterSnapshot {
            version: 7,
            values: vec![0.5, -1.25, 3.0],
        };
        snapshot.save(&path).unwrap();
        assert_eq!(ParameterSnapshot::load(&path).unwrap(), snapshot);

        let shared = sgd_store(&[0.0; 3], SyncMode::LockFree);
        shared.restore(&snapshot).unwrap();
        assert_eq!(shared.snapshot(), snapshot);
        assert!(shared.restore(&ParameterSnapshot { version: 0, values: vec![1.0] }).is_err());
    }
}
