//! Training configuration.
//!
//! [`A3cConfig`] carries every knob of a run. All fields have defaults, so a JSON file only
//! needs the values it overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env::ObservationSpec;
use crate::error::{A3cError, Result};
use crate::optimizer::OptimizerConfig;

/// How workers write into the shared parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Hogwild: concurrent element-wise writes, last writer wins
    #[default]
    LockFree,
    /// One gradient application at a time behind a coarse lock
    Locked,
}

/// When a worker pulls the shared parameters into its local model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Before the first rollout and after every finished episode
    #[default]
    EpisodeStart,
    /// Before every rollout
    EveryRollout,
}

/// Supervised loss applied to the depth heads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DepthLossKind {
    #[default]
    CrossEntropy,
    MeanSquaredError,
}

/// How per-position similarities collapse into the memory blend weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityAggregation {
    #[default]
    Max,
    Mean,
}

/// Layer widths of the actor-critic network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub embedding_size: usize,
    pub local_hidden_size: usize,
    pub context_hidden_size: usize,
    pub depth_hidden_size: usize,
    /// Enables the per-episode value memory
    pub use_memory: bool,
    pub memory_channels: usize,
    pub memory_kernel_size: usize,
    pub similarity: SimilarityAggregation,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            embedding_size: 256,
            local_hidden_size: 64,
            context_hidden_size: 256,
            depth_hidden_size: 128,
            use_memory: false,
            memory_channels: 4,
            memory_kernel_size: 3,
            similarity: SimilarityAggregation::Max,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("embedding_size", self.embedding_size),
            ("local_hidden_size", self.local_hidden_size),
            ("context_hidden_size", self.context_hidden_size),
            ("depth_hidden_size", self.depth_hidden_size),
            ("memory_channels", self.memory_channels),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(A3cError::invalid_parameter(name, "must be positive"));
            }
        }
        if self.memory_kernel_size % 2 == 0 {
            return Err(A3cError::invalid_parameter(
                "memory_kernel_size",
                format!("must be odd, got {}", self.memory_kernel_size),
            ));
        }
        Ok(())
    }
}

/// Configuration of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct A3cConfig {
    pub lr: f32,
    /// Discount factor
    pub gamma: f32,
    /// GAE trace decay
    pub tau: f32,
    pub entropy_coef: f32,
    pub value_loss_coef: f32,
    /// Weight of the summed depth losses; zero disables them
    pub depth_loss_coef: f32,
    pub depth_loss: DepthLossKind,
    pub max_grad_norm: f32,
    pub seed: u64,
    pub num_workers: usize,
    /// Rollout horizon
    pub num_steps: usize,
    pub max_episode_length: usize,

    pub config_path: PathBuf,
    pub train_scenario_path: PathBuf,
    pub test_scenario_path: PathBuf,

    pub optimizer: OptimizerConfig,
    pub sync_mode: SyncMode,
    pub sync_policy: SyncPolicy,

    /// Pause between evaluation episodes
    pub eval_interval_secs: f64,
    /// Stop each worker after this many rollouts
    pub max_rollouts: Option<usize>,
    /// Stop the evaluator after this many episodes
    pub max_eval_episodes: Option<usize>,
    pub checkpoint_path: Option<PathBuf>,
    pub resume_from: Option<PathBuf>,

    pub observation: ObservationSpec,
    pub model: ModelConfig,
}

impl Default for A3cConfig {
    fn default() -> Self {
        A3cConfig {
            lr: 1e-4,
            gamma: 0.99,
            tau: 1.0,
            entropy_coef: 0.01,
            value_loss_coef: 0.5,
            depth_loss_coef: 1.0,
            depth_loss: DepthLossKind::CrossEntropy,
            max_grad_norm: 50.0,
            seed: 1,
            num_workers: 4,
            num_steps: 20,
            max_episode_length: 1_000_000,
            config_path: PathBuf::from("./doomfiles/default.cfg"),
            train_scenario_path: PathBuf::from("./doomfiles/3.wad"),
            test_scenario_path: PathBuf::from("./doomfiles/3.wad"),
            optimizer: OptimizerConfig::default(),
            sync_mode: SyncMode::LockFree,
            sync_policy: SyncPolicy::EpisodeStart,
            eval_interval_secs: 60.0,
            max_rollouts: None,
            max_eval_episodes: None,
            checkpoint_path: None,
            resume_from: None,
            observation: ObservationSpec::default(),
            model: ModelConfig::default(),
        }
    }
}

impl A3cConfig {
    /// Reject values no run could train with.
    pub fn validate(&self) -> Result<()> {
        if !(self.lr > 0.0 && self.lr.is_finite()) {
            return Err(A3cError::invalid_parameter("lr", format!("must be positive, got {}", self.lr)));
        }
        for (name, value) in [("gamma", self.gamma), ("tau", self.tau)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(A3cError::invalid_parameter(name, format!("must be in [0, 1], got {}", value)));
            }
        }
        for (name, value) in [
            ("entropy_coef", self.entropy_coef),
            ("value_loss_coef", self.value_loss_coef),
            ("depth_loss_coef", self.depth_loss_coef),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(A3cError::invalid_parameter(name, format!("must be non-negative, got {}", value)));
            }
        }
        if !(self.max_grad_norm > 0.0) {
            return Err(A3cError::invalid_parameter(
                "max_grad_norm",
                format!("must be positive, got {}", self.max_grad_norm),
            ));
        }
        for (name, value) in [
            ("num_workers", self.num_workers),
            ("num_steps", self.num_steps),
            ("max_episode_length", self.max_episode_length),
        ] {
            if value == 0 {
                return Err(A3cError::invalid_parameter(name, "must be positive"));
            }
        }
        if Duration::try_from_secs_f64(self.eval_interval_secs).is_err() {
            return Err(A3cError::invalid_parameter(
                "eval_interval_secs",
                format!("must be a non-negative representable duration, got {}", self.eval_interval_secs),
            ));
        }
        self.optimizer.validate()?;
        self.observation.check()?;
        self.model.validate()
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: A3cConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = A3cConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_steps, 20);
        assert_eq!(config.max_grad_norm, 50.0);
        assert_eq!(config.sync_policy, SyncPolicy::EpisodeStart);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: A3cConfig = serde_json::from_str(r#"{"num_workers": 2, "sync_mode": "locked"}"#).unwrap();
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.sync_mode, SyncMode::Locked);
        assert_eq!(config.gamma, 0.99);
        assert_eq!(config.model.local_hidden_size, 64);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = A3cConfig::default();
        config.gamma = 1.5;
        assert!(config.validate().is_err());

        let mut config = A3cConfig::default();
        config.num_steps = 0;
        assert!(config.validate().is_err());

        let mut config = A3cConfig::default();
        config.model.memory_kernel_size = 4;
        assert!(config.validate().is_err());

        for interval in [-1.0, f64::NAN, f64::INFINITY, 1e30] {
            let mut config = A3cConfig::default();
            config.eval_interval_secs = interval;
            assert!(config.validate().is_err(), "interval {}", interval);
        }
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut config = A3cConfig::default();
        config.seed = 42;
        config.max_rollouts = Some(3);
        config.save_json(&path).unwrap();
        assert_eq!(A3cConfig::from_json_file(&path).unwrap(), config);
    }
}
