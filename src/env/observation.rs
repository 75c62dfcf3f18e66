use ndarray::{Array1, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{A3cError, Result};

/// Bucket edges applied to the contrast-stretched depth values, right-open.
pub const DEPTH_BIN_EDGES: [f32; 7] = [0.05, 0.175, 0.3, 0.425, 0.55, 0.675, 0.8];

/// Number of buckets produced by [`DEPTH_BIN_EDGES`]
pub const DEPTH_BINS: usize = DEPTH_BIN_EDGES.len() + 1;

/// Declared layout of every observation an environment produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationSpec {
    pub frame_channels: usize,
    pub frame_height: usize,
    pub frame_width: usize,
    pub depth_cells: usize,
    pub depth_bins: usize,
    pub velocity_size: usize,
    pub num_actions: usize,
}

impl Default for ObservationSpec {
    fn default() -> Self {
        ObservationSpec {
            frame_channels: 3,
            frame_height: 82,
            frame_width: 82,
            depth_cells: 64,
            depth_bins: DEPTH_BINS,
            velocity_size: 3,
            num_actions: 3,
        }
    }
}

impl ObservationSpec {
    pub fn frame_shape(&self) -> (usize, usize, usize) {
        (self.frame_channels, self.frame_height, self.frame_width)
    }

    /// Length of the flattened depth histogram
    pub fn depth_size(&self) -> usize {
        self.depth_cells * self.depth_bins
    }

    /// Check that an observation matches this layout.
    pub fn validate(&self, observation: &Observation) -> Result<()> {
        if observation.frame.dim() != self.frame_shape() {
            return Err(A3cError::dimension_mismatch(
                format!("frame {:?}", self.frame_shape()),
                format!("frame {:?}", observation.frame.dim()),
            ));
        }
        if observation.depth.len() != self.depth_size() {
            return Err(A3cError::dimension_mismatch(
                format!("depth histogram of {}", self.depth_size()),
                format!("depth histogram of {}", observation.depth.len()),
            ));
        }
        if observation.velocity.len() != self.velocity_size {
            return Err(A3cError::dimension_mismatch(
                format!("velocity of {}", self.velocity_size),
                format!("velocity of {}", observation.velocity.len()),
            ));
        }
        if let Some(action) = observation.last_action {
            if action >= self.num_actions {
                return Err(A3cError::invalid_parameter(
                    "last_action",
                    format!("{} is out of range for {} actions", action, self.num_actions),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn check(&self) -> Result<()> {
        let sizes = [
            ("frame_channels", self.frame_channels),
            ("frame_height", self.frame_height),
            ("frame_width", self.frame_width),
            ("depth_cells", self.depth_cells),
            ("depth_bins", self.depth_bins),
            ("num_actions", self.num_actions),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(A3cError::invalid_parameter(name, "must be positive"));
            }
        }
        Ok(())
    }
}

/// One environment step as seen by the agent
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// `(channels, height, width)` image in `[0, 1]`
    pub frame: Array3<f32>,
    /// One-hot depth buckets, cell-major
    pub depth: Array1<f32>,
    pub last_reward: f32,
    /// `None` before the first action of an episode
    pub last_action: Option<usize>,
    pub velocity: Array1<f32>,
}

impl Observation {
    /// Zero-filled observation used when the simulator has no state to report.
    pub fn zeros(spec: &ObservationSpec) -> Self {
        Observation {
            frame: Array3::zeros(spec.frame_shape()),
            depth: Array1::zeros(spec.depth_size()),
            last_reward: 0.0,
            last_action: None,
            velocity: Array1::zeros(spec.velocity_size),
        }
    }

    pub fn action_one_hot(&self, num_actions: usize) -> Array1<f32> {
        let mut one_hot = Array1::zeros(num_actions);
        if let Some(action) = self.last_action {
            if action < num_actions {
                one_hot[action] = 1.0;
            }
        }
        one_hot
    }
}

/// Bucket a downsampled depth grid (values in `[0, 1]`, one per cell) into one-hot bins.
///
/// Depth is contrast-stretched with `(1 - d)^10` first so near obstacles spread across the
/// upper buckets.
pub fn encode_depth(grid: ArrayView1<f32>) -> Array1<f32> {
    let mut encoded = Array1::zeros(grid.len() * DEPTH_BINS);
    for (cell, &depth) in grid.iter().enumerate() {
        let stretched = (1.0 - depth.clamp(0.0, 1.0)).powi(10);
        let bin = DEPTH_BIN_EDGES.iter().filter(|&&edge| edge <= stretched).count();
        encoded[cell * DEPTH_BINS + bin] = 1.0;
    }
    encoded
}

/// Convert a channel-major `u8` image into a `[0, 1]` frame.
pub fn frame_from_rgb(bytes: &[u8], channels: usize, height: usize, width: usize) -> Result<Array3<f32>> {
    let expected = channels * height * width;
    if bytes.len() != expected {
        return Err(A3cError::dimension_mismatch(
            format!("{} bytes", expected),
            format!("{} bytes", bytes.len()),
        ));
    }
    let values = bytes.iter().map(|&b| b as f32 / 255.0).collect();
    Ok(Array3::from_shape_vec((channels, height, width), values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_encode_depth_buckets() {
        // (1 - d)^10: d = 1 -> 0, d = 0 -> 1, d = 0.1 -> ~0.349
        let encoded = encode_depth(array![1.0, 0.0, 0.1].view());
        assert_eq!(encoded.len(), 3 * DEPTH_BINS);
        assert_eq!(encoded[0], 1.0);
        assert_eq!(encoded[DEPTH_BINS + 7], 1.0);
        assert_eq!(encoded[2 * DEPTH_BINS + 3], 1.0);
        assert_eq!(encoded.sum(), 3.0);
    }

    #[test]
    fn test_frame_from_rgb() {
        let frame = frame_from_rgb(&[0, 255, 51, 102], 1, 2, 2).unwrap();
        assert_eq!(frame[[0, 0, 1]], 1.0);
        assert!((frame[[0, 1, 0]] - 0.2).abs() < 1e-6);
        assert!(frame_from_rgb(&[0, 1, 2], 1, 2, 2).is_err());
    }

    #[test]
    fn test_zeros_matches_spec() {
        let spec = ObservationSpec::default();
        let obs = Observation::zeros(&spec);
        assert!(spec.validate(&obs).is_ok());
        assert_eq!(obs.depth.len(), 512);
        assert_eq!(obs.action_one_hot(3), Array1::<f32>::zeros(3));
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let spec = ObservationSpec::default();
        let mut obs = Observation::zeros(&spec);
        obs.velocity = Array1::zeros(2);
        assert!(spec.validate(&obs).is_err());

        let mut obs = Observation::zeros(&spec);
        obs.last_action = Some(3);
        assert!(spec.validate(&obs).is_err());
    }
}
