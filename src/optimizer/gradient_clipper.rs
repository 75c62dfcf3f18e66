/// Gradient clipping methods, applied to a flat gradient before it reaches the optimizer
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GradientClipper {
    /// Clip every element into `[min, max]`
    ClipByValue { min: f32, max: f32 },

    /// Rescale the whole gradient so its L2 norm is at most `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    None,
}

impl GradientClipper {
    /// L2 norm of a flat gradient, accumulated in `f64`
    pub fn global_norm(gradients: &[f32]) -> f32 {
        gradients
            .iter()
            .map(|&g| (g as f64) * (g as f64))
            .sum::<f64>()
            .sqrt() as f32
    }

    /// Clip in place and return the norm measured before clipping.
    pub fn clip(&self, gradients: &mut [f32]) -> f32 {
        let norm = Self::global_norm(gradients);
        match *self {
            GradientClipper::ClipByValue { min, max } => {
                gradients.iter_mut().for_each(|g| *g = g.max(min).min(max));
            }

            GradientClipper::ClipByGlobalNorm { max_norm } => {
                if norm.is_finite() && norm > max_norm {
                    let scale = max_norm / (norm + 1e-6);
                    gradients.iter_mut().for_each(|g| *g *= scale);
                }
            }

            GradientClipper::None => {}
        }
        norm
    }
}
