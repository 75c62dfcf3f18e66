use ndarray::{Array1, ArrayView1};
use rand::Rng;

/// Categorical distribution over discrete actions, built from unnormalized logits
#[derive(Clone, Debug)]
pub struct Categorical {
    log_probs: Array1<f32>,
    probs: Array1<f32>,
}

impl Categorical {
    pub fn from_logits(logits: ArrayView1<f32>) -> Self {
        let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let shifted = logits.mapv(|v| v - max);
        let log_sum = shifted.mapv(f32::exp).sum().ln();
        let log_probs = shifted.mapv(|v| v - log_sum);
        let probs = log_probs.mapv(f32::exp);
        Categorical { log_probs, probs }
    }

    pub fn probs(&self) -> &Array1<f32> {
        &self.probs
    }

    pub fn log_prob(&self, action: usize) -> f32 {
        self.log_probs[action]
    }

    /// Shannon entropy in nats
    pub fn entropy(&self) -> f32 {
        -(&self.probs * &self.log_probs).sum()
    }

    /// Sample by inverse CDF. On rounding shortfall the last action with nonzero probability wins.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let threshold: f32 = rng.gen();
        let mut cumulative = 0.0;
        for (i, &p) in self.probs.iter().enumerate() {
            cumulative += p;
            if threshold < cumulative {
                return i;
            }
        }
        self.probs
            .iter()
            .rposition(|&p| p > 0.0)
            .unwrap_or_else(|| self.greedy())
    }

    /// Most probable action, lowest index on ties
    pub fn greedy(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = i;
            }
        }
        best
    }

    /// Gradient of the rollout loss with respect to the logits for one step.
    ///
    /// The loss term is `-log π(a)·advantage - β·H`, giving
    /// `(π - onehot(a))·advantage + β·π⊙(log π + H)`.
    pub fn policy_gradient(&self, action: usize, advantage: f32, entropy_coef: f32) -> Array1<f32> {
        let entropy = self.entropy();
        let mut grad = &self.probs * advantage;
        grad[action] -= advantage;
        grad.zip_mut_with(&(&self.probs * &self.log_probs.mapv(|lp| lp + entropy)), |g, &h| {
            *g += entropy_coef * h
        });
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_logits() {
        let dist = Categorical::from_logits(array![0.0, 0.0, 0.0, 0.0].view());
        assert!((dist.entropy() - 4.0f32.ln()).abs() < 1e-6);
        assert!((dist.log_prob(2) + 4.0f32.ln()).abs() < 1e-6);
        assert_eq!(dist.greedy(), 0);
    }

    #[test]
    fn test_greedy_and_sampling() {
        let dist = Categorical::from_logits(array![0.0, 10.0, 0.0].view());
        assert_eq!(dist.greedy(), 1);
        let mut rng = StdRng::seed_from_u64(5);
        let hits = (0..200).filter(|_| dist.sample(&mut rng) == 1).count();
        assert!(hits > 190);
    }

    #[test]
    fn test_sampling_shortfall_skips_zero_probability_actions() {
        // Probabilities that sum well short of 1, with an underflowed last action
        let probs = array![0.3, 0.3, 0.0];
        let dist = Categorical {
            log_probs: probs.mapv(|p: f32| p.max(1e-45).ln()),
            probs,
        };
        let mut rng = StdRng::seed_from_u64(11);
        let samples: Vec<usize> = (0..500).map(|_| dist.sample(&mut rng)).collect();
        assert!(samples.iter().all(|&a| a != 2));
        assert!(samples.iter().filter(|&&a| a == 1).count() > 250);
    }

    #[test]
    fn test_policy_gradient_matches_finite_difference() {
        let logits = array![0.3, -0.2, 0.7];
        let (action, advantage, beta) = (1, 0.8, 0.05);
        let loss = |l: &Array1<f32>| {
            let d = Categorical::from_logits(l.view());
            -d.log_prob(action) * advantage - beta * d.entropy()
        };
        let grad = Categorical::from_logits(logits.view()).policy_gradient(action, advantage, beta);

        let eps = 1e-3;
        for i in 0..3 {
            let mut plus = logits.clone();
            plus[i] += eps;
            let mut minus = logits.clone();
            minus[i] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!((numeric - grad[i]).abs() < 1e-3, "logit {}: {} vs {}", i, numeric, grad[i]);
        }
    }
}
