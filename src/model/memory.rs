use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use crate::config::SimilarityAggregation;
use crate::error::Result;
use crate::layers::{Conv1d, Conv1dCache, Initializable};

/// Per-episode store of `(embedding, propagated value)` pairs.
///
/// Owned by the rollout's recurrent state, never by the shared model. It only grows within an
/// episode and is dropped at the episode boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeMemory {
    embeddings: Vec<Array1<f32>>,
    values: Vec<f32>,
}

impl EpisodeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn clear(&mut self) {
        self.embeddings.clear();
        self.values.clear();
    }
}

/// Learned parts of the value memory: a kernel-1 fusion of `[embedding, reward]` into a
/// provisional value, and a same-padded convolution that propagates values along the episode.
#[derive(Clone, Debug)]
pub struct ValueMemory {
    pub propagation: Conv1d,
    pub fusion: Conv1d,
    pub aggregation: SimilarityAggregation,
}

#[derive(Clone, Debug)]
pub struct MemoryCache {
    fusion: Conv1dCache,
    propagation: Conv1dCache,
    weight: f32,
    best: Option<usize>,
    channel_argmax: Vec<usize>,
    from_propagation: Vec<bool>,
}

impl MemoryCache {
    /// Blend weight used for this step
    pub fn weight(&self) -> f32 {
        self.weight
    }
}

fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let norms = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if norms > f32::EPSILON {
        a.dot(&b) / norms
    } else {
        0.0
    }
}

impl ValueMemory {
    pub fn new(
        embedding_size: usize,
        channels: usize,
        kernel_size: usize,
        aggregation: SimilarityAggregation,
    ) -> Result<Self> {
        Ok(ValueMemory {
            propagation: Conv1d::same(1, channels, kernel_size)?,
            fusion: Conv1d::new(embedding_size + 1, 1, 1, 0)?,
            aggregation,
        })
    }

    /// Blend weight and most similar stored position for `embedding`.
    ///
    /// Similarities are cosine, clipped at zero. An empty memory gives `(0.0, None)`.
    pub fn recall(&self, memory: &EpisodeMemory, embedding: ArrayView1<f32>) -> (f32, Option<usize>) {
        let mut best: Option<(usize, f32)> = None;
        let mut total = 0.0;
        for (i, stored) in memory.embeddings.iter().enumerate() {
            let similarity = cosine_similarity(embedding, stored.view()).max(0.0);
            total += similarity;
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((i, similarity));
            }
        }

        match best {
            None => (0.0, None),
            Some((index, max)) => {
                let weight = match self.aggregation {
                    SimilarityAggregation::Max => max,
                    SimilarityAggregation::Mean => total / memory.len() as f32,
                };
                (weight, Some(index))
            }
        }
    }

    /// Store the current step and return the blended value estimate.
    pub fn forward(
        &self,
        memory: &mut EpisodeMemory,
        embedding: ArrayView1<f32>,
        reward: f32,
        fresh_value: f32,
    ) -> Result<(f32, MemoryCache)> {
        let (weight, best) = self.recall(memory, embedding);

        let reward = Array1::from_elem(1, reward);
        let fusion_input = concatenate(Axis(0), &[embedding.view(), reward.view()])?;
        let fusion_input = fusion_input.insert_axis(Axis(1));
        let (provisional, fusion_cache) = self.fusion.forward(fusion_input.view())?;

        let mut sequence = memory.values.clone();
        sequence.push(provisional[[0, 0]]);
        let length = sequence.len();
        let sequence = Array2::from_shape_vec((1, length), sequence)?;
        let (propagated, propagation_cache) = self.propagation.forward(sequence.view())?;

        let mut merged = Vec::with_capacity(length);
        let mut channel_argmax = Vec::with_capacity(length);
        let mut from_propagation = Vec::with_capacity(length);
        for (t, column) in propagated.columns().into_iter().enumerate() {
            let mut channel = 0;
            for (c, &v) in column.iter().enumerate() {
                if v > column[channel] {
                    channel = c;
                }
            }
            let candidate = column[channel];
            let current = sequence[[0, t]];
            channel_argmax.push(channel);
            from_propagation.push(candidate >= current);
            merged.push(candidate.max(current));
        }

        let blended = match best {
            Some(index) => merged[index] * weight + fresh_value * (1.0 - weight),
            None => fresh_value,
        };

        memory.values = merged;
        memory.embeddings.push(embedding.to_owned());

        let cache = MemoryCache {
            fusion: fusion_cache,
            propagation: propagation_cache,
            weight,
            best,
            channel_argmax,
            from_propagation,
        };
        Ok((blended, cache))
    }

    /// Accumulate gradients of the blended value and return the gradient for the fresh
    /// critic value.
    ///
    /// Stored embeddings, stored values and the blend weight are constants here; the
    /// gradient reaches the fusion layer only through this step's provisional value.
    pub fn backward(&self, cache: &MemoryCache, value_grad: f32, grads: &mut ValueMemory) -> f32 {
        let best = match cache.best {
            Some(index) => index,
            None => return value_grad,
        };

        let length = cache.from_propagation.len();
        let merged_grad = value_grad * cache.weight;
        let mut sequence_grad = Array2::<f32>::zeros((1, length));
        let mut propagated_grad = Array2::<f32>::zeros((self.propagation.out_channels, length));
        if cache.from_propagation[best] {
            propagated_grad[[cache.channel_argmax[best], best]] = merged_grad;
        } else {
            sequence_grad[[0, best]] = merged_grad;
        }

        sequence_grad += &self
            .propagation
            .backward(&cache.propagation, propagated_grad.view(), &mut grads.propagation);

        let provisional_grad = Array2::from_elem((1, 1), sequence_grad[[0, length - 1]]);
        self.fusion.backward(&cache.fusion, provisional_grad.view(), &mut grads.fusion);

        value_grad * (1.0 - cache.weight)
    }
}

impl Initializable for ValueMemory {
    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.propagation.initialize(rng);
        self.fusion.initialize(rng);
    }
}

crate::impl_parameterized!(ValueMemory { propagation, fusion });
