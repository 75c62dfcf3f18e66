use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Summary of one finished episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub reward: f32,
    pub length: usize,
}

/// Accumulates the running episode and keeps a bounded history of finished ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeTracker {
    history: VecDeque<EpisodeSummary>,
    history_size: usize,

    current_reward: f32,
    current_length: usize,
    episode_count: usize,
    total_steps: usize,
}

impl EpisodeTracker {
    pub fn new(history_size: usize) -> Self {
        EpisodeTracker {
            history: VecDeque::with_capacity(history_size),
            history_size: history_size.max(1),
            current_reward: 0.0,
            current_length: 0,
            episode_count: 0,
            total_steps: 0,
        }
    }

    /// Record one environment step of the running episode
    pub fn record_step(&mut self, reward: f32) {
        self.current_reward += reward;
        self.current_length += 1;
        self.total_steps += 1;
    }

    /// Close the running episode and return its summary
    pub fn end_episode(&mut self) -> EpisodeSummary {
        let summary = EpisodeSummary {
            reward: self.current_reward,
            length: self.current_length,
        };
        if self.history.len() >= self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(summary);

        self.current_reward = 0.0;
        self.current_length = 0;
        self.episode_count += 1;
        summary
    }

    pub fn current_reward(&self) -> f32 {
        self.current_reward
    }

    pub fn current_length(&self) -> usize {
        self.current_length
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn last_episode(&self) -> Option<&EpisodeSummary> {
        self.history.back()
    }

    /// Mean reward over the last `window` finished episodes
    pub fn average_reward(&self, window: usize) -> Option<f32> {
        let recent: Vec<f32> = self.history.iter().rev().take(window).map(|s| s.reward).collect();
        if recent.is_empty() {
            None
        } else {
            Some(recent.iter().sum::<f32>() / recent.len() as f32)
        }
    }

    /// Mean length over the last `window` finished episodes
    pub fn average_length(&self, window: usize) -> Option<f32> {
        let recent: Vec<usize> = self.history.iter().rev().take(window).map(|s| s.length).collect();
        if recent.is_empty() {
            None
        } else {
            Some(recent.iter().sum::<usize>() as f32 / recent.len() as f32)
        }
    }
}
