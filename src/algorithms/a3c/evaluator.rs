use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::info;

use crate::config::A3cConfig;
use crate::env::Environment;
use crate::error::{A3cError, Result};
use crate::layers::Parameterized;
use crate::metrics::{EpisodeSummary, EpisodeTracker};
use crate::model::{ActorCritic, Categorical};
use crate::shared::{GlobalCounter, SharedParameters};
use crate::telemetry::TelemetrySink;

/// Episodes averaged in the reported moving reward
const AVERAGE_WINDOW: usize = 100;

/// Result of one greedy evaluation episode
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub summary: EpisodeSummary,
    /// Global steps per second since the evaluator started
    pub steps_per_second: f64,
    pub global_steps: u64,
    /// Version of the shared parameters that were evaluated
    pub version: u64,
}

/// Plays greedy episodes with the latest shared parameters. Never writes to them.
pub struct Evaluator<E: Environment> {
    config: A3cConfig,
    env: E,
    model: ActorCritic,
    shared: Arc<SharedParameters>,
    counter: Arc<GlobalCounter>,
    telemetry: Arc<dyn TelemetrySink>,
    tracker: EpisodeTracker,
    start: Instant,
}

impl<E: Environment> Evaluator<E> {
    pub fn new(
        config: A3cConfig,
        mut env: E,
        shared: Arc<SharedParameters>,
        counter: Arc<GlobalCounter>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        config.validate()?;
        let spec = env.observation_spec();
        if spec != config.observation {
            return Err(A3cError::dimension_mismatch(
                format!("{:?}", config.observation),
                format!("{:?}", spec),
            ));
        }
        let model = ActorCritic::with_shape(config.observation, &config.model)?;
        if model.num_parameters() != shared.len() {
            return Err(A3cError::dimension_mismatch(
                format!("{} shared parameters", model.num_parameters()),
                format!("{} shared parameters", shared.len()),
            ));
        }
        env.seed(config.seed.wrapping_add(config.num_workers as u64));

        Ok(Evaluator {
            config,
            env,
            model,
            shared,
            counter,
            telemetry,
            tracker: EpisodeTracker::new(AVERAGE_WINDOW),
            start: Instant::now(),
        })
    }

    pub fn tracker(&self) -> &EpisodeTracker {
        &self.tracker
    }

    /// Play one episode with arg-max actions.
    pub fn run_episode(&mut self) -> Result<EvaluationReport> {
        let snapshot = self.shared.snapshot();
        self.model.load_flat(&snapshot.values)?;
        let mut state = self.model.initial_state();
        let mut observation = self.env.reset()?;

        loop {
            let (output, _) = self.model.forward(&observation, &mut state)?;
            let action = Categorical::from_logits(output.logits.view()).greedy();
            let transition = self.env.step(action)?;
            self.tracker.record_step(transition.reward);
            if transition.done || self.tracker.current_length() >= self.config.max_episode_length {
                break;
            }
            observation = transition.observation;
        }

        let summary = self.tracker.end_episode();
        let global_steps = self.counter.get();
        let elapsed = self.start.elapsed().as_secs_f64();
        let steps_per_second = if elapsed > 0.0 { global_steps as f64 / elapsed } else { 0.0 };

        let average_reward = self.tracker.average_reward(AVERAGE_WINDOW).unwrap_or(summary.reward);
        info!(
            "Time {:.0}s, num steps {}, FPS {:.0}, episode reward {}, episode length {}, average reward {:.2}",
            elapsed, global_steps, steps_per_second, summary.reward, summary.length, average_reward
        );
        self.telemetry.record_scalar("episode_reward", summary.reward as f64, global_steps);
        self.telemetry.record_scalar("episode_length", summary.length as f64, global_steps);
        self.telemetry.record_scalar("average_episode_reward", average_reward as f64, global_steps);
        self.telemetry.record_scalar("steps_per_second", steps_per_second, global_steps);

        if let Some(path) = &self.config.checkpoint_path {
            snapshot.save(path)?;
        }

        Ok(EvaluationReport {
            summary,
            steps_per_second,
            global_steps,
            version: snapshot.version,
        })
    }

    /// Evaluate, sleeping between episodes, until the episode budget is spent.
    pub fn run(&mut self) -> Result<usize> {
        let pause = Duration::from_secs_f64(self.config.eval_interval_secs);
        loop {
            self.run_episode()?;
            let episodes = self.tracker.episode_count();
            if self.config.max_eval_episodes.map_or(false, |max| episodes >= max) {
                return Ok(episodes);
            }
            thread::sleep(pause);
        }
    }
}
