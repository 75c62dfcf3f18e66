use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::evaluator::Evaluator;
use super::worker::Worker;
use crate::config::A3cConfig;
use crate::env::Environment;
use crate::error::{A3cError, Result};
use crate::layers::Parameterized;
use crate::model::ActorCritic;
use crate::shared::{GlobalCounter, ParameterSnapshot, SharedParameters};
use crate::telemetry::TelemetrySink;

/// Which thread an environment is being built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvRole {
    Train { rank: usize },
    Evaluate,
}

/// Owns the shared state of a run and spawns its threads.
pub struct Trainer {
    config: A3cConfig,
    shared: Arc<SharedParameters>,
    counter: Arc<GlobalCounter>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Trainer {
    /// Build the seeded model and the shared store, resuming from a snapshot if configured.
    pub fn new(config: A3cConfig, telemetry: Arc<dyn TelemetrySink>) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let model = ActorCritic::new(config.observation, &config.model, &mut rng)?;
        let initial = model.flatten();
        let optimizer = config.optimizer.build(initial.len());
        let shared = SharedParameters::new(&initial, optimizer, config.sync_mode);

        if let Some(path) = &config.resume_from {
            let snapshot = ParameterSnapshot::load(path)?;
            shared.restore(&snapshot)?;
            info!("resumed from {} at version {}", path.display(), snapshot.version);
        }
        info!(
            "model has {} parameters, {} workers, {:?} updates",
            shared.len(),
            config.num_workers,
            config.sync_mode
        );

        Ok(Trainer {
            config,
            shared: Arc::new(shared),
            counter: Arc::new(GlobalCounter::new()),
            telemetry,
        })
    }

    pub fn config(&self) -> &A3cConfig {
        &self.config
    }

    pub fn shared(&self) -> &Arc<SharedParameters> {
        &self.shared
    }

    pub fn counter(&self) -> &Arc<GlobalCounter> {
        &self.counter
    }

    /// Spawn the evaluator and `num_workers` training threads.
    ///
    /// `make_env` runs inside each thread, so environments need not be `Send`. If a spawn fails,
    /// no further threads are started; the failure is reported by [`TrainingSession::join`]
    /// alongside the threads that did start.
    pub fn launch<E, F>(&self, make_env: F) -> TrainingSession
    where
        E: Environment + 'static,
        F: Fn(EnvRole, &A3cConfig) -> Result<E> + Send + Sync + 'static,
    {
        let make_env = Arc::new(make_env);
        let mut session = TrainingSession::with_capacity(self.config.num_workers + 1);

        let (config, shared, counter, telemetry) = self.thread_context();
        let factory = Arc::clone(&make_env);
        let spawned = session.spawn(thread::Builder::new(), "a3c-evaluator".to_string(), move || {
            log_failure("evaluator", || {
                let env = (*factory)(EnvRole::Evaluate, &config)?;
                Evaluator::new(config, env, shared, counter, telemetry)?.run()
            })
        });
        if !spawned {
            return session;
        }

        for rank in 0..self.config.num_workers {
            let (config, shared, counter, telemetry) = self.thread_context();
            let factory = Arc::clone(&make_env);
            let spawned = session.spawn(thread::Builder::new(), format!("a3c-worker-{}", rank), move || {
                log_failure(&format!("worker {}", rank), || {
                    let env = (*factory)(EnvRole::Train { rank }, &config)?;
                    Worker::new(rank, config, env, shared, counter, telemetry)?.run()
                })
            });
            if !spawned {
                break;
            }
        }
        session
    }

    fn thread_context(&self) -> (A3cConfig, Arc<SharedParameters>, Arc<GlobalCounter>, Arc<dyn TelemetrySink>) {
        (
            self.config.clone(),
            Arc::clone(&self.shared),
            Arc::clone(&self.counter),
            Arc::clone(&self.telemetry),
        )
    }
}

/// Run a thread body, logging the error that ends it.
fn log_failure<F: FnOnce() -> Result<usize>>(who: &str, body: F) -> Result<usize> {
    let result = body();
    if let Err(e) = &result {
        error!("{} stopped: {}", who, e);
    }
    result
}

/// How one thread ended
#[derive(Debug)]
pub struct ThreadOutcome {
    pub name: String,
    /// Rollouts (workers) or episodes (evaluator) completed
    pub result: Result<usize>,
}

/// Handles of a launched run
pub struct TrainingSession {
    handles: Vec<(String, JoinHandle<Result<usize>>)>,
    spawn_failure: Option<ThreadOutcome>,
}

impl TrainingSession {
    fn with_capacity(capacity: usize) -> Self {
        TrainingSession {
            handles: Vec::with_capacity(capacity),
            spawn_failure: None,
        }
    }

    /// Start a named thread, recording the error instead if the OS refuses it.
    fn spawn<F>(&mut self, builder: thread::Builder, name: String, body: F) -> bool
    where
        F: FnOnce() -> Result<usize> + Send + 'static,
    {
        match builder.name(name.clone()).spawn(body) {
            Ok(handle) => {
                self.handles.push((name, handle));
                true
            }
            Err(e) => {
                error!("could not spawn {}: {}", name, e);
                self.spawn_failure = Some(ThreadOutcome {
                    name,
                    result: Err(e.into()),
                });
                false
            }
        }
    }

    /// Names of the threads that started
    pub fn thread_names(&self) -> Vec<&str> {
        self.handles.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Wait for every started thread. A failed thread never stops the others; a thread that
    /// could not be spawned is reported last.
    pub fn join(self) -> Vec<ThreadOutcome> {
        let mut outcomes: Vec<ThreadOutcome> = self
            .handles
            .into_iter()
            .map(|(name, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    error!("{} panicked", name);
                    Err(A3cError::TrainingError(format!("{} panicked", name)))
                });
                ThreadOutcome { name, result }
            })
            .collect();
        outcomes.extend(self.spawn_failure);
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure_keeps_started_threads_joinable() {
        let mut session = TrainingSession::with_capacity(2);
        assert!(session.spawn(thread::Builder::new(), "first".to_string(), || Ok(7)));

        // No address space can hold this stack
        let oversized = thread::Builder::new().stack_size(1 << 50);
        assert!(!session.spawn(oversized, "second".to_string(), || Ok(0)));
        assert_eq!(session.thread_names(), vec!["first"]);

        let outcomes = session.join();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "first");
        assert_eq!(outcomes[0].result.as_ref().ok(), Some(&7));
        assert_eq!(outcomes[1].name, "second");
        assert!(matches!(outcomes[1].result, Err(A3cError::IoError(_))));
    }
}
