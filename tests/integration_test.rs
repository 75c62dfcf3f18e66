use std::sync::Arc;
use std::thread;

use a3c_nav::algorithms::{EnvRole, Trainer, Worker};
use a3c_nav::config::{A3cConfig, ModelConfig, SyncMode};
use a3c_nav::env::testing::{ConstantRewardEnv, FailingEnv};
use a3c_nav::env::{Environment, Observation, ObservationSpec, Transition};
use a3c_nav::optimizer::OptimizerConfig;
use a3c_nav::shared::{ParameterSnapshot, SharedParameters};
use a3c_nav::telemetry::{CsvTelemetry, NullTelemetry, RecordingTelemetry, TelemetrySink};
use a3c_nav::{A3cError, Result};

fn small_config() -> A3cConfig {
    A3cConfig {
        observation: ObservationSpec {
            frame_channels: 3,
            frame_height: 20,
            frame_width: 20,
            depth_cells: 4,
            depth_bins: 8,
            velocity_size: 3,
            num_actions: 3,
        },
        model: ModelConfig {
            embedding_size: 16,
            local_hidden_size: 8,
            context_hidden_size: 12,
            depth_hidden_size: 8,
            ..ModelConfig::default()
        },
        num_workers: 2,
        num_steps: 5,
        ..A3cConfig::default()
    }
}

#[test]
fn test_short_episode_rollout() {
    let config = small_config();
    let trainer = Trainer::new(config.clone(), Arc::new(NullTelemetry)).unwrap();
    let env = ConstantRewardEnv::new(config.observation, 1.0, 5);
    let mut worker = Worker::new(
        0,
        config,
        env,
        Arc::clone(trainer.shared()),
        Arc::clone(trainer.counter()),
        Arc::new(NullTelemetry),
    )
    .unwrap();

    let report = worker.run_rollout().unwrap();
    assert_eq!(report.steps, 5);
    assert!(report.episode_done);
    assert_eq!(report.bootstrap_value, 0.0);
    assert!(report.loss.is_finite());
    assert!(report.loss.depth > 0.0);
    assert_eq!(report.version, Some(1));
    assert_eq!(trainer.counter().get(), 5);
}

#[test]
fn test_memory_model_trains() {
    let mut config = small_config();
    config.model.use_memory = true;
    config.max_rollouts = Some(4);
    let trainer = Trainer::new(config.clone(), Arc::new(NullTelemetry)).unwrap();
    let env = ConstantRewardEnv::new(config.observation, 0.5, 7);
    let mut worker = Worker::new(
        0,
        config,
        env,
        Arc::clone(trainer.shared()),
        Arc::clone(trainer.counter()),
        Arc::new(NullTelemetry),
    )
    .unwrap();

    assert_eq!(worker.run().unwrap(), 4);
    assert_eq!(trainer.shared().version(), 4);
    assert!(trainer.shared().snapshot().values.iter().all(|v| v.is_finite()));
}

fn hammer(mode: SyncMode, threads: usize, updates: usize) -> f32 {
    let shared = Arc::new(SharedParameters::new(&[0.0], OptimizerConfig::Sgd.build(1), mode));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..updates {
                    shared.apply_gradient(&[-1.0], 1.0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(shared.version(), (threads * updates) as u64);
    shared.snapshot().values[0]
}

#[test]
fn test_locked_updates_are_exact() {
    assert_eq!(hammer(SyncMode::Locked, 4, 1000), 4000.0);
}

#[test]
fn test_lock_free_updates_may_be_lost() {
    // Concurrent read-modify-write per element can drop updates, never invent them
    let value = hammer(SyncMode::LockFree, 4, 1000);
    assert!(value > 0.0);
    assert!(value <= 4000.0);
}

#[test]
fn test_trainer_runs_checkpoints_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("model.bin");

    let mut config = small_config();
    config.max_rollouts = Some(3);
    config.max_eval_episodes = Some(1);
    config.eval_interval_secs = 0.0;
    config.checkpoint_path = Some(checkpoint.clone());

    let telemetry = Arc::new(RecordingTelemetry::new());
    let sink: Arc<dyn TelemetrySink> = telemetry.clone();
    let trainer = Trainer::new(config.clone(), sink).unwrap();
    let session = trainer
        .launch(|_role: EnvRole, config: &A3cConfig| Ok(ConstantRewardEnv::new(config.observation, 1.0, 8)));
    assert_eq!(session.thread_names(), vec!["a3c-evaluator", "a3c-worker-0", "a3c-worker-1"]);

    let outcomes = session.join();
    for outcome in &outcomes {
        let expected = if outcome.name == "a3c-evaluator" { 1 } else { 3 };
        assert_eq!(outcome.result.as_ref().ok(), Some(&expected), "{}", outcome.name);
    }
    assert_eq!(trainer.shared().version(), 6);
    // Each worker: 5 steps, 3 steps to the episode end, then 5 more
    assert_eq!(trainer.counter().get(), 26);
    assert_eq!(telemetry.values("episode_reward"), vec![8.0]);
    assert_eq!(telemetry.values("grad_norm").len(), 6);

    let saved = ParameterSnapshot::load(&checkpoint).unwrap();
    assert_eq!(saved.values.len(), trainer.shared().len());

    let mut resumed_config = config;
    resumed_config.resume_from = Some(checkpoint);
    let resumed = Trainer::new(resumed_config, Arc::new(NullTelemetry)).unwrap();
    assert_eq!(resumed.shared().snapshot(), saved);
}

#[test]
fn test_failing_worker_does_not_stop_others() {
    let mut config = small_config();
    config.num_workers = 3;
    config.max_rollouts = Some(2);
    config.max_eval_episodes = Some(1);
    config.eval_interval_secs = 0.0;

    enum Env {
        Healthy(ConstantRewardEnv),
        Failing(FailingEnv),
    }

    impl Environment for Env {
        fn observation_spec(&self) -> ObservationSpec {
            match self {
                Env::Healthy(env) => env.observation_spec(),
                Env::Failing(env) => env.observation_spec(),
            }
        }

        fn reset(&mut self) -> Result<Observation> {
            match self {
                Env::Healthy(env) => env.reset(),
                Env::Failing(env) => env.reset(),
            }
        }

        fn step(&mut self, action: usize) -> Result<Transition> {
            match self {
                Env::Healthy(env) => env.step(action),
                Env::Failing(env) => env.step(action),
            }
        }

        fn seed(&mut self, seed: u64) {
            match self {
                Env::Healthy(env) => env.seed(seed),
                Env::Failing(env) => env.seed(seed),
            }
        }
    }

    let trainer = Trainer::new(config, Arc::new(NullTelemetry)).unwrap();
    let session = trainer
        .launch(|role: EnvRole, config: &A3cConfig| {
            Ok(match role {
                EnvRole::Train { rank: 1 } => Env::Failing(FailingEnv::new(config.observation, 3)),
                _ => Env::Healthy(ConstantRewardEnv::new(config.observation, 1.0, 4)),
            })
        });

    let outcomes = session.join();
    assert_eq!(outcomes.len(), 4);
    for outcome in outcomes {
        match outcome.name.as_str() {
            "a3c-worker-1" => assert!(matches!(outcome.result, Err(A3cError::Environment(_)))),
            "a3c-evaluator" => assert_eq!(outcome.result.ok(), Some(1)),
            _ => assert_eq!(outcome.result.ok(), Some(2)),
        }
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = small_config();
    config.gamma = 1.5;
    assert!(Trainer::new(config, Arc::new(NullTelemetry)).is_err());
}

#[test]
fn test_csv_telemetry_records_training() {
    let dir = tempfile::tempdir().unwrap();
    let csv = Arc::new(CsvTelemetry::new(dir.path(), "run").unwrap());
    let sink: Arc<dyn TelemetrySink> = csv.clone();

    let mut config = small_config();
    config.max_rollouts = Some(2);
    let trainer = Trainer::new(config.clone(), Arc::clone(&sink)).unwrap();
    let env = ConstantRewardEnv::new(config.observation, 1.0, 3);
    let mut worker = Worker::new(
        0,
        config,
        env,
        Arc::clone(trainer.shared()),
        Arc::clone(trainer.counter()),
        sink,
    )
    .unwrap();
    worker.run().unwrap();

    let contents = std::fs::read_to_string(csv.path()).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("step,tag,value,wall_time"));
    assert_eq!(lines.filter(|line| line.contains(",grad_norm,")).count(), 2);
}
