//! Forward and backward cost of the full network at the default observation size

use std::sync::Arc;

use a3c_nav::algorithms::Worker;
use a3c_nav::config::{A3cConfig, ModelConfig};
use a3c_nav::env::testing::ConstantRewardEnv;
use a3c_nav::env::{Environment, ObservationSpec};
use a3c_nav::layers::Parameterized;
use a3c_nav::model::{ActorCritic, StepGradient};
use a3c_nav::optimizer::OptimizerConfig;
use a3c_nav::shared::{GlobalCounter, SharedParameters};
use a3c_nav::telemetry::NullTelemetry;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn forward_step(c: &mut Criterion) {
    let spec = ObservationSpec::default();
    let mut group = c.benchmark_group("forward_step");
    for use_memory in [false, true] {
        let config = ModelConfig { use_memory, ..ModelConfig::default() };
        let model = ActorCritic::new(spec, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        let observation = ConstantRewardEnv::new(spec, 1.0, 100).reset().unwrap();

        group.bench_with_input(BenchmarkId::new("memory", use_memory), &observation, |b, observation| {
            b.iter_with_large_drop(|| {
                let mut state = model.initial_state();
                model.forward(observation, &mut state).unwrap()
            })
        });
    }
    group.finish();
}

fn rollout_backward(c: &mut Criterion) {
    let spec = ObservationSpec::default();
    let model = ActorCritic::new(spec, &ModelConfig::default(), &mut StdRng::seed_from_u64(2)).unwrap();
    let mut env = ConstantRewardEnv::new(spec, 1.0, 1000);

    let mut group = c.benchmark_group("rollout_backward");
    for steps in [1usize, 5, 20] {
        let mut state = model.initial_state();
        let mut observation = env.reset().unwrap();
        let mut caches = Vec::with_capacity(steps);
        let mut grads = Vec::with_capacity(steps);
        for t in 0..steps {
            let (output, cache) = model.forward(&observation, &mut state).unwrap();
            caches.push(cache);
            grads.push(StepGradient {
                value: 1.0,
                logits: output.logits.mapv(|_| 0.1),
                depth_from_embedding: output.depth_from_embedding.mapv(|_| 0.01),
                depth_from_context: output.depth_from_context.mapv(|_| 0.01),
            });
            observation = env.step(t % spec.num_actions).unwrap().observation;
        }

        group.throughput(Throughput::Elements(steps as u64));
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, _| {
            b.iter_with_large_drop(|| {
                let mut accumulator = model.zeros_like();
                model.backward(&caches, &grads, &mut accumulator).unwrap();
                accumulator
            })
        });
    }
    group.finish();
}

fn worker_rollout(c: &mut Criterion) {
    let config = A3cConfig {
        optimizer: OptimizerConfig::Sgd,
        ..A3cConfig::default()
    };
    let model = ActorCritic::new(config.observation, &config.model, &mut StdRng::seed_from_u64(3)).unwrap();
    let initial = model.flatten();
    let shared = Arc::new(SharedParameters::new(
        &initial,
        config.optimizer.build(initial.len()),
        config.sync_mode,
    ));
    let env = ConstantRewardEnv::new(config.observation, 1.0, 1000);
    let mut worker = Worker::new(
        0,
        config,
        env,
        shared,
        Arc::new(GlobalCounter::new()),
        Arc::new(NullTelemetry),
    )
    .unwrap();

    c.bench_function("worker_rollout_20_steps", |b| b.iter(|| worker.run_rollout().unwrap()));
}

criterion_group!(benches, forward_step, rollout_backward, worker_rollout);
criterion_main!(benches);
