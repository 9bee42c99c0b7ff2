//! Benchmarks for the cascade training hot paths.
//!
//! ```bash
//! cargo bench --bench cascade_benchmarks
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use zen_cascade::{
    Algorithm, CascadeNetwork, CascadeTrainer, DataPoint, DataSet, SigmoidRange, TrainingParams,
    TrainingSets,
};

fn xor_sets() -> TrainingSets<f32> {
    TrainingSets::new(DataSet::new(vec![
        DataPoint::new(vec![-0.5, -0.5], vec![-0.5]),
        DataPoint::new(vec![-0.5, 0.5], vec![0.5]),
        DataPoint::new(vec![0.5, -0.5], vec![0.5]),
        DataPoint::new(vec![0.5, 0.5], vec![-0.5]),
    ]))
}

fn trained_xor_net() -> CascadeNetwork<f32> {
    let data = xor_sets();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut net =
        CascadeNetwork::new(2, 1, 5, 1.0, SigmoidRange::default(), false, &mut rng).unwrap();
    let params: TrainingParams<f32> = TrainingParams::builder()
        .max_new_units(5)
        .random_seed(42)
        .build();
    let mut trainer = CascadeTrainer::new(&mut net, &params, &data).unwrap();
    trainer.train(0).unwrap();
    drop(trainer);
    net
}

fn bench_forward_pass(c: &mut Criterion) {
    let mut net = trained_xor_net();
    let inputs = [0.5f32, -0.5];

    c.bench_function("forward_pass", |b| {
        b.iter(|| {
            net.forward_pass(black_box(&inputs), false);
            black_box(net.outputs()[0])
        })
    });
}

fn bench_xor_trial(c: &mut Criterion) {
    let data = xor_sets();

    let mut group = c.benchmark_group("xor_trial");
    group.sample_size(10);
    for (name, algorithm) in [
        ("cascor", Algorithm::Cascor),
        ("cascade2", Algorithm::Cascade2),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut rng = ChaCha8Rng::seed_from_u64(42);
                let mut net =
                    CascadeNetwork::new(2, 1, 5, 1.0, SigmoidRange::default(), false, &mut rng)
                        .unwrap();
                let params: TrainingParams<f32> = TrainingParams::builder()
                    .max_new_units(5)
                    .algorithm(algorithm)
                    .random_seed(42)
                    .build();
                let mut trainer = CascadeTrainer::new(&mut net, &params, &data).unwrap();
                black_box(trainer.train(0).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward_pass, bench_xor_trial);
criterion_main!(benches);
