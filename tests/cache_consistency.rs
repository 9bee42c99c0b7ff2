//! The cache invariant: every cached activation must equal what an uncached
//! forward pass computes for the same unit, point and weights.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use zen_cascade::{
    ActivationCache, Algorithm, CascadeNetwork, CascadeTrainer, DataPoint, DataSet, SigmoidRange,
    TrainingParams, TrainingSets,
};

fn xor_sets() -> TrainingSets<f64> {
    let points = vec![
        DataPoint::new(vec![-0.5, -0.5], vec![-0.5]),
        DataPoint::new(vec![-0.5, 0.5], vec![0.5]),
        DataPoint::new(vec![0.5, -0.5], vec![0.5]),
        DataPoint::new(vec![0.5, 0.5], vec![-0.5]),
    ];
    TrainingSets::new(DataSet::new(points))
}

/// Train a small network with the cache enabled, then rebuild a cache from
/// scratch and check it against plain forward passes.
#[test]
fn cached_activations_match_forward_passes() {
    let data = xor_sets();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut net: CascadeNetwork<f64> =
        CascadeNetwork::new(2, 1, 3, 1.0, SigmoidRange::default(), false, &mut rng).unwrap();

    let params: TrainingParams<f64> = TrainingParams::builder()
        .max_new_units(3)
        .algorithm(Algorithm::Cascor)
        .random_seed(4)
        .build();
    {
        let mut trainer = CascadeTrainer::new(&mut net, &params, &data).unwrap();
        trainer.train(0).unwrap();
    }
    assert!(net.num_hidden_units() >= 1, "training installed no units");

    let max_units = net.num_units() + net.max_new_units();
    let mut cache: ActivationCache<f64> =
        ActivationCache::build(max_units, net.num_outputs(), data.train.len()).unwrap();
    cache.compute_initial(net.num_inputs(), &data.train);
    for unit in net.num_inputs() + 1..net.num_units() {
        cache.recompute(unit, &net, &data.train);
    }

    for (p, point) in data.train.points().iter().enumerate() {
        net.forward_pass(&point.inputs, point.reset);
        for unit in 0..net.num_units() {
            assert_relative_eq!(
                cache.values(p)[unit],
                net.unit_value(unit),
                max_relative = 1e-12
            );
        }
    }
}

/// Cached and uncached training runs see identical numbers, so with the
/// same seed they must produce identical networks.
#[test]
fn cached_and_uncached_training_agree() {
    let data = xor_sets();

    let mut nets = Vec::new();
    for use_cache in [true, false] {
        let mut rng = ChaCha8Rng::seed_from_u64(16);
        let mut net: CascadeNetwork<f64> =
            CascadeNetwork::new(2, 1, 4, 1.0, SigmoidRange::default(), false, &mut rng)
                .unwrap();
        let params: TrainingParams<f64> = TrainingParams::builder()
            .max_new_units(4)
            .use_cache(use_cache)
            .random_seed(16)
            .build();
        let mut trainer = CascadeTrainer::new(&mut net, &params, &data).unwrap();
        trainer.train(0).unwrap();
        drop(trainer);
        nets.push(net);
    }

    let (cached, uncached) = (&nets[0], &nets[1]);
    assert_eq!(cached.num_units(), uncached.num_units());
    for unit in 0..cached.num_units() {
        for (a, b) in cached
            .unit_weights(unit)
            .iter()
            .zip(uncached.unit_weights(unit))
        {
            assert_relative_eq!(*a, *b, max_relative = 1e-9);
        }
    }
    for o in 0..cached.num_outputs() {
        for (a, b) in cached.output_weights(o).iter().zip(uncached.output_weights(o)) {
            assert_relative_eq!(*a, *b, max_relative = 1e-9);
        }
    }
}
