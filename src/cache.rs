//! Per-point activation and error caching.
//!
//! Because installed weights are frozen, every unit's activation on a given
//! data point never changes after installation. The cache stores one
//! activation row per point (sized for the network's full unit capacity)
//! plus one output-error row, and is extended by a single column whenever a
//! unit is installed. That makes the per-install cost O(points x unit index)
//! once, instead of recomputing the whole network on every epoch.

use num_traits::Float;

#[cfg(feature = "logging")]
use log::warn;

use crate::activation::activation;
use crate::data::DataSet;
use crate::errors::CascadeError;
use crate::network::CascadeNetwork;

/// Cached activation values and output errors for every training point.
#[derive(Debug, Clone)]
pub struct ActivationCache<T: Float> {
    /// `values[point][unit]`; cells beyond the installed unit count are
    /// undefined until [`ActivationCache::recompute`] runs for that unit.
    values: Vec<Vec<T>>,
    /// `errors[point][output]`, written by the output training epochs.
    errors: Vec<Vec<T>>,
}

impl<T: Float> ActivationCache<T> {
    /// Allocate a cache for `num_points` rows of `max_units` activations and
    /// `num_outputs` errors. On allocation failure everything allocated so
    /// far is released and the caller should fall back to uncached forward
    /// passes.
    pub fn build(
        max_units: usize,
        num_outputs: usize,
        num_points: usize,
    ) -> Result<Self, CascadeError> {
        let mut values = Vec::new();
        let mut errors = Vec::new();
        values
            .try_reserve_exact(num_points)
            .map_err(|_| CascadeError::CacheAllocation)?;
        errors
            .try_reserve_exact(num_points)
            .map_err(|_| CascadeError::CacheAllocation)?;

        for _ in 0..num_points {
            values.push(alloc_row(max_units)?);
            errors.push(alloc_row(num_outputs)?);
        }

        Ok(Self { values, errors })
    }

    /// Fill the bias and input cells for every point. Must run once, before
    /// any unit besides the inputs exists.
    pub fn compute_initial(&mut self, num_inputs: usize, data: &DataSet<T>) {
        for (row, point) in self.values.iter_mut().zip(data.points()) {
            row[0] = T::one();
            row[1..=num_inputs].copy_from_slice(&point.inputs[..num_inputs]);
        }
    }

    /// Compute the cached activation of unit `unit` for every point. Must be
    /// invoked exactly once per unit, immediately after installation. The
    /// recurrent self-term reads the previous point's cached value of this
    /// same unit, suppressed at sequence resets and at the first point.
    pub fn recompute(&mut self, unit: usize, net: &CascadeNetwork<T>, data: &DataSet<T>) {
        for (p, point) in data.points().iter().enumerate() {
            let mut sum = T::zero();
            for j in 0..unit {
                sum = sum + self.values[p][j] * net.weights[unit][j];
            }
            if net.recurrent && !point.reset {
                let prev = if p > 0 { self.values[p - 1][unit] } else { T::zero() };
                sum = sum + prev * net.weights[unit][unit];
            }
            self.values[p][unit] = activation(net.unit_kinds[unit], sum, net.sig);
        }
    }

    /// The cached activation row for one point.
    pub fn values(&self, point: usize) -> &[T] {
        &self.values[point]
    }

    /// The activation row and mutable error row for one point.
    pub(crate) fn point_mut(&mut self, point: usize) -> (&[T], &mut [T]) {
        (&self.values[point], &mut self.errors[point])
    }

    pub(crate) fn errors_row(&self, point: usize) -> &[T] {
        &self.errors[point]
    }
}

fn alloc_row<T: Float>(len: usize) -> Result<Vec<T>, CascadeError> {
    let mut row = Vec::new();
    row.try_reserve_exact(len)
        .map_err(|_| CascadeError::CacheAllocation)?;
    row.resize(len, T::zero());
    Ok(row)
}

/// Build a cache if the parameters ask for one, degrading to uncached
/// operation when the allocation fails.
pub(crate) fn build_optional<T: Float>(
    use_cache: bool,
    max_units: usize,
    num_outputs: usize,
    num_points: usize,
) -> Option<ActivationCache<T>> {
    if !use_cache {
        return None;
    }
    match ActivationCache::build(max_units, num_outputs, num_points) {
        Ok(cache) => Some(cache),
        Err(_) => {
            #[cfg(feature = "logging")]
            warn!("insufficient memory for the activation cache, shutting cache down");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{SigmoidRange, UnitKind};
    use crate::data::DataPoint;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn initial_rows_hold_bias_and_inputs() {
        let data = DataSet::new(vec![
            DataPoint::new(vec![2.0f64], vec![0.5]),
            DataPoint::new(vec![3.0], vec![-0.5]),
        ]);
        let mut cache: ActivationCache<f64> = ActivationCache::build(4, 1, 2).unwrap();
        cache.compute_initial(1, &data);

        assert_eq!(cache.values(0)[0], 1.0);
        assert_eq!(cache.values(0)[1], 2.0);
        assert_eq!(cache.values(1)[1], 3.0);
    }

    #[test]
    fn recompute_linear_unit() {
        // Three points, one input plus bias; a linear unit with weights
        // [0.5, 0.5] sees 0.5 * 1 + 0.5 * input.
        let data = DataSet::new(vec![
            DataPoint::new(vec![2.0f64], vec![0.5]),
            DataPoint::new(vec![0.0], vec![-0.5]),
            DataPoint::new(vec![4.0], vec![0.5]),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut net: CascadeNetwork<f64> =
            CascadeNetwork::new(1, 1, 1, 1.0, SigmoidRange::default(), false, &mut rng)
                .unwrap();
        net.weights[2][0] = 0.5;
        net.weights[2][1] = 0.5;
        net.unit_kinds[2] = UnitKind::Linear;

        let mut cache: ActivationCache<f64> = ActivationCache::build(3, 1, 3).unwrap();
        cache.compute_initial(1, &data);
        cache.recompute(2, &net, &data);

        assert_relative_eq!(cache.values(0)[2], 1.5);
        assert_relative_eq!(cache.values(1)[2], 0.5);
        assert_relative_eq!(cache.values(2)[2], 2.5);
    }

    #[test]
    fn recurrent_recompute_uses_previous_point() {
        let data = DataSet::new(vec![
            DataPoint::new(vec![1.0f64], vec![0.5]).with_reset(),
            DataPoint::new(vec![1.0], vec![0.5]),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut net: CascadeNetwork<f64> =
            CascadeNetwork::new(1, 1, 1, 1.0, SigmoidRange::default(), true, &mut rng)
                .unwrap();
        net.weights[2] = vec![1.0, 1.0, 2.0];
        net.unit_kinds[2] = UnitKind::Linear;

        let mut cache: ActivationCache<f64> = ActivationCache::build(3, 1, 2).unwrap();
        cache.compute_initial(1, &data);
        cache.recompute(2, &net, &data);

        // Point 0 is a reset: no self-term, value = 1 + 1 = 2.
        assert_relative_eq!(cache.values(0)[2], 2.0);
        // Point 1 adds 2 * previous value of the same unit.
        assert_relative_eq!(cache.values(1)[2], 2.0 + 2.0 * 2.0);
    }
}
