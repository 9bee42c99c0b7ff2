//! The growable cascade network.
//!
//! Units live in a single ordered list: the bias unit, the input units, then
//! hidden units in installation order. Unit `i` is fully connected to every
//! earlier unit, so its weight row holds exactly `i` entries (plus a
//! self-connection when the network is recurrent). Installed rows are frozen
//! for the life of the network; only the output weights remain trainable.
//! Storage for `max_new_units` additional hidden units is preallocated so
//! that growth during training never reallocates.

use num_traits::Float;
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::activation::{activation, SigmoidRange, UnitKind};
use crate::errors::CascadeError;

/// Random weight uniformly distributed in `(-range, range)`.
pub(crate) fn random_weight<T: Float, R: Rng>(rng: &mut R, range: T) -> T {
    let x = range.to_f64().unwrap();
    T::from(rng.gen_range(-x..x)).unwrap()
}

/// A feedforward (optionally recurrent) cascade network.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeNetwork<T: Float> {
    pub(crate) num_inputs: usize,
    pub(crate) num_outputs: usize,
    /// Bias + inputs + installed hidden units.
    pub(crate) n_units: usize,
    pub(crate) n_hidden: usize,
    /// Remaining growth budget.
    pub(crate) max_new_units: usize,
    /// Total unit capacity, fixed until [`CascadeNetwork::grow_capacity`].
    pub(crate) max_units: usize,
    pub(crate) epochs_trained: usize,
    pub(crate) recurrent: bool,
    pub(crate) sig: SigmoidRange<T>,
    /// Live activation values, one cell per (potential) unit.
    pub(crate) values: Vec<T>,
    /// Ragged frozen weight rows; row `i` has `i` entries, +1 if recurrent.
    /// Rows for the bias and input units are empty.
    pub(crate) weights: Vec<Vec<T>>,
    pub(crate) unit_kinds: Vec<UnitKind>,
    pub(crate) out_values: Vec<T>,
    /// Per-output weight rows, `max_units` wide.
    pub(crate) out_weights: Vec<Vec<T>>,
    pub(crate) output_kinds: Vec<UnitKind>,
}

impl<T: Float> CascadeNetwork<T> {
    /// Create a network with no hidden units and capacity to grow by
    /// `max_new_units`. Output weights into the bias and input units are
    /// randomized within `+/-weight_range`.
    pub fn new<R: Rng>(
        num_inputs: usize,
        num_outputs: usize,
        max_new_units: usize,
        weight_range: T,
        sig: SigmoidRange<T>,
        recurrent: bool,
        rng: &mut R,
    ) -> Result<Self, CascadeError> {
        if num_inputs == 0 || num_outputs == 0 {
            return Err(CascadeError::InvalidConfiguration(
                "network needs at least one input and one output".to_string(),
            ));
        }
        if sig.max <= sig.min {
            return Err(CascadeError::InvalidConfiguration(
                "varsigmoid range must have max > min".to_string(),
            ));
        }
        if weight_range <= T::zero() {
            return Err(CascadeError::InvalidConfiguration(
                "weight_range must be positive".to_string(),
            ));
        }

        let n_units = num_inputs + 1;
        let max_units = n_units + max_new_units;
        let rec = recurrent as usize;

        let mut weights = Vec::with_capacity(max_units);
        let mut unit_kinds = Vec::with_capacity(max_units);
        for i in 0..max_units {
            if i < n_units {
                weights.push(Vec::new());
            } else {
                weights.push(vec![T::zero(); i + rec]);
            }
            unit_kinds.push(UnitKind::Sigmoid);
        }

        let mut out_weights = Vec::with_capacity(num_outputs);
        for _ in 0..num_outputs {
            let mut row = vec![T::zero(); max_units];
            for cell in row.iter_mut().take(n_units) {
                *cell = random_weight(rng, weight_range);
            }
            out_weights.push(row);
        }

        Ok(Self {
            num_inputs,
            num_outputs,
            n_units,
            n_hidden: 0,
            max_new_units,
            max_units,
            epochs_trained: 0,
            recurrent,
            sig,
            values: vec![T::zero(); max_units],
            weights,
            unit_kinds,
            out_values: vec![T::zero(); num_outputs],
            out_weights,
            output_kinds: vec![UnitKind::Sigmoid; num_outputs],
        })
    }

    /// Create a network sized and randomized per a parameter table.
    pub fn from_params<R: Rng>(
        num_inputs: usize,
        num_outputs: usize,
        params: &crate::config::TrainingParams<T>,
        rng: &mut R,
    ) -> Result<Self, CascadeError> {
        Self::new(
            num_inputs,
            num_outputs,
            params.max_new_units,
            params.weight_range,
            params.sig_range,
            params.recurrent,
            rng,
        )
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Current unit count: bias + inputs + installed hidden units.
    pub fn num_units(&self) -> usize {
        self.n_units
    }

    pub fn num_hidden_units(&self) -> usize {
        self.n_hidden
    }

    /// Remaining growth budget.
    pub fn max_new_units(&self) -> usize {
        self.max_new_units
    }

    pub fn epochs_trained(&self) -> usize {
        self.epochs_trained
    }

    pub fn is_recurrent(&self) -> bool {
        self.recurrent
    }

    pub fn sigmoid_range(&self) -> SigmoidRange<T> {
        self.sig
    }

    /// Frozen incoming weights of unit `i`, in unit order. Empty for the
    /// bias and input units. The slice length is the cascade invariant:
    /// exactly `i` entries, plus one trailing self-weight when recurrent.
    pub fn unit_weights(&self, unit: usize) -> &[T] {
        &self.weights[unit]
    }

    pub fn unit_kind(&self, unit: usize) -> UnitKind {
        self.unit_kinds[unit]
    }

    /// Output weights for output `output`, one entry per installed unit.
    pub fn output_weights(&self, output: usize) -> &[T] {
        &self.out_weights[output][..self.n_units]
    }

    pub fn output_kind(&self, output: usize) -> UnitKind {
        self.output_kinds[output]
    }

    /// Set the activation function of an output unit. Gaussian outputs are
    /// not supported; their derivative has no value-only form.
    pub fn set_output_kind(&mut self, output: usize, kind: UnitKind) -> Result<(), CascadeError> {
        if kind == UnitKind::Gaussian {
            return Err(CascadeError::InvalidConfiguration(
                "gaussian output units are not supported".to_string(),
            ));
        }
        self.output_kinds[output] = kind;
        Ok(())
    }

    /// Output activations from the most recent pass.
    pub fn outputs(&self) -> &[T] {
        &self.out_values
    }

    /// Live activation value of one unit from the most recent pass.
    pub fn unit_value(&self, unit: usize) -> T {
        self.values[unit]
    }

    /// Feed one input vector forward through the network. Hidden units are
    /// evaluated in installation order; a recurrent unit also sees its own
    /// activation from the previous pass unless `reset` is set.
    pub fn forward_pass(&mut self, inputs: &[T], reset: bool) {
        self.values[0] = T::one();
        for i in 1..=self.num_inputs {
            self.values[i] = inputs[i - 1];
        }

        for i in self.num_inputs + 1..self.n_units {
            let mut sum = T::zero();
            for j in 0..i {
                sum = sum + self.values[j] * self.weights[i][j];
            }
            if self.recurrent && !reset {
                sum = sum + self.values[i] * self.weights[i][i];
            }
            self.values[i] = activation(self.unit_kinds[i], sum, self.sig);
        }

        self.compute_outputs_live();
    }

    /// Compute output activations from the live value buffer.
    fn compute_outputs_live(&mut self) {
        for o in 0..self.num_outputs {
            let mut sum = T::zero();
            for j in 0..self.n_units {
                sum = sum + self.values[j] * self.out_weights[o][j];
            }
            self.out_values[o] = activation(self.output_kinds[o], sum, self.sig);
        }
    }

    /// Compute output activations from an externally cached value row.
    pub(crate) fn compute_outputs_from(&mut self, values: &[T]) {
        for o in 0..self.num_outputs {
            let mut sum = T::zero();
            for j in 0..self.n_units {
                sum = sum + values[j] * self.out_weights[o][j];
            }
            self.out_values[o] = activation(self.output_kinds[o], sum, self.sig);
        }
    }

    /// Run a feedforward prediction and return the output activations.
    pub fn predict(&mut self, inputs: &[T], reset: bool) -> Result<&[T], CascadeError> {
        if inputs.len() != self.num_inputs {
            return Err(CascadeError::InputSize {
                expected: self.num_inputs,
                got: inputs.len(),
            });
        }
        self.forward_pass(inputs, reset);
        Ok(&self.out_values)
    }

    /// Extend capacity for `extra` more hidden units. This reallocates
    /// backing storage and must only be called between trials.
    pub fn grow_capacity(&mut self, extra: usize) {
        let old_max = self.max_units;
        let rec = self.recurrent as usize;

        self.max_new_units += extra;
        self.max_units += extra;

        self.values.resize(self.max_units, T::zero());
        for i in old_max..self.max_units {
            self.weights.push(vec![T::zero(); i + rec]);
            self.unit_kinds.push(UnitKind::Sigmoid);
        }
        for row in &mut self.out_weights {
            row.resize(self.max_units, T::zero());
        }
    }

    /// Forget all hidden units and re-randomize the output weights, keeping
    /// the allocated capacity. Used between trials of a multi-trial run.
    pub fn reset<R: Rng>(&mut self, weight_range: T, rng: &mut R) {
        self.max_new_units += self.n_hidden;
        self.n_units -= self.n_hidden;
        self.n_hidden = 0;
        self.epochs_trained = 0;

        for row in &mut self.out_weights {
            for cell in row.iter_mut().take(self.num_inputs + 1) {
                *cell = random_weight(rng, weight_range);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn new_network_has_cascade_rows_preallocated() {
        let net: CascadeNetwork<f32> =
            CascadeNetwork::new(2, 1, 5, 1.0, SigmoidRange::default(), false, &mut rng())
                .unwrap();
        assert_eq!(net.num_units(), 3);
        assert_eq!(net.max_new_units(), 5);
        for i in 0..3 {
            assert!(net.unit_weights(i).is_empty());
        }
        for i in 3..8 {
            assert_eq!(net.unit_weights(i).len(), i);
        }
    }

    #[test]
    fn recurrent_rows_carry_a_self_weight() {
        let net: CascadeNetwork<f32> =
            CascadeNetwork::new(2, 1, 3, 1.0, SigmoidRange::default(), true, &mut rng())
                .unwrap();
        for i in 3..6 {
            assert_eq!(net.unit_weights(i).len(), i + 1);
        }
    }

    #[test]
    fn forward_pass_without_hidden_units() {
        let mut net: CascadeNetwork<f64> =
            CascadeNetwork::new(1, 1, 0, 1.0, SigmoidRange::default(), false, &mut rng())
                .unwrap();
        net.out_weights[0][0] = 0.0;
        net.out_weights[0][1] = 1.0;
        net.output_kinds[0] = UnitKind::Linear;

        let out = net.predict(&[0.75], false).unwrap();
        assert_eq!(out, &[0.75]);
    }

    #[test]
    fn predict_rejects_wrong_input_width() {
        let mut net: CascadeNetwork<f32> =
            CascadeNetwork::new(2, 1, 0, 1.0, SigmoidRange::default(), false, &mut rng())
                .unwrap();
        let err = net.predict(&[1.0], false).unwrap_err();
        assert_eq!(err, CascadeError::InputSize { expected: 2, got: 1 });
    }

    #[test]
    fn grow_capacity_extends_backing_storage() {
        let mut net: CascadeNetwork<f32> =
            CascadeNetwork::new(2, 2, 1, 1.0, SigmoidRange::default(), false, &mut rng())
                .unwrap();
        net.grow_capacity(3);
        assert_eq!(net.max_new_units(), 4);
        assert_eq!(net.weights.len(), 7);
        assert_eq!(net.unit_weights(6).len(), 6);
        assert_eq!(net.out_weights[0].len(), 7);
    }

    #[test]
    fn reset_returns_growth_budget() {
        let mut net: CascadeNetwork<f32> =
            CascadeNetwork::new(2, 1, 4, 1.0, SigmoidRange::default(), false, &mut rng())
                .unwrap();
        // Simulate two installed units.
        net.n_units += 2;
        net.n_hidden += 2;
        net.max_new_units -= 2;
        net.epochs_trained = 99;

        net.reset(1.0, &mut rng());
        assert_eq!(net.num_units(), 3);
        assert_eq!(net.num_hidden_units(), 0);
        assert_eq!(net.max_new_units(), 4);
        assert_eq!(net.epochs_trained(), 0);
    }

    #[test]
    fn gaussian_outputs_are_rejected() {
        let mut net: CascadeNetwork<f32> =
            CascadeNetwork::new(1, 1, 0, 1.0, SigmoidRange::default(), false, &mut rng())
                .unwrap();
        assert!(net.set_output_kind(0, UnitKind::Gaussian).is_err());
        assert!(net.set_output_kind(0, UnitKind::Linear).is_ok());
    }
}
