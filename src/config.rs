//! Training parameters and their documented defaults.

use num_traits::Float;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::activation::{CandidateKind, SigmoidRange, UnitKind};
use crate::errors::CascadeError;
use crate::quickprop::UpdateParams;

/// Candidate training strategy.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Cascade-Correlation: maximize |correlation| between each candidate's
    /// activation and the residual output error.
    Cascor,
    /// Cascade-2: train candidate input and output weights directly on
    /// reduction of sum-squared error.
    Cascade2,
}

/// How network success is measured.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMeasure {
    /// Win when no output misses its goal by more than the score threshold.
    Bits,
    /// Win when the normalized RMS error index drops below a threshold.
    Index,
}

/// Epoch budget and stagnation criteria for one training phase.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleParams<T: Float> {
    /// Epochs before the phase is declared TIMEOUT.
    pub epochs: usize,
    /// Epochs without significant change before the phase is STAGNANT.
    pub patience: usize,
    /// Relative change required to count as significant.
    pub change_threshold: T,
}

impl<T: Float> CycleParams<T> {
    pub fn new(epochs: usize, patience: usize, change_threshold: T) -> Self {
        Self {
            epochs,
            patience,
            change_threshold,
        }
    }
}

/// All knobs of a training run.
///
/// Read-only during a trial, with one exception: the pause hook may edit the
/// quickprop parameter groups, the cycle epoch/patience/threshold values and
/// the score/index thresholds mid-run; derived factors are recomputed when
/// training resumes. Structural knobs (counts, algorithm, recurrence,
/// caching) must not change while a trial is live.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams<T: Float> {
    /// Maximum hidden units to add to the network being trained.
    pub max_new_units: usize,
    /// Validation cycles without improvement before restoring the best
    /// checkpoint and stopping.
    pub validation_patience: usize,
    /// Candidate pool size.
    pub num_candidates: usize,
    /// Flat-spot offset added to output derivatives.
    pub out_prime_offset: T,
    /// Maximum variance of random initial weights from zero.
    pub weight_range: T,
    /// Error index below which an Index-measure trial is a win.
    pub index_threshold: T,
    /// Maximum deviation of an output from its goal to count as correct.
    pub score_threshold: T,
    /// Output range of VarSigmoid units.
    pub sig_range: SigmoidRange<T>,
    /// Cascade-2 only: skip the penalty when overshooting in the goal's
    /// direction.
    pub overshoot_ok: bool,
    pub use_cache: bool,
    /// Evaluate on the test set (or training set if none) after training.
    pub test: bool,
    /// Cross-validate during training.
    pub validate: bool,
    pub recurrent: bool,
    pub candidate_kind: CandidateKind,
    pub algorithm: Algorithm,
    pub error_measure: ErrorMeasure,
    /// Quickprop parameters for candidate input weights.
    pub candidate_in: UpdateParams<T>,
    /// Quickprop parameters for candidate output weights (Cascade-2 only).
    pub candidate_out: UpdateParams<T>,
    /// Quickprop parameters for the network output weights.
    pub output: UpdateParams<T>,
    pub candidate_cycle: CycleParams<T>,
    pub output_cycle: CycleParams<T>,
    /// Seed for reproducible candidate and weight initialization.
    pub random_seed: Option<u64>,
}

impl<T: Float> Default for TrainingParams<T> {
    fn default() -> Self {
        Self {
            max_new_units: 50,
            validation_patience: 8,
            num_candidates: 8,
            out_prime_offset: T::from(0.1).unwrap(),
            weight_range: T::one(),
            index_threshold: T::from(0.2).unwrap(),
            score_threshold: T::from(0.4).unwrap(),
            sig_range: SigmoidRange::default(),
            overshoot_ok: false,
            use_cache: true,
            test: true,
            validate: true,
            recurrent: false,
            candidate_kind: CandidateKind::Fixed(UnitKind::Sigmoid),
            algorithm: Algorithm::Cascor,
            error_measure: ErrorMeasure::Bits,
            candidate_in: UpdateParams::new(T::from(100.0).unwrap(), T::from(2.0).unwrap(), T::zero()),
            candidate_out: UpdateParams::new(T::from(100.0).unwrap(), T::from(2.0).unwrap(), T::zero()),
            output: UpdateParams::new(T::one(), T::from(2.0).unwrap(), T::zero()),
            candidate_cycle: CycleParams::new(200, 12, T::from(0.03).unwrap()),
            output_cycle: CycleParams::new(200, 12, T::from(0.01).unwrap()),
            random_seed: None,
        }
    }
}

impl<T: Float> TrainingParams<T> {
    pub fn builder() -> TrainingParamsBuilder<T> {
        TrainingParamsBuilder::new()
    }

    /// Reject nonsensical parameter combinations before training starts.
    pub fn validate(&self) -> Result<(), CascadeError> {
        if self.num_candidates == 0 {
            return Err(CascadeError::InvalidConfiguration(
                "num_candidates must be greater than 0".to_string(),
            ));
        }
        if self.output_cycle.epochs == 0 || self.candidate_cycle.epochs == 0 {
            return Err(CascadeError::InvalidConfiguration(
                "cycle epoch budgets must be greater than 0".to_string(),
            ));
        }
        if self.weight_range <= T::zero() {
            return Err(CascadeError::InvalidConfiguration(
                "weight_range must be positive".to_string(),
            ));
        }
        for (name, group) in [
            ("output", &self.output),
            ("candidate_in", &self.candidate_in),
            ("candidate_out", &self.candidate_out),
        ] {
            if group.epsilon <= T::zero() || group.mu <= T::zero() {
                return Err(CascadeError::InvalidConfiguration(format!(
                    "{name} epsilon and mu must be positive"
                )));
            }
            if group.decay < T::zero() {
                return Err(CascadeError::InvalidConfiguration(format!(
                    "{name} decay must not be negative"
                )));
            }
        }
        if self.sig_range.max <= self.sig_range.min {
            return Err(CascadeError::InvalidConfiguration(
                "varsigmoid range must have max > min".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`TrainingParams`], covering the commonly tuned knobs.
pub struct TrainingParamsBuilder<T: Float> {
    params: TrainingParams<T>,
}

impl<T: Float> TrainingParamsBuilder<T> {
    pub fn new() -> Self {
        Self {
            params: TrainingParams::default(),
        }
    }

    pub fn max_new_units(mut self, max: usize) -> Self {
        self.params.max_new_units = max;
        self
    }

    pub fn num_candidates(mut self, num: usize) -> Self {
        self.params.num_candidates = num;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.params.algorithm = algorithm;
        self
    }

    pub fn error_measure(mut self, measure: ErrorMeasure) -> Self {
        self.params.error_measure = measure;
        self
    }

    pub fn candidate_kind(mut self, kind: CandidateKind) -> Self {
        self.params.candidate_kind = kind;
        self
    }

    pub fn recurrent(mut self, recurrent: bool) -> Self {
        self.params.recurrent = recurrent;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.params.use_cache = use_cache;
        self
    }

    pub fn validate_during_training(mut self, validate: bool) -> Self {
        self.params.validate = validate;
        self
    }

    pub fn test_after_training(mut self, test: bool) -> Self {
        self.params.test = test;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.params.random_seed = Some(seed);
        self
    }

    pub fn build(self) -> TrainingParams<T> {
        self.params
    }
}

impl<T: Float> Default for TrainingParamsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
