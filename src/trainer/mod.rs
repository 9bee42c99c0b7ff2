//! Cascade training phases and the trial orchestrator.
//!
//! The trainer alternates two phases: training the output weights against
//! the frozen network, and training a pool of candidate units against the
//! residual error. The best candidate is installed with frozen input
//! weights, the activation cache is extended by one column, and the cycle
//! repeats until the network wins, stagnates under cross-validation, or
//! exhausts its growth budget. All transient state lives in an explicit
//! context owned by [`CascadeTrainer`] and every phase is a method on it.

use std::fmt;
use std::time::{Duration, Instant};

use num_traits::Float;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg(feature = "logging")]
use log::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::activation::{output_prime, UnitKind};
use crate::cache::{self, ActivationCache};
use crate::config::{Algorithm, ErrorMeasure, TrainingParams};
use crate::control::TrainControl;
use crate::data::{DataSet, TrainingSets};
use crate::errors::CascadeError;
use crate::network::{random_weight, CascadeNetwork};
use crate::quickprop::quickprop;

mod cascade2;
mod cascor;

/// Status of a training phase or a finished trial.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainStatus {
    Training,
    /// The phase exhausted its epoch budget while still improving.
    Timeout,
    /// The phase went too long without significant change.
    Stagnant,
    Win,
    Loss,
    /// An abort was requested through the [`TrainControl`].
    Aborted,
}

impl fmt::Display for TrainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainStatus::Training => "Training",
            TrainStatus::Timeout => "Timeout",
            TrainStatus::Stagnant => "Stagnant",
            TrainStatus::Win => "Win",
            TrainStatus::Loss => "Loss",
            TrainStatus::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Summary statistics of one training trial or test epoch.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult<T: Float> {
    pub end_status: TrainStatus,
    /// Outputs that missed their goal by more than the bit threshold in the
    /// final epoch.
    pub bits: usize,
    /// Epochs trained during this trial.
    pub epochs: usize,
    pub duration: Duration,
    pub n_victories: usize,
    /// Unit count at the end of the trial.
    pub n_units: usize,
    /// Percentage of output values within the bit threshold.
    pub per_correct: T,
    /// Normalized RMS error index.
    pub index: T,
    pub sum_sq_diffs: T,
    pub sum_sq_error: T,
}

/// Error accumulators for one epoch.
#[derive(Debug, Clone)]
pub(crate) struct ErrorStats<T: Float> {
    pub bits: usize,
    pub index: T,
    pub sum_sq_diffs: T,
    pub sum_sq_error: T,
    /// Running per-output error sum; divided by the point count at the start
    /// of candidate training to get each output's mean error.
    pub sum_err: Vec<T>,
}

impl<T: Float> ErrorStats<T> {
    fn new(num_outputs: usize) -> Self {
        Self {
            bits: 0,
            index: T::zero(),
            sum_sq_diffs: T::zero(),
            sum_sq_error: T::zero(),
            sum_err: vec![T::zero(); num_outputs],
        }
    }

    fn reset(&mut self) {
        self.bits = 0;
        self.index = T::zero();
        self.sum_sq_diffs = T::zero();
        self.sum_sq_error = T::zero();
        for sum in &mut self.sum_err {
            *sum = T::zero();
        }
    }
}

/// Quickprop bookkeeping for one trainable weight group.
#[derive(Debug, Clone)]
pub(crate) struct LayerInfo<T: Float> {
    pub shrink_factor: T,
    pub weights: Vec<Vec<T>>,
    pub deltas: Vec<Vec<T>>,
    pub slopes: Vec<Vec<T>>,
    pub p_slopes: Vec<Vec<T>>,
}

impl<T: Float> LayerInfo<T> {
    /// A candidate layer: trainable weights plus their quickprop state.
    fn with_weights(rows: usize, cols: usize, shrink_factor: T) -> Self {
        Self {
            shrink_factor,
            weights: vec![vec![T::zero(); cols]; rows],
            deltas: vec![vec![T::zero(); cols]; rows],
            slopes: vec![vec![T::zero(); cols]; rows],
            p_slopes: vec![vec![T::zero(); cols]; rows],
        }
    }

    /// The output layer: the weights live on the network, only the quickprop
    /// state is tracked here.
    fn slopes_only(rows: usize, cols: usize, shrink_factor: T) -> Self {
        Self {
            shrink_factor,
            weights: Vec::new(),
            deltas: vec![vec![T::zero(); cols]; rows],
            slopes: vec![vec![T::zero(); cols]; rows],
            p_slopes: vec![vec![T::zero(); cols]; rows],
        }
    }
}

/// Transient per-trial training state: candidate pool, quickprop
/// bookkeeping and derived update factors.
#[derive(Debug, Clone)]
pub(crate) struct TrainData<T: Float> {
    pub cand_best: usize,
    pub cand_best_score: T,
    /// Output epsilon scaled by the training point count.
    pub out_scaled_eps: T,
    pub cand_scores: Vec<T>,
    pub cand_sum_vals: Vec<T>,
    pub cand_corr: Vec<Vec<T>>,
    pub cand_prev_corr: Vec<Vec<T>>,
    /// Recurrent nets: each candidate's activation on the previous point.
    pub cand_prev_values: Vec<T>,
    /// Recurrent nets: running d(value)/d(weight) terms per candidate.
    pub cand_dv_dw: Vec<Vec<T>>,
    pub cand_kinds: Vec<UnitKind>,
    pub cand_in: LayerInfo<T>,
    pub cand_out: LayerInfo<T>,
    pub output: LayerInfo<T>,
}

impl<T: Float> TrainData<T> {
    fn build(net: &CascadeNetwork<T>, params: &TrainingParams<T>, num_points: usize) -> Self {
        let ncand = params.num_candidates;
        let nout = net.num_outputs;
        let max_units = net.max_units;
        let in_conn = max_units + net.recurrent as usize;

        Self {
            cand_best: 0,
            cand_best_score: T::zero(),
            out_scaled_eps: params.output.epsilon / T::from(num_points).unwrap(),
            cand_scores: vec![T::zero(); ncand],
            cand_sum_vals: vec![T::zero(); ncand],
            cand_corr: vec![vec![T::zero(); nout]; ncand],
            cand_prev_corr: vec![vec![T::zero(); nout]; ncand],
            cand_prev_values: vec![T::zero(); ncand],
            cand_dv_dw: vec![vec![T::zero(); max_units]; ncand],
            cand_kinds: vec![UnitKind::Sigmoid; ncand],
            cand_in: LayerInfo::with_weights(ncand, in_conn, params.candidate_in.shrink_factor()),
            cand_out: LayerInfo::with_weights(ncand, nout, params.candidate_out.shrink_factor()),
            output: LayerInfo::slopes_only(nout, max_units, params.output.shrink_factor()),
        }
    }
}

/// Output weights and unit count at the best validation score so far.
#[derive(Debug, Clone)]
struct ValidationState<T: Float> {
    best_score: T,
    best_units: usize,
    cycles_left: usize,
    best_weights: Vec<Vec<T>>,
}

impl<T: Float> ValidationState<T> {
    fn new(num_outputs: usize, max_units: usize) -> Self {
        Self {
            best_score: T::infinity(),
            best_units: 0,
            cycles_left: 0,
            best_weights: vec![vec![T::zero(); max_units]; num_outputs],
        }
    }
}

/// Hook invoked when a pause is requested; it may edit the run-safe subset
/// of the training parameters before training resumes.
pub type PauseHook<'a, T> = Box<dyn FnMut(&mut TrainingParams<T>) + 'a>;

/// Trains one network on one set of data.
///
/// The trainer owns a copy of the parameters for the duration of the run and
/// all transient training state; the network is borrowed so it survives the
/// trial for inspection, serialization or further trials.
pub struct CascadeTrainer<'a, T: Float> {
    pub(crate) net: &'a mut CascadeNetwork<T>,
    pub(crate) data: &'a TrainingSets<T>,
    pub(crate) params: TrainingParams<T>,
    pub(crate) tdata: TrainData<T>,
    pub(crate) cache: Option<ActivationCache<T>>,
    pub(crate) error: ErrorStats<T>,
    pub(crate) temp_errors: Vec<T>,
    val_state: Option<ValidationState<T>>,
    pub(crate) rng: StdRng,
    control: TrainControl,
    pause_hook: Option<PauseHook<'a, T>>,
}

impl<'a, T: Float> CascadeTrainer<'a, T> {
    /// Validate the configuration and data against the network and set up
    /// the training state. Cache allocation failure is not an error: the run
    /// degrades to uncached forward passes.
    pub fn new(
        net: &'a mut CascadeNetwork<T>,
        params: &TrainingParams<T>,
        data: &'a TrainingSets<T>,
    ) -> Result<Self, CascadeError> {
        params.validate()?;
        if params.recurrent != net.recurrent {
            return Err(CascadeError::InvalidConfiguration(
                "recurrent parameter does not match the network".to_string(),
            ));
        }
        if data.train.is_empty() || data.train.is_predict_only() {
            return Err(CascadeError::DataMismatch(
                "training set is empty or prediction-only".to_string(),
            ));
        }
        for (i, point) in data.train.points().iter().enumerate() {
            if point.inputs.len() != net.num_inputs {
                return Err(CascadeError::DataMismatch(format!(
                    "point {i} has {} inputs, network expects {}",
                    point.inputs.len(),
                    net.num_inputs
                )));
            }
            if point.outputs.len() != net.num_outputs {
                return Err(CascadeError::DataMismatch(format!(
                    "point {i} has {} outputs, network expects {}",
                    point.outputs.len(),
                    net.num_outputs
                )));
            }
        }

        let mut params = params.clone();
        let num_points = data.train.len();
        let cache = cache::build_optional(
            params.use_cache,
            net.max_units,
            net.num_outputs,
            num_points,
        );
        params.use_cache = cache.is_some();

        let rng = match params.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let tdata = TrainData::build(net, &params, num_points);
        let error = ErrorStats::new(net.num_outputs);
        let temp_errors = vec![T::zero(); net.num_outputs];

        Ok(Self {
            net,
            data,
            params,
            tdata,
            cache,
            error,
            temp_errors,
            val_state: None,
            rng,
            control: TrainControl::new(),
            pause_hook: None,
        })
    }

    /// Attach a shared control handle for cooperative pause/abort.
    pub fn with_control(mut self, control: TrainControl) -> Self {
        self.control = control;
        self
    }

    /// Register the hook invoked when a pause is requested.
    pub fn with_pause_hook(mut self, hook: impl FnMut(&mut TrainingParams<T>) + 'a) -> Self {
        self.pause_hook = Some(Box::new(hook));
        self
    }

    /// The effective parameters for this run (caching may have been disabled
    /// by allocation failure, validation by a missing validation set).
    pub fn params(&self) -> &TrainingParams<T> {
        &self.params
    }

    /// Run one training trial. `trial` is only used for reporting.
    pub fn train(&mut self, trial: usize) -> Result<TrialResult<T>, CascadeError> {
        let start = Instant::now();
        let start_epochs = self.net.epochs_trained;

        #[cfg(feature = "logging")]
        info!(
            "trial {trial}: training {} inputs -> {} outputs, growth budget {}",
            self.net.num_inputs, self.net.num_outputs, self.net.max_new_units
        );
        #[cfg(not(feature = "logging"))]
        let _ = trial;

        if let Some(cache) = self.cache.as_mut() {
            cache.compute_initial(self.net.num_inputs, &self.data.train);
        }

        let mut status = TrainStatus::Training;
        let mut val_status = TrainStatus::Training;

        while self.net.max_new_units > 0 {
            status = self.train_outputs();
            #[cfg(feature = "logging")]
            debug!(
                "output phase: {status}, bits {}, sum sq diffs {:.6}",
                self.error.bits,
                self.error.sum_sq_diffs.to_f64().unwrap_or(0.0)
            );

            if matches!(status, TrainStatus::Win | TrainStatus::Aborted) {
                break;
            }
            if self.params.validate {
                val_status = self.validation_epoch()?;
                if val_status != TrainStatus::Training {
                    break;
                }
            }

            self.init_candidates();
            status = match self.params.algorithm {
                Algorithm::Cascor => self.cascor_train_candidates(),
                Algorithm::Cascade2 => self.cascade2_train_candidates(),
            };
            if status == TrainStatus::Aborted {
                break;
            }
            self.install_candidate();
            #[cfg(feature = "logging")]
            debug!(
                "candidate phase: {status}, installed unit {} with score {:.6}",
                self.net.n_units - 1,
                self.tdata.cand_best_score.to_f64().unwrap_or(0.0)
            );
        }

        // If the growth budget ran out, the output weights have never been
        // trained against the last installed unit; fix that.
        if status != TrainStatus::Win
            && status != TrainStatus::Aborted
            && val_status == TrainStatus::Training
        {
            status = self.train_outputs();
        }

        let duration = start.elapsed();
        let epochs = self.net.epochs_trained - start_epochs;

        let (bits, index, sum_sq_diffs, sum_sq_error, out_vals) = if self.params.test {
            let set = self.data.test.as_ref().unwrap_or(&self.data.train);
            let test_res = evaluate(&mut *self.net, set, &self.params)?;
            (
                test_res.bits,
                test_res.index,
                test_res.sum_sq_diffs,
                test_res.sum_sq_error,
                set.len() * self.net.num_outputs,
            )
        } else {
            (
                self.error.bits,
                self.error.index,
                self.error.sum_sq_diffs,
                self.error.sum_sq_error,
                self.data.train.len() * self.net.num_outputs,
            )
        };

        let won = match self.params.error_measure {
            ErrorMeasure::Bits => bits == 0,
            ErrorMeasure::Index => index < self.params.index_threshold,
        };
        let end_status = if status == TrainStatus::Aborted {
            TrainStatus::Aborted
        } else if won {
            TrainStatus::Win
        } else {
            TrainStatus::Loss
        };

        let result = TrialResult {
            end_status,
            bits,
            epochs,
            duration,
            n_victories: (end_status == TrainStatus::Win) as usize,
            n_units: self.net.n_units,
            per_correct: percent_correct(out_vals, bits),
            index,
            sum_sq_diffs,
            sum_sq_error,
        };

        #[cfg(feature = "logging")]
        info!(
            "trial {trial}: {} after {} epochs, {} units, {} bits wrong",
            result.end_status, result.epochs, result.n_units, result.bits
        );

        Ok(result)
    }

    /// Train the output weights until win, stagnation or timeout.
    fn train_outputs(&mut self) -> TrainStatus {
        let n_train_out_vals = self.data.train.len() * self.net.num_outputs;
        let mut quit_epoch = 0usize;
        let mut last_error = T::zero();

        for i in 0..self.params.output_cycle.epochs {
            self.error.reset();
            self.output_epoch();

            if self.check_interrupt() {
                return TrainStatus::Aborted;
            }

            match self.params.error_measure {
                ErrorMeasure::Bits => {
                    if self.error.bits == 0 {
                        return TrainStatus::Win;
                    }
                }
                ErrorMeasure::Index => {
                    self.error.index = error_index(
                        self.error.sum_sq_diffs,
                        self.data.train.std_dev(),
                        n_train_out_vals,
                    );
                    if self.error.index <= self.params.index_threshold {
                        return TrainStatus::Win;
                    }
                }
            }

            self.adjust_output_weights();
            self.net.epochs_trained += 1;

            if i == 0 {
                last_error = self.error.sum_sq_diffs;
            } else if (self.error.sum_sq_diffs - last_error).abs()
                > last_error * self.params.output_cycle.change_threshold
            {
                last_error = self.error.sum_sq_diffs;
                quit_epoch = self.net.epochs_trained + self.params.output_cycle.patience;
            } else if self.net.epochs_trained == quit_epoch {
                return TrainStatus::Stagnant;
            }
        }

        TrainStatus::Timeout
    }

    /// Present every training point once, accumulating error statistics and
    /// output-weight slopes.
    fn output_epoch(&mut self) {
        let use_eprime = self.params.algorithm == Algorithm::Cascor;
        let threshold = self.params.score_threshold;

        for p in 0..self.data.train.len() {
            let point = &self.data.train.points()[p];
            if let Some(cache) = self.cache.as_mut() {
                let (values, errors) = cache.point_mut(p);
                self.net.compute_outputs_from(values);
                compute_error(
                    &*self.net,
                    &self.params,
                    &point.outputs,
                    errors,
                    &mut self.error,
                    true,
                    use_eprime,
                    threshold,
                );
                accumulate_output_slopes(
                    &mut self.tdata.output.slopes,
                    errors,
                    values,
                    self.net.n_units,
                );
            } else {
                self.net.forward_pass(&point.inputs, point.reset);
                compute_error(
                    &*self.net,
                    &self.params,
                    &point.outputs,
                    &mut self.temp_errors,
                    &mut self.error,
                    true,
                    use_eprime,
                    threshold,
                );
                accumulate_output_slopes(
                    &mut self.tdata.output.slopes,
                    &self.temp_errors,
                    &self.net.values,
                    self.net.n_units,
                );
            }
        }
    }

    /// Quickprop every output weight from its accumulated slope.
    fn adjust_output_weights(&mut self) {
        let eps = self.tdata.out_scaled_eps;
        let decay = self.params.output.decay;
        let mu = self.params.output.mu;
        let shrink = self.tdata.output.shrink_factor;
        let n_units = self.net.n_units;

        let LayerInfo {
            deltas,
            slopes,
            p_slopes,
            ..
        } = &mut self.tdata.output;

        for o in 0..self.net.num_outputs {
            let row = &mut self.net.out_weights[o];
            for j in 0..n_units {
                quickprop(
                    &mut row[j],
                    &mut deltas[o][j],
                    &mut slopes[o][j],
                    &mut p_slopes[o][j],
                    eps,
                    decay,
                    mu,
                    shrink,
                );
            }
        }
    }

    /// Quickprop the candidate input weights. The epsilon is scaled by the
    /// point count and the unit count to keep step sizes comparable as the
    /// network grows.
    pub(crate) fn adjust_candidate_in_weights(&mut self) {
        let scaled_eps = self.params.candidate_in.epsilon
            / T::from(self.data.train.len() * self.net.n_units).unwrap();
        let decay = self.params.candidate_in.decay;
        let mu = self.params.candidate_in.mu;
        let shrink = self.tdata.cand_in.shrink_factor;
        let n_conn = self.net.n_units + self.net.recurrent as usize;

        let LayerInfo {
            weights,
            deltas,
            slopes,
            p_slopes,
            ..
        } = &mut self.tdata.cand_in;

        for c in 0..self.params.num_candidates {
            for j in 0..n_conn {
                quickprop(
                    &mut weights[c][j],
                    &mut deltas[c][j],
                    &mut slopes[c][j],
                    &mut p_slopes[c][j],
                    scaled_eps,
                    decay,
                    mu,
                    shrink,
                );
            }
        }
    }

    /// Quickprop the candidate output weights. Cascade-2 only.
    pub(crate) fn adjust_candidate_out_weights(&mut self) {
        let scaled_eps = self.params.candidate_out.epsilon
            / T::from(self.data.train.len() * self.net.n_units).unwrap();
        let decay = self.params.candidate_out.decay;
        let mu = self.params.candidate_out.mu;
        let shrink = self.tdata.cand_out.shrink_factor;

        let LayerInfo {
            weights,
            deltas,
            slopes,
            p_slopes,
            ..
        } = &mut self.tdata.cand_out;

        for c in 0..self.params.num_candidates {
            for j in 0..self.net.num_outputs {
                quickprop(
                    &mut weights[c][j],
                    &mut deltas[c][j],
                    &mut slopes[c][j],
                    &mut p_slopes[c][j],
                    scaled_eps,
                    decay,
                    mu,
                    shrink,
                );
            }
        }
    }

    /// Reinitialize the candidate pool with random weights for another
    /// training cycle.
    fn init_candidates(&mut self) {
        let n_conn = self.net.n_units + self.net.recurrent as usize;
        let recurrent = self.net.recurrent;
        let weight_range = self.params.weight_range;
        let candidate_kind = self.params.candidate_kind;
        let num_outputs = self.net.num_outputs;

        let TrainData {
            cand_sum_vals,
            cand_prev_values,
            cand_corr,
            cand_prev_corr,
            cand_dv_dw,
            cand_kinds,
            cand_in,
            cand_out,
            ..
        } = &mut self.tdata;

        for c in 0..self.params.num_candidates {
            cand_sum_vals[c] = T::zero();
            if recurrent {
                cand_prev_values[c] = T::zero();
            }
            for o in 0..num_outputs {
                cand_corr[c][o] = T::zero();
                cand_prev_corr[c][o] = T::zero();
                cand_out.weights[c][o] = random_weight(&mut self.rng, weight_range);
                cand_out.deltas[c][o] = T::zero();
                cand_out.slopes[c][o] = T::zero();
                cand_out.p_slopes[c][o] = T::zero();
            }
            for j in 0..n_conn {
                cand_in.weights[c][j] = random_weight(&mut self.rng, weight_range);
                cand_in.deltas[c][j] = T::zero();
                cand_in.slopes[c][j] = T::zero();
                cand_in.p_slopes[c][j] = T::zero();
                if recurrent {
                    cand_dv_dw[c][j] = T::zero();
                }
            }
            cand_kinds[c] = candidate_kind.kind_for(c);
        }
    }

    /// Install the best candidate as the network's next hidden unit.
    ///
    /// The candidate's input weights are copied verbatim and frozen.
    /// Cascade-2 candidates carry trained output weights, which are copied
    /// negated; Cascade-Correlation approximates them from the candidate's
    /// correlation instead.
    fn install_candidate(&mut self) {
        let cand = self.tdata.cand_best;
        let copy_output_weights = self.params.algorithm == Algorithm::Cascade2;
        let unit = self.net.n_units;
        let n_in = unit + self.net.recurrent as usize;

        self.net.weights[unit][..n_in].copy_from_slice(&self.tdata.cand_in.weights[cand][..n_in]);

        if copy_output_weights {
            for o in 0..self.net.num_outputs {
                self.net.out_weights[o][unit] = -self.tdata.cand_out.weights[cand][o];
            }
        } else {
            let weight_modifier = match self.params.error_measure {
                ErrorMeasure::Bits => T::one(),
                ErrorMeasure::Index => T::one() / T::from(unit).unwrap(),
            };
            for o in 0..self.net.num_outputs {
                self.net.out_weights[o][unit] =
                    -self.tdata.cand_prev_corr[cand][o] * weight_modifier;
            }
        }

        self.net.unit_kinds[unit] = self.tdata.cand_kinds[cand];

        if let Some(cache) = self.cache.as_mut() {
            cache.recompute(unit, &*self.net, &self.data.train);
        }
        self.net.n_units += 1;
        self.net.n_hidden += 1;
        self.net.max_new_units -= 1;
    }

    /// Run one epoch on the validation set, checkpointing the output weights
    /// at each new best score and restoring them when `validation_patience`
    /// epochs pass without improvement.
    fn validation_epoch(&mut self) -> Result<TrainStatus, CascadeError> {
        let Some(val_set) = self.data.validation.as_ref() else {
            #[cfg(feature = "logging")]
            warn!("no validation data, validation disabled for this run");
            self.params.validate = false;
            return Ok(TrainStatus::Training);
        };

        let result = evaluate(&mut *self.net, val_set, &self.params)?;

        match self.val_state.as_mut() {
            // No improvement: burn patience, then restore the checkpoint.
            Some(state) if result.sum_sq_error >= state.best_score => {
                if state.cycles_left > 0 {
                    state.cycles_left -= 1;
                    return Ok(TrainStatus::Training);
                }

                self.net.n_units = state.best_units;
                self.net.n_hidden = state.best_units - (self.net.num_inputs + 1);
                for (o, row) in state.best_weights.iter().enumerate() {
                    self.net.out_weights[o][..state.best_units]
                        .copy_from_slice(&row[..state.best_units]);
                }
                #[cfg(feature = "logging")]
                info!(
                    "validation stagnant, restored best network: score {:.6}, {} units",
                    state.best_score.to_f64().unwrap_or(0.0),
                    state.best_units
                );
                Ok(TrainStatus::Stagnant)
            }
            // First epoch or a new best score: checkpoint the output weights.
            _ => {
                let num_outputs = self.net.num_outputs;
                let max_units = self.net.max_units;
                let state = self
                    .val_state
                    .get_or_insert_with(|| ValidationState::new(num_outputs, max_units));
                state.best_score = result.sum_sq_error;
                state.cycles_left = self.params.validation_patience;
                state.best_units = self.net.n_units;
                for (o, row) in state.best_weights.iter_mut().enumerate() {
                    row[..self.net.n_units]
                        .copy_from_slice(&self.net.out_weights[o][..self.net.n_units]);
                }
                #[cfg(feature = "logging")]
                debug!(
                    "validation improved: score {:.6}, {} units",
                    state.best_score.to_f64().unwrap_or(0.0),
                    state.best_units
                );
                Ok(TrainStatus::Training)
            }
        }
    }

    /// Handle a pending pause or abort at an epoch boundary. Returns true
    /// when the trial should abort.
    pub(crate) fn check_interrupt(&mut self) -> bool {
        if self.control.take_pause() {
            #[cfg(feature = "logging")]
            info!("training suspended at epoch {}", self.net.epochs_trained);
            if let Some(hook) = self.pause_hook.as_mut() {
                hook(&mut self.params);
            }
            // The hook may have changed epsilons or mu; rescale before
            // resuming.
            self.refresh_update_factors();
            #[cfg(feature = "logging")]
            info!("training continuing");
        }
        self.control.abort_requested()
    }

    fn refresh_update_factors(&mut self) {
        self.tdata.out_scaled_eps =
            self.params.output.epsilon / T::from(self.data.train.len()).unwrap();
        self.tdata.output.shrink_factor = self.params.output.shrink_factor();
        self.tdata.cand_in.shrink_factor = self.params.candidate_in.shrink_factor();
        self.tdata.cand_out.shrink_factor = self.params.candidate_out.shrink_factor();
    }
}

/// Run one evaluation epoch over a data set without changing any weights.
///
/// Bits are counted against the fixed 0.4999 threshold, and the error index
/// is computed against the evaluated set's own standard deviation.
pub fn evaluate<T: Float>(
    net: &mut CascadeNetwork<T>,
    set: &DataSet<T>,
    params: &TrainingParams<T>,
) -> Result<TrialResult<T>, CascadeError> {
    if set.is_empty() || set.is_predict_only() {
        return Err(CascadeError::DataMismatch(
            "cannot evaluate on an empty or prediction-only data set".to_string(),
        ));
    }
    for (i, point) in set.points().iter().enumerate() {
        if point.inputs.len() != net.num_inputs || point.outputs.len() != net.num_outputs {
            return Err(CascadeError::DataMismatch(format!(
                "point {i} does not match the network dimensions"
            )));
        }
    }

    let mut stats = ErrorStats::new(net.num_outputs);
    let mut errors = vec![T::zero(); net.num_outputs];
    let bit_threshold = T::from(0.4999).unwrap();

    for point in set.points() {
        net.forward_pass(&point.inputs, point.reset);
        compute_error(
            &*net,
            params,
            &point.outputs,
            &mut errors,
            &mut stats,
            true,
            true,
            bit_threshold,
        );
    }

    let out_vals = set.len() * net.num_outputs;
    let index = error_index(stats.sum_sq_diffs, set.std_dev(), out_vals);
    let won = match params.error_measure {
        ErrorMeasure::Bits => stats.bits == 0,
        ErrorMeasure::Index => index < params.index_threshold,
    };

    Ok(TrialResult {
        end_status: if won { TrainStatus::Win } else { TrainStatus::Loss },
        bits: stats.bits,
        epochs: 0,
        duration: Duration::ZERO,
        n_victories: won as usize,
        n_units: net.n_units,
        per_correct: percent_correct(out_vals, stats.bits),
        index,
        sum_sq_diffs: stats.sum_sq_diffs,
        sum_sq_error: stats.sum_sq_error,
    })
}

/// Per-output error for the current outputs against a goal vector.
///
/// The raw difference feeds the statistics; the stored error is optionally
/// weighted by the output derivative for quickprop stability.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compute_error<T: Float>(
    net: &CascadeNetwork<T>,
    params: &TrainingParams<T>,
    goal: &[T],
    errors: &mut [T],
    stats: &mut ErrorStats<T>,
    alter_stats: bool,
    use_eprime: bool,
    threshold: T,
) {
    for o in 0..net.num_outputs {
        let value = net.out_values[o];
        let dif = value - goal[o];
        let error = if use_eprime {
            dif * output_prime(net.output_kinds[o], value, params.out_prime_offset, net.sig)
        } else {
            dif
        };

        errors[o] = error;

        if alter_stats {
            if dif.abs() > threshold {
                stats.bits += 1;
            }
            stats.sum_sq_diffs = stats.sum_sq_diffs + dif * dif;
            stats.sum_sq_error = stats.sum_sq_error + error * error;
            stats.sum_err[o] = stats.sum_err[o] + error;
        }
    }
}

/// Accumulate the output-weight gradient contributions for one point.
fn accumulate_output_slopes<T: Float>(
    slopes: &mut [Vec<T>],
    errors: &[T],
    values: &[T],
    n_units: usize,
) {
    for (row, &error) in slopes.iter_mut().zip(errors) {
        for j in 0..n_units {
            row[j] = row[j] + error * values[j];
        }
    }
}

/// Normalized RMS error: `sqrt(sum_sq_diffs / num) / std_dev`.
pub(crate) fn error_index<T: Float>(sum_sq_diffs: T, std_dev: T, num: usize) -> T {
    (sum_sq_diffs / T::from(num).unwrap()).sqrt() / std_dev
}

fn percent_correct<T: Float>(out_vals: usize, bits: usize) -> T {
    T::from(out_vals - bits).unwrap() / T::from(out_vals).unwrap() * T::from(100.0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::SigmoidRange;
    use crate::data::DataPoint;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn xor_sets() -> TrainingSets<f64> {
        let points = vec![
            DataPoint::new(vec![-0.5, -0.5], vec![-0.5]),
            DataPoint::new(vec![-0.5, 0.5], vec![0.5]),
            DataPoint::new(vec![0.5, -0.5], vec![0.5]),
            DataPoint::new(vec![0.5, 0.5], vec![-0.5]),
        ];
        TrainingSets::new(DataSet::new(points))
    }

    fn xor_net(max_new_units: usize) -> CascadeNetwork<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        CascadeNetwork::new(
            2,
            1,
            max_new_units,
            1.0,
            SigmoidRange::default(),
            false,
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn trainer_rejects_mismatched_data() {
        let data = xor_sets();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut net: CascadeNetwork<f64> =
            CascadeNetwork::new(3, 1, 2, 1.0, SigmoidRange::default(), false, &mut rng)
                .unwrap();
        let params = TrainingParams::default();
        assert!(matches!(
            CascadeTrainer::new(&mut net, &params, &data),
            Err(CascadeError::DataMismatch(_))
        ));
    }

    #[test]
    fn trainer_rejects_recurrence_mismatch() {
        let data = xor_sets();
        let mut net = xor_net(2);
        let mut params: TrainingParams<f64> = TrainingParams::default();
        params.recurrent = true;
        assert!(matches!(
            CascadeTrainer::new(&mut net, &params, &data),
            Err(CascadeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn missing_validation_set_disables_validation() {
        let data = xor_sets();
        let mut net = xor_net(1);
        let mut params: TrainingParams<f64> = TrainingParams::default();
        params.random_seed = Some(3);
        params.test = false;
        let mut trainer = CascadeTrainer::new(&mut net, &params, &data).unwrap();
        let status = trainer.validation_epoch().unwrap();
        assert_eq!(status, TrainStatus::Training);
        assert!(!trainer.params().validate);
    }

    #[test]
    fn validation_checkpoints_and_restores_output_weights() {
        let data = xor_sets().with_validation(DataSet::new(vec![
            DataPoint::new(vec![-0.5, -0.5], vec![-0.5]),
            DataPoint::new(vec![0.5, 0.5], vec![-0.5]),
        ]));
        let mut net = xor_net(3);
        // Linear outputs so a weight shift degrades the score monotonically
        // instead of saturating.
        net.set_output_kind(0, UnitKind::Linear).unwrap();
        let mut params: TrainingParams<f64> = TrainingParams::default();
        params.random_seed = Some(5);
        params.validation_patience = 1;
        let mut trainer = CascadeTrainer::new(&mut net, &params, &data).unwrap();

        // First epoch always checkpoints.
        assert_eq!(trainer.validation_epoch().unwrap(), TrainStatus::Training);
        let checkpoint: Vec<f64> = trainer.net.output_weights(0).to_vec();
        let checkpoint_units = trainer.net.num_units();

        // Make the network strictly worse, then exhaust the patience.
        for w in trainer.net.out_weights[0].iter_mut() {
            *w = *w + 10.0;
        }
        assert_eq!(trainer.validation_epoch().unwrap(), TrainStatus::Training);
        let status = trainer.validation_epoch().unwrap();
        assert_eq!(status, TrainStatus::Stagnant);

        // The restored weights must equal the checkpoint exactly.
        assert_eq!(trainer.net.num_units(), checkpoint_units);
        for (restored, saved) in trainer.net.output_weights(0).iter().zip(&checkpoint) {
            assert_eq!(restored, saved);
        }
    }

    #[test]
    fn abort_propagates_through_the_output_phase() {
        let data = xor_sets();
        let mut net = xor_net(2);
        let mut params: TrainingParams<f64> = TrainingParams::default();
        params.random_seed = Some(11);
        params.test = false;
        params.validate = false;
        let control = TrainControl::new();
        control.request_abort();
        let mut trainer = CascadeTrainer::new(&mut net, &params, &data)
            .unwrap()
            .with_control(control);
        let result = trainer.train(0).unwrap();
        assert_eq!(result.end_status, TrainStatus::Aborted);
    }

    #[test]
    fn pause_hook_edits_parameters_and_rescales() {
        let data = xor_sets();
        let mut net = xor_net(2);
        let mut params: TrainingParams<f64> = TrainingParams::default();
        params.random_seed = Some(13);
        let control = TrainControl::new();
        control.request_pause();
        let mut trainer = CascadeTrainer::new(&mut net, &params, &data)
            .unwrap()
            .with_control(control)
            .with_pause_hook(|p| p.output.epsilon = 2.0);

        assert!(!trainer.check_interrupt());
        assert_eq!(trainer.params().output.epsilon, 2.0);
        // out_scaled_eps = epsilon / points = 2.0 / 4
        assert_relative_eq!(trainer.tdata.out_scaled_eps, 0.5);
    }

    #[test]
    fn evaluate_counts_bits_against_the_test_threshold() {
        let data = xor_sets();
        let mut net = xor_net(0);
        let params: TrainingParams<f64> = TrainingParams::default();
        let result = evaluate(&mut net, &data.train, &params).unwrap();
        assert!(result.bits <= 4);
        assert!(result.sum_sq_diffs >= 0.0);
        assert_relative_eq!(
            result.per_correct,
            (4.0 - result.bits as f64) / 4.0 * 100.0
        );
    }

    #[test]
    fn evaluate_rejects_predict_only_sets() {
        let mut net = xor_net(0);
        let params: TrainingParams<f64> = TrainingParams::default();
        let set = DataSet::predict_only(vec![DataPoint::new(vec![0.5, 0.5], vec![])]);
        assert!(evaluate(&mut net, &set, &params).is_err());
    }

    #[test]
    fn error_index_matches_definition() {
        let index = error_index(2.0f64, 0.5, 8);
        assert_relative_eq!(index, (2.0f64 / 8.0).sqrt() / 0.5);
    }

    #[test]
    fn index_measure_win_detection() {
        let set = DataSet::new(vec![
            DataPoint::new(vec![0.25f64], vec![0.25]),
            DataPoint::new(vec![-0.25], vec![-0.25]),
            DataPoint::new(vec![0.5], vec![0.5]),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut net: CascadeNetwork<f64> =
            CascadeNetwork::new(1, 1, 0, 1.0, SigmoidRange::default(), false, &mut rng)
                .unwrap();
        net.set_output_kind(0, UnitKind::Linear).unwrap();
        net.out_weights[0][0] = 0.0;
        net.out_weights[0][1] = 1.0;

        let mut params: TrainingParams<f64> = TrainingParams::default();
        params.error_measure = ErrorMeasure::Index;

        // An identity network reproduces every goal, so the index is zero.
        let result = evaluate(&mut net, &set, &params).unwrap();
        assert_eq!(result.end_status, TrainStatus::Win);
        assert_eq!(result.bits, 0);
        assert!(result.index < 1e-9);

        // Negating the weight drives the index well past the threshold.
        net.out_weights[0][1] = -1.0;
        let result = evaluate(&mut net, &set, &params).unwrap();
        assert_eq!(result.end_status, TrainStatus::Loss);
        assert!(result.index > params.index_threshold);
    }
}
