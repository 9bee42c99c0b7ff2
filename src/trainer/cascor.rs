//! Cascade-Correlation candidate training.
//!
//! Ideally every weight adjustment would be followed by two epochs: one to
//! measure the correlation between each candidate's activation and the
//! residual error, and one to adjust the input weights toward maximizing
//! |correlation|. Instead the correlation values measured *before* the most
//! recent update steer the next one, halving the epoch count; a single
//! bootstrap epoch that only measures correlations starts the process. Only
//! the sign of the correlation is consumed and that sign changes rarely, so
//! the shortcut is safe outside pathological oscillations.

use num_traits::Float;

use crate::activation::{activation, activation_prime, SigmoidRange};
use crate::config::Algorithm;
use crate::trainer::{compute_error, CascadeTrainer, ErrorStats, LayerInfo, TrainData, TrainStatus};

impl<T: Float> CascadeTrainer<'_, T> {
    /// Train the candidate pool by gradient ascent on correlation with the
    /// residual error. Returns [`TrainStatus::Stagnant`] when the best score
    /// stops improving, [`TrainStatus::Timeout`] when the epoch budget runs
    /// out while still improving.
    pub(crate) fn cascor_train_candidates(&mut self) -> TrainStatus {
        debug_assert_eq!(self.params.algorithm, Algorithm::Cascor);

        // The per-output error sums from the last output epoch become mean
        // errors for the correlation machinery.
        let num_points = T::from(self.data.train.len()).unwrap();
        for sum in &mut self.error.sum_err {
            *sum = *sum / num_points;
        }

        self.cascor_correlation_epoch();

        let mut quit_epoch = 0usize;
        let mut last_score = T::zero();

        for i in 1..self.params.candidate_cycle.epochs {
            self.cascor_cand_epoch();
            self.adjust_candidate_in_weights();
            self.cascor_adjust_correlations();

            if self.check_interrupt() {
                return TrainStatus::Aborted;
            }

            self.net.epochs_trained += 1;

            if i == 1 {
                last_score = self.tdata.cand_best_score;
            } else if (self.tdata.cand_best_score - last_score).abs()
                > last_score * self.params.candidate_cycle.change_threshold
            {
                quit_epoch = self.net.epochs_trained + self.params.candidate_cycle.patience;
                last_score = self.tdata.cand_best_score;
            } else if self.net.epochs_trained == quit_epoch {
                return TrainStatus::Stagnant;
            }
        }

        TrainStatus::Timeout
    }

    /// The bootstrap epoch: measure correlations only, no weight update.
    fn cascor_correlation_epoch(&mut self) {
        let n_units = self.net.n_units;
        let recurrent = self.net.recurrent;
        let sig = self.net.sig;
        let ncand = self.params.num_candidates;

        for p in 0..self.data.train.len() {
            let point = &self.data.train.points()[p];
            if let Some(cache) = self.cache.as_ref() {
                correlations_for_point(
                    &mut self.tdata,
                    ncand,
                    n_units,
                    recurrent,
                    sig,
                    cache.values(p),
                    cache.errors_row(p),
                    point.reset,
                );
            } else {
                self.net.forward_pass(&point.inputs, point.reset);
                compute_error(
                    &*self.net,
                    &self.params,
                    &point.outputs,
                    &mut self.temp_errors,
                    &mut self.error,
                    false,
                    true,
                    self.params.score_threshold,
                );
                correlations_for_point(
                    &mut self.tdata,
                    ncand,
                    n_units,
                    recurrent,
                    sig,
                    &self.net.values,
                    &self.temp_errors,
                    point.reset,
                );
            }
        }

        self.cascor_adjust_correlations();
        self.net.epochs_trained += 1;
    }

    /// One combined epoch: accumulate input-weight slopes from the previous
    /// epoch's correlation signs while measuring this epoch's correlations.
    fn cascor_cand_epoch(&mut self) {
        let n_units = self.net.n_units;
        let recurrent = self.net.recurrent;
        let sig = self.net.sig;
        let ncand = self.params.num_candidates;

        for p in 0..self.data.train.len() {
            let point = &self.data.train.points()[p];
            if let Some(cache) = self.cache.as_ref() {
                slopes_for_point(
                    &mut self.tdata,
                    &self.error,
                    ncand,
                    n_units,
                    recurrent,
                    sig,
                    cache.values(p),
                    cache.errors_row(p),
                    point.reset,
                );
            } else {
                self.net.forward_pass(&point.inputs, point.reset);
                compute_error(
                    &*self.net,
                    &self.params,
                    &point.outputs,
                    &mut self.temp_errors,
                    &mut self.error,
                    false,
                    true,
                    self.params.score_threshold,
                );
                slopes_for_point(
                    &mut self.tdata,
                    &self.error,
                    ncand,
                    n_units,
                    recurrent,
                    sig,
                    &self.net.values,
                    &self.temp_errors,
                    point.reset,
                );
            }
        }
    }

    /// Normalize each candidate's raw correlations, roll them into the
    /// previous-correlation store and pick the best-scoring candidate.
    pub(crate) fn cascor_adjust_correlations(&mut self) {
        let num_points = T::from(self.data.train.len()).unwrap();
        let num_outputs = self.net.num_outputs;
        let sum_sq_error = self.error.sum_sq_error;

        let TrainData {
            cand_best,
            cand_best_score,
            cand_scores,
            cand_sum_vals,
            cand_corr,
            cand_prev_corr,
            ..
        } = &mut self.tdata;

        *cand_best = 0;
        *cand_best_score = T::zero();

        for c in 0..self.params.num_candidates {
            let ave_value = cand_sum_vals[c] / num_points;
            let mut score = T::zero();

            for o in 0..num_outputs {
                let correlation =
                    (cand_corr[c][o] - ave_value * self.error.sum_err[o]) / sum_sq_error;
                cand_prev_corr[c][o] = correlation;
                cand_corr[c][o] = T::zero();
                score = score + correlation.abs();
            }

            cand_sum_vals[c] = T::zero();
            cand_scores[c] = score;
            if score > *cand_best_score {
                *cand_best = c;
                *cand_best_score = score;
            }
        }
    }
}

/// Compute each candidate's activation on one point and accumulate its raw
/// correlation with the residual error.
#[allow(clippy::too_many_arguments)]
fn correlations_for_point<T: Float>(
    tdata: &mut TrainData<T>,
    ncand: usize,
    n_units: usize,
    recurrent: bool,
    sig: SigmoidRange<T>,
    values: &[T],
    errors: &[T],
    reset: bool,
) {
    let TrainData {
        cand_in,
        cand_sum_vals,
        cand_corr,
        cand_prev_values,
        cand_kinds,
        ..
    } = tdata;

    for c in 0..ncand {
        let weights = &cand_in.weights[c];
        let mut sum = T::zero();
        for j in 0..n_units {
            sum = sum + weights[j] * values[j];
        }
        if recurrent && !reset {
            sum = sum + weights[n_units] * cand_prev_values[c];
        }

        let value = activation(cand_kinds[c], sum, sig);
        cand_sum_vals[c] = cand_sum_vals[c] + value;

        for (corr, &error) in cand_corr[c].iter_mut().zip(errors) {
            *corr = *corr + value * error;
        }
    }
}

/// Accumulate input-weight slopes for one point, steering by the sign of
/// the previous epoch's correlations, while also accumulating this epoch's
/// raw correlations.
#[allow(clippy::too_many_arguments)]
fn slopes_for_point<T: Float>(
    tdata: &mut TrainData<T>,
    stats: &ErrorStats<T>,
    ncand: usize,
    n_units: usize,
    recurrent: bool,
    sig: SigmoidRange<T>,
    values: &[T],
    errors: &[T],
    reset: bool,
) {
    let TrainData {
        cand_in,
        cand_sum_vals,
        cand_corr,
        cand_prev_corr,
        cand_prev_values,
        cand_dv_dw,
        cand_kinds,
        ..
    } = tdata;
    let LayerInfo {
        weights: in_weights,
        slopes: in_slopes,
        ..
    } = cand_in;

    for c in 0..ncand {
        let mut sum = T::zero();
        for j in 0..n_units {
            sum = sum + values[j] * in_weights[c][j];
        }
        if recurrent && !reset {
            sum = sum + in_weights[c][n_units] * cand_prev_values[c];
        }

        let value = activation(cand_kinds[c], sum, sig);
        let mut act_prime = activation_prime(cand_kinds[c], value, sum, sig);
        cand_sum_vals[c] = cand_sum_vals[c] + value;

        if !recurrent {
            act_prime = act_prime / stats.sum_sq_error;
        }

        let mut change = T::zero();
        for o in 0..errors.len() {
            let error = errors[o];
            let direction = if cand_prev_corr[c][o] < T::zero() {
                -T::one()
            } else {
                T::one()
            };
            let deviation = if recurrent {
                (error - stats.sum_err[o]) / stats.sum_sq_error
            } else {
                act_prime * (error - stats.sum_err[o])
            };
            change = change - direction * deviation;
            cand_corr[c][o] = cand_corr[c][o] + error * value;
        }

        if recurrent {
            for j in 0..n_units {
                if reset {
                    cand_dv_dw[c][j] = T::zero();
                }
                let dsum = act_prime * (values[j] + in_weights[c][n_units] * cand_dv_dw[c][j]);
                in_slopes[c][j] = in_slopes[c][j] + change * dsum;
                cand_dv_dw[c][j] = dsum;
            }

            if !reset {
                let dsum = act_prime
                    * (cand_prev_values[c] + in_weights[c][n_units] * cand_dv_dw[c][n_units]);
                in_slopes[c][n_units] = in_slopes[c][n_units] + change * dsum;
                cand_dv_dw[c][n_units] = dsum;
            }

            cand_prev_values[c] = value;
        } else {
            for j in 0..n_units {
                in_slopes[c][j] = in_slopes[c][j] + change * values[j];
            }
        }
    }
}
