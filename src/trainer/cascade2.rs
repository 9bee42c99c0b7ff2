//! Cascade-2 candidate training.
//!
//! Unlike Cascade-Correlation, Cascade-2 trains candidate output weights
//! directly: each candidate's projected contribution `weight * value` is
//! compared against the network's actual output error and both weight
//! groups descend on the squared difference. A candidate's score starts at
//! the epoch's sum of squared differences and loses the squared projection
//! error, so the best candidate is the one that explains the most residual
//! error.

use num_traits::Float;

use crate::activation::{activation, activation_prime, SigmoidRange};
use crate::config::Algorithm;
use crate::trainer::{compute_error, CascadeTrainer, LayerInfo, TrainData, TrainStatus};

impl<T: Float> CascadeTrainer<'_, T> {
    /// Train the candidate pool on reduction of sum-squared error.
    pub(crate) fn cascade2_train_candidates(&mut self) -> TrainStatus {
        debug_assert_eq!(self.params.algorithm, Algorithm::Cascade2);

        let mut quit_epoch = 0usize;
        let mut backslide = T::from(-1.0e20).unwrap();
        let mut target = T::zero();

        for _ in 0..self.params.candidate_cycle.epochs {
            self.cascade2_cand_epoch();

            self.adjust_candidate_in_weights();
            self.adjust_candidate_out_weights();
            self.cascade2_find_best();

            self.net.epochs_trained += 1;

            if self.check_interrupt() {
                return TrainStatus::Aborted;
            }

            // Stagnation bands: significant improvement pushes the target
            // up, a significant backslide also resets the deadline.
            let score = self.tdata.cand_best_score;
            let threshold = self.params.candidate_cycle.change_threshold;
            if score > target || score < backslide {
                target = score * (threshold + T::one());
                backslide = score * (T::one() - threshold);
                quit_epoch = self.net.epochs_trained + self.params.candidate_cycle.patience;
            } else if self.net.epochs_trained == quit_epoch {
                return TrainStatus::Stagnant;
            }
        }

        TrainStatus::Timeout
    }

    /// One training epoch over all points for the whole pool.
    fn cascade2_cand_epoch(&mut self) {
        let n_units = self.net.n_units;
        let recurrent = self.net.recurrent;
        let sig = self.net.sig;
        let ncand = self.params.num_candidates;
        let overshoot_ok = self.params.overshoot_ok;

        // Scores start from the last output epoch's sum of squared
        // differences and are whittled down by each projection miss.
        let baseline = self.error.sum_sq_diffs;
        {
            let TrainData {
                cand_scores,
                cand_prev_values,
                cand_dv_dw,
                ..
            } = &mut self.tdata;
            for c in 0..ncand {
                cand_scores[c] = baseline;
                if recurrent {
                    cand_prev_values[c] = T::zero();
                    for j in 0..=n_units {
                        cand_dv_dw[c][j] = T::zero();
                    }
                }
            }
        }

        for p in 0..self.data.train.len() {
            let point = &self.data.train.points()[p];
            if let Some(cache) = self.cache.as_ref() {
                slopes_for_point(
                    &mut self.tdata,
                    ncand,
                    n_units,
                    recurrent,
                    overshoot_ok,
                    sig,
                    cache.values(p),
                    cache.errors_row(p),
                    &point.outputs,
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
                    false,
                    self.params.score_threshold,
                );
                slopes_for_point(
                    &mut self.tdata,
                    ncand,
                    n_units,
                    recurrent,
                    overshoot_ok,
                    sig,
                    &self.net.values,
                    &self.temp_errors,
                    &point.outputs,
                    point.reset,
                );
            }
        }
    }

    fn cascade2_find_best(&mut self) {
        let tdata = &mut self.tdata;
        tdata.cand_best = 0;
        tdata.cand_best_score = tdata.cand_scores[0];

        for c in 1..self.params.num_candidates {
            if tdata.cand_scores[c] > tdata.cand_best_score {
                tdata.cand_best = c;
                tdata.cand_best_score = tdata.cand_scores[c];
            }
        }
    }
}

/// Accumulate slopes for both candidate weight groups on one point.
///
/// The overshoot escape is evaluated per output: when the projection misses
/// in the same direction the goal lies in and overshooting is allowed, that
/// output contributes neither penalty nor slope.
#[allow(clippy::too_many_arguments)]
fn slopes_for_point<T: Float>(
    tdata: &mut TrainData<T>,
    ncand: usize,
    n_units: usize,
    recurrent: bool,
    overshoot_ok: bool,
    sig: SigmoidRange<T>,
    values: &[T],
    errors: &[T],
    goal: &[T],
    reset: bool,
) {
    let TrainData {
        cand_in,
        cand_out,
        cand_scores,
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
    let LayerInfo {
        weights: out_weights,
        slopes: out_slopes,
        ..
    } = cand_out;

    for c in 0..ncand {
        let mut sum = T::zero();
        let mut err_sum = T::zero();

        for j in 0..n_units {
            sum = sum + values[j] * in_weights[c][j];
        }
        if recurrent && !reset {
            sum = sum + cand_prev_values[c] * in_weights[c][n_units];
        }

        let value = activation(cand_kinds[c], sum, sig);
        let act_prime = activation_prime(cand_kinds[c], value, sum, sig);

        for o in 0..errors.len() {
            let weight = out_weights[c][o];
            let dif = weight * value - errors[o];
            let goal_dir = if goal[o] < T::zero() { -T::one() } else { T::one() };
            let dif_dir = if dif > T::zero() { -T::one() } else { T::one() };

            if !(overshoot_ok && goal_dir == dif_dir) {
                cand_scores[c] = cand_scores[c] - dif * dif;
                out_slopes[c][o] = out_slopes[c][o] + dif * value;
                err_sum = err_sum + dif * weight;
            }
        }
        let err_sum = err_sum * act_prime;

        // First approximation of the incoming slopes.
        for j in 0..n_units {
            in_slopes[c][j] = in_slopes[c][j] + err_sum * values[j];
        }

        // Influence of the recurrent self-connection.
        if recurrent {
            for j in 0..n_units {
                if reset {
                    cand_dv_dw[c][j] = T::zero();
                }
                let dsum = act_prime * (values[j] + in_weights[c][n_units] * cand_dv_dw[c][j]);
                in_slopes[c][j] = in_slopes[c][j] + err_sum * dsum;
                cand_dv_dw[c][j] = dsum;
            }

            if !reset {
                let dsum = act_prime
                    * (cand_prev_values[c] + in_weights[c][n_units] * cand_dv_dw[c][n_units]);
                in_slopes[c][n_units] = in_slopes[c][n_units] + err_sum * dsum;
                cand_dv_dw[c][n_units] = dsum;
            }

            cand_prev_values[c] = value;
        }
    }
}
