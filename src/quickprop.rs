//! The quickprop weight update rule.
//!
//! Quickprop treats the error surface seen by a single weight as a parabola
//! and jumps toward its minimum using the current and previous slope
//! measurements. The jump is growth-limited by `mu`, and a plain gradient
//! term is mixed in whenever the previous step went the wrong way or no
//! previous step exists. Convergence behavior is sensitive to the exact
//! branch conditions below, so they are reproduced verbatim.

use num_traits::Float;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Quickprop parameters for one weight group (output weights, candidate
/// input weights or candidate output weights).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateParams<T: Float> {
    /// Learning rate for the gradient-descent term.
    pub epsilon: T,
    /// Maximum step growth factor.
    pub mu: T,
    /// Weight decay toward zero, folded into the slope.
    pub decay: T,
}

impl<T: Float> UpdateParams<T> {
    pub fn new(epsilon: T, mu: T, decay: T) -> Self {
        Self { epsilon, mu, decay }
    }

    /// The `mu / (mu + 1)` factor gating the quadratic step.
    pub fn shrink_factor(&self) -> T {
        self.mu / (self.mu + T::one())
    }
}

/// Apply one quickprop update to a single weight.
///
/// `delta` is the previous step taken, `slope` the accumulated error slope
/// for this cycle and `prev_slope` the slope from the previous cycle. On
/// return the weight has been stepped, `delta` holds the step, `prev_slope`
/// holds the decayed slope and `slope` is zeroed for the next accumulation
/// cycle.
#[allow(clippy::too_many_arguments)]
pub fn quickprop<T: Float>(
    w: &mut T,
    delta: &mut T,
    slope: &mut T,
    prev_slope: &mut T,
    epsilon: T,
    decay: T,
    mu: T,
    shrink_factor: T,
) {
    let mut next_step = T::zero();

    *slope = *slope + decay * *w;

    if *delta < T::zero() {
        if *slope > T::zero() {
            next_step = next_step - epsilon * *slope;
        }
        if *slope >= shrink_factor * *prev_slope {
            next_step = next_step + mu * *delta;
        } else {
            next_step = next_step + *delta * *slope / (*prev_slope - *slope);
        }
    } else if *delta > T::zero() {
        if *slope < T::zero() {
            next_step = next_step - epsilon * *slope;
        }
        if *slope <= shrink_factor * *prev_slope {
            next_step = next_step + mu * *delta;
        } else {
            next_step = next_step + *delta * *slope / (*prev_slope - *slope);
        }
    } else {
        // No previous step: pure gradient descent.
        next_step = next_step - epsilon * *slope;
    }

    *w = *w + next_step;
    *delta = next_step;
    *prev_slope = *slope;
    *slope = T::zero();
}
