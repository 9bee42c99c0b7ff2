//! Activation functions shared by network units and candidate units.
//!
//! The sigmoid family saturates rather than overflows: net inputs beyond
//! +/-15 clamp to the asymptotic output values, and the gaussian underflows
//! to zero once its exponent drops below -75. Output units get a separate
//! derivative with a flat-spot offset; hidden and candidate units never do,
//! since the offset confuses the correlation machinery.

use num_traits::Float;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output range of a `VarSigmoid` unit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidRange<T: Float> {
    pub min: T,
    pub max: T,
}

impl<T: Float> Default for SigmoidRange<T> {
    fn default() -> Self {
        Self {
            min: T::from(-0.5).unwrap(),
            max: T::from(0.5).unwrap(),
        }
    }
}

/// Activation function of a single unit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Symmetric sigmoid with outputs in (-0.5, 0.5).
    Sigmoid,
    /// Asymmetric sigmoid with outputs in (0, 1).
    ASigmoid,
    /// Sigmoid scaled into a configurable [`SigmoidRange`].
    VarSigmoid,
    /// `exp(-sum^2 / 2)`, outputs in (0, 1].
    Gaussian,
    Linear,
}

/// Activation selection for the candidate pool.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Every candidate uses the same activation function.
    Fixed(UnitKind),
    /// Cycle the pool through sigmoid, asigmoid, varsigmoid and gaussian.
    Varied,
}

impl CandidateKind {
    /// Activation function for the candidate in the given pool slot.
    pub fn kind_for(self, slot: usize) -> UnitKind {
        match self {
            CandidateKind::Fixed(kind) => kind,
            CandidateKind::Varied => match slot % 4 {
                0 => UnitKind::Sigmoid,
                1 => UnitKind::ASigmoid,
                2 => UnitKind::VarSigmoid,
                _ => UnitKind::Gaussian,
            },
        }
    }
}

/// Compute a unit's activation from the sum of its weighted inputs.
pub fn activation<T: Float>(kind: UnitKind, sum: T, sig: SigmoidRange<T>) -> T {
    let cutoff = T::from(15.0).unwrap();
    let half = T::from(0.5).unwrap();

    match kind {
        UnitKind::Sigmoid => {
            if sum < -cutoff {
                -half
            } else if sum > cutoff {
                half
            } else {
                T::one() / (T::one() + (-sum).exp()) - half
            }
        }
        UnitKind::ASigmoid => {
            if sum < -cutoff {
                T::zero()
            } else if sum > cutoff {
                T::one()
            } else {
                T::one() / (T::one() + (-sum).exp())
            }
        }
        UnitKind::VarSigmoid => {
            if sum < -cutoff {
                sig.min
            } else if sum > cutoff {
                sig.max
            } else {
                (sig.max - sig.min) / (T::one() + (-sum).exp()) + sig.min
            }
        }
        UnitKind::Gaussian => {
            let exponent = -half * sum * sum;
            if exponent < T::from(-75.0).unwrap() {
                T::zero()
            } else {
                exponent.exp()
            }
        }
        UnitKind::Linear => sum,
    }
}

/// Derivative of the activation with respect to the input sum, expressed in
/// terms of the unit's output value (and raw sum, for the gaussian).
pub fn activation_prime<T: Float>(kind: UnitKind, value: T, sum: T, sig: SigmoidRange<T>) -> T {
    match kind {
        UnitKind::Sigmoid => T::from(0.25).unwrap() - value * value,
        UnitKind::ASigmoid => value * (T::one() - value),
        UnitKind::VarSigmoid => {
            (value - sig.min) * (T::one() - (value - sig.min)) / (sig.max - sig.min)
        }
        UnitKind::Gaussian => sum * (-value),
        UnitKind::Linear => T::one(),
    }
}

/// Derivative used for output units only. The additive offset eliminates the
/// sigmoid flat spot; hidden and candidate derivatives must not use it.
pub fn output_prime<T: Float>(kind: UnitKind, value: T, offset: T, sig: SigmoidRange<T>) -> T {
    match kind {
        UnitKind::Sigmoid => offset + T::from(0.25).unwrap() - value * value,
        UnitKind::ASigmoid => offset + value * (T::one() - value),
        UnitKind::VarSigmoid => {
            offset + (value - sig.min) * (T::one() - (value - sig.min)) / (sig.max - sig.min)
        }
        UnitKind::Linear => T::one(),
        // Gaussian outputs are rejected at network construction.
        UnitKind::Gaussian => T::one(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_saturates_at_asymptotes() {
        let sig = SigmoidRange::default();
        assert_eq!(activation(UnitKind::Sigmoid, -20.0f32, sig), -0.5);
        assert_eq!(activation(UnitKind::Sigmoid, 20.0f32, sig), 0.5);
        assert_eq!(activation(UnitKind::ASigmoid, -20.0f32, sig), 0.0);
        assert_eq!(activation(UnitKind::ASigmoid, 20.0f32, sig), 1.0);
    }

    #[test]
    fn sigmoid_is_centered() {
        let sig = SigmoidRange::default();
        assert_relative_eq!(activation(UnitKind::Sigmoid, 0.0f64, sig), 0.0);
        assert_relative_eq!(activation(UnitKind::ASigmoid, 0.0f64, sig), 0.5);
    }

    #[test]
    fn varsigmoid_respects_range() {
        let sig = SigmoidRange { min: -1.0f64, max: 3.0 };
        assert_eq!(activation(UnitKind::VarSigmoid, -20.0, sig), -1.0);
        assert_eq!(activation(UnitKind::VarSigmoid, 20.0, sig), 3.0);
        assert_relative_eq!(activation(UnitKind::VarSigmoid, 0.0, sig), 1.0);
    }

    #[test]
    fn gaussian_peaks_at_zero() {
        let sig = SigmoidRange::default();
        assert_relative_eq!(activation(UnitKind::Gaussian, 0.0f64, sig), 1.0);
        assert_eq!(activation(UnitKind::Gaussian, 100.0f64, sig), 0.0);
    }

    #[test]
    fn output_prime_offsets_all_but_linear() {
        let sig = SigmoidRange::default();
        let offset = 0.1f64;
        assert_relative_eq!(
            output_prime(UnitKind::Sigmoid, 0.0, offset, sig),
            0.35,
            max_relative = 1e-12
        );
        assert_relative_eq!(output_prime(UnitKind::Linear, 0.3, offset, sig), 1.0);
    }

    #[test]
    fn varied_pool_cycles_activations() {
        assert_eq!(CandidateKind::Varied.kind_for(0), UnitKind::Sigmoid);
        assert_eq!(CandidateKind::Varied.kind_for(1), UnitKind::ASigmoid);
        assert_eq!(CandidateKind::Varied.kind_for(2), UnitKind::VarSigmoid);
        assert_eq!(CandidateKind::Varied.kind_for(3), UnitKind::Gaussian);
        assert_eq!(CandidateKind::Varied.kind_for(4), UnitKind::Sigmoid);
        let fixed = CandidateKind::Fixed(UnitKind::Gaussian);
        assert_eq!(fixed.kind_for(7), UnitKind::Gaussian);
    }
}
