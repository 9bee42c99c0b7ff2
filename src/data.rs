//! In-memory training data consumed by the cascade trainer.
//!
//! Parsing data files into these structures is the job of an external
//! collaborator; the trainer only sees ordered points of input/output float
//! vectors with sequence-reset flags, plus the precomputed output standard
//! deviation used by the error-index win criterion.

use num_traits::Float;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One training vector. `reset` marks the start of a new sequence for
/// recurrent networks; the recurrent self-connection is suppressed there.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint<T: Float> {
    pub inputs: Vec<T>,
    pub outputs: Vec<T>,
    pub reset: bool,
}

impl<T: Float> DataPoint<T> {
    pub fn new(inputs: Vec<T>, outputs: Vec<T>) -> Self {
        Self {
            inputs,
            outputs,
            reset: false,
        }
    }

    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }
}

/// An ordered sequence of data points with its output standard deviation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet<T: Float> {
    points: Vec<DataPoint<T>>,
    std_dev: T,
    predict_only: bool,
}

impl<T: Float> DataSet<T> {
    /// Build a data set, computing the standard deviation of its outputs.
    pub fn new(points: Vec<DataPoint<T>>) -> Self {
        let std_dev = output_std_dev(&points);
        Self {
            points,
            std_dev,
            predict_only: false,
        }
    }

    /// Build a prediction-only set. The points carry no goal vectors and the
    /// set cannot be used for training or testing.
    pub fn predict_only(points: Vec<DataPoint<T>>) -> Self {
        Self {
            points,
            std_dev: T::zero(),
            predict_only: true,
        }
    }

    pub fn points(&self) -> &[DataPoint<T>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn std_dev(&self) -> T {
        self.std_dev
    }

    pub fn is_predict_only(&self) -> bool {
        self.predict_only
    }
}

/// The data sets for one training run. A missing test set falls back to the
/// training set; a missing validation set disables cross-validation with a
/// warning rather than aborting.
#[derive(Debug, Clone)]
pub struct TrainingSets<T: Float> {
    pub train: DataSet<T>,
    pub validation: Option<DataSet<T>>,
    pub test: Option<DataSet<T>>,
}

impl<T: Float> TrainingSets<T> {
    pub fn new(train: DataSet<T>) -> Self {
        Self {
            train,
            validation: None,
            test: None,
        }
    }

    pub fn with_validation(mut self, set: DataSet<T>) -> Self {
        self.validation = Some(set);
        self
    }

    pub fn with_test(mut self, set: DataSet<T>) -> Self {
        self.test = Some(set);
        self
    }
}

/// Standard deviation over all output values,
/// `sqrt((N * sum(x^2) - sum(x)^2) / (N * (N - 1)))` with N the point count.
fn output_std_dev<T: Float>(points: &[DataPoint<T>]) -> T {
    if points.len() < 2 {
        return T::zero();
    }

    let mut sum = T::zero();
    let mut sum_sq = T::zero();
    for point in points {
        for &out in &point.outputs {
            sum = sum + out;
            sum_sq = sum_sq + out * out;
        }
    }

    let n = T::from(points.len()).unwrap();
    ((n * sum_sq - sum * sum) / (n * (n - T::one()))).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn std_dev_of_symmetric_binary_outputs() {
        let points = vec![
            DataPoint::new(vec![0.0f64], vec![-0.5]),
            DataPoint::new(vec![1.0], vec![0.5]),
            DataPoint::new(vec![2.0], vec![-0.5]),
            DataPoint::new(vec![3.0], vec![0.5]),
        ];
        let set = DataSet::new(points);
        // sum = 0, sum_sq = 1, N = 4 -> sqrt(4 / 12)
        assert_relative_eq!(set.std_dev(), (4.0f64 / 12.0).sqrt());
    }

    #[test]
    fn predict_only_has_zero_std_dev() {
        let set = DataSet::predict_only(vec![DataPoint::new(vec![1.0f32], vec![])]);
        assert!(set.is_predict_only());
        assert_eq!(set.std_dev(), 0.0);
    }

    #[test]
    fn reset_flag_round_trips() {
        let point = DataPoint::new(vec![1.0f32], vec![0.5]).with_reset();
        assert!(point.reset);
    }
}
