//! Cascade-Correlation and Cascade-2 training for dynamically growing
//! neural networks.
//!
//! Networks start with no hidden units and grow one unit at a time: a pool
//! of candidate units is trained in isolation against the frozen network's
//! residual error, the best candidate is installed with its input weights
//! frozen forever, and only the output weights remain trainable. All weight
//! updates use the quickprop rule. An activation cache keeps epoch cost
//! proportional to the trainable weights rather than the whole network.
//!
//! # Key features
//!
//! - Cascade-Correlation and Cascade-2 candidate training, both with
//!   recurrent self-connections
//! - Quickprop second-order weight updates for every weight group
//! - Per-point activation/error caching, extended incrementally as units
//!   are installed, with graceful degradation on allocation failure
//! - Bit-error and normalized-error-index win criteria
//! - Cross-validation early stopping with checkpoint restore
//! - Cooperative pause/abort checked at epoch boundaries
//!
//! # Quick start
//!
//! ```rust,no_run
//! use zen_cascade::{
//!     CascadeNetwork, CascadeTrainer, DataPoint, DataSet, SigmoidRange,
//!     TrainingParams, TrainingSets,
//! };
//!
//! # fn main() -> Result<(), zen_cascade::CascadeError> {
//! let params: TrainingParams<f32> = TrainingParams::builder()
//!     .max_new_units(5)
//!     .random_seed(42)
//!     .build();
//!
//! let data = TrainingSets::new(DataSet::new(vec![
//!     DataPoint::new(vec![-0.5, -0.5], vec![-0.5]),
//!     DataPoint::new(vec![-0.5, 0.5], vec![0.5]),
//!     DataPoint::new(vec![0.5, -0.5], vec![0.5]),
//!     DataPoint::new(vec![0.5, 0.5], vec![-0.5]),
//! ]));
//!
//! let mut rng = rand::thread_rng();
//! let mut net = CascadeNetwork::new(
//!     2, 1, 5, 1.0, SigmoidRange::default(), false, &mut rng,
//! )?;
//!
//! let mut trainer = CascadeTrainer::new(&mut net, &params, &data)?;
//! let result = trainer.train(0)?;
//! println!("{}: {} hidden units", result.end_status, result.n_units - 3);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod cache;
pub mod config;
pub mod control;
pub mod data;
pub mod errors;
pub mod network;
pub mod quickprop;
pub mod trainer;

pub use activation::{
    activation, activation_prime, output_prime, CandidateKind, SigmoidRange, UnitKind,
};
pub use cache::ActivationCache;
pub use config::{Algorithm, CycleParams, ErrorMeasure, TrainingParams, TrainingParamsBuilder};
pub use control::TrainControl;
pub use data::{DataPoint, DataSet, TrainingSets};
pub use errors::CascadeError;
pub use network::CascadeNetwork;
pub use quickprop::{quickprop, UpdateParams};
pub use trainer::{evaluate, CascadeTrainer, PauseHook, TrainStatus, TrialResult};
