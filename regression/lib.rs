#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod center;
pub mod data;
pub mod estimate;
pub mod factorization;
pub mod model;
pub mod posterior;
pub mod predict;
pub mod seeding;
pub mod types;

pub use estimate::{ConvergenceStatus, EstimationError, EvidenceMethod};
pub use model::{BayesianRegression, FitConfig, FitResult};
pub use predict::Prediction;
pub use types::{Coefficients, Hyperparameters};
