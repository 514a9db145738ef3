pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod rng;
pub mod trainer;
pub mod visualization;

pub use config::{load_or_init, BatchPolicy, Dtype, Split, TrainingConfig};
pub use dataset::{batch_windows, BatchWindow, Images};
pub use error::{Error, Result};
pub use evaluation::{EvaluationOutcome, Evaluator};
pub use metrics::{EpochMetrics, EvaluationMetrics, LossTracker};
pub use model::{Autoencoder, INPUT_DIM};
pub use rng::seeded_rng;
pub use trainer::{Trainer, TrainingOutcome};
pub use visualization::{ImageWriter, PixelMapping};
