use serde::{Deserialize, Serialize};

/// Loss summary for one pass over the training windows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub batches: usize,
    /// Running mean of every batch loss in the epoch.
    pub mean_loss: f64,
    /// Loss of the final executed batch only.
    pub last_batch_loss: f64,
}

/// Held-out reconstruction loss, weighted by examples.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f64,
    pub examples: usize,
    pub batches: usize,
}

/// Accumulates batch losses into a running mean.
#[derive(Clone, Debug, Default)]
pub struct LossTracker {
    weighted_sum: f64,
    weight: usize,
    batches: usize,
    last: Option<f64>,
}

impl LossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch mean loss that was computed over `examples` rows.
    pub fn record(&mut self, loss: f64, examples: usize) {
        self.weighted_sum += loss * examples as f64;
        self.weight += examples;
        self.batches += 1;
        self.last = Some(loss);
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn mean(&self) -> Option<f64> {
        (self.weight > 0).then(|| self.weighted_sum / self.weight as f64)
    }

    pub fn epoch_metrics(&self, epoch: usize) -> EpochMetrics {
        EpochMetrics {
            epoch,
            batches: self.batches,
            mean_loss: self.mean().unwrap_or(f64::NAN),
            last_batch_loss: self.last.unwrap_or(f64::NAN),
        }
    }

    pub fn evaluation_metrics(&self) -> EvaluationMetrics {
        EvaluationMetrics {
            loss: self.mean().unwrap_or(f64::NAN),
            examples: self.weight,
            batches: self.batches,
        }
    }
}
