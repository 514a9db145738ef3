use std::path::PathBuf;

use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use log::{debug, info, warn};

use crate::{
    config::TrainingConfig,
    dataset::{BatchWindow, Images},
    error::{Error, Result},
    loss::reconstruction_loss,
    metrics::{EpochMetrics, LossTracker},
    model::Autoencoder,
    visualization::{training_snapshot_name, ImageWriter},
};

const ADAM_BETA_1: f32 = 0.9;
const ADAM_BETA_2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-8;

/// Example rendered from each epoch's first batch.
const SNAPSHOT_EXAMPLE: usize = 0;

pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: Autoencoder<B>,
    pub epochs: Vec<EpochMetrics>,
    pub snapshots: Vec<PathBuf>,
}

impl<B: AutodiffBackend> TrainingOutcome<B> {
    pub fn last_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

/// Epoch/batch loop: bind a window, run forward and backward, take one Adam step.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    device: B::Device,
    snapshots: ImageWriter,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device, snapshots: ImageWriter) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            device,
            snapshots,
        })
    }

    pub fn fit(&self, mut model: Autoencoder<B>, dataset: &Images) -> Result<TrainingOutcome<B>> {
        model.check_input(dataset.width())?;

        let windows = dataset.windows(self.config.batch_size, self.config.batch_policy);
        info!(
            "training on {} {} examples: {} batches of {} per epoch",
            dataset.len(),
            dataset.split(),
            windows.len(),
            self.config.batch_size
        );
        if windows.is_empty() {
            warn!(
                "dataset of {} examples yields no batches of {}; weights will not change",
                dataset.len(),
                self.config.batch_size
            );
        }

        let mut optimizer = AdamConfig::new()
            .with_beta_1(ADAM_BETA_1)
            .with_beta_2(ADAM_BETA_2)
            .with_epsilon(ADAM_EPSILON)
            .init::<B, Autoencoder<B>>();

        let mut epochs = Vec::with_capacity(self.config.epochs);
        let mut snapshots = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            let mut tracker = LossTracker::new();

            for window in &windows {
                let batch = dataset.batch::<B>(window, &self.device)?;
                let rows = window.len();

                let (next, loss, reconstruction) =
                    self.step(model, &mut optimizer, batch, window, epoch)?;
                model = next;
                tracker.record(loss, rows);
                debug!("epoch {epoch} batch {}: loss {loss:.6}", window.index);

                if window.index == 0 {
                    snapshots.push(self.write_snapshot(reconstruction, window, epoch)?);
                }
            }

            let metrics = tracker.epoch_metrics(epoch);
            info!(
                "Epoch {} | cost {:.6} | last batch cost {:.6} | {} batches",
                metrics.epoch, metrics.mean_loss, metrics.last_batch_loss, metrics.batches
            );
            epochs.push(metrics);
        }

        Ok(TrainingOutcome {
            model,
            epochs,
            snapshots,
        })
    }

    /// One forward + backward pass and one optimizer step.
    ///
    /// Returns the updated model, the unscaled batch loss and the reconstruction
    /// computed before the update.
    fn step<O>(
        &self,
        model: Autoencoder<B>,
        optimizer: &mut O,
        batch: Tensor<B, 2>,
        window: &BatchWindow,
        epoch: usize,
    ) -> Result<(Autoencoder<B>, f64, Tensor<B, 2>)>
    where
        O: Optimizer<Autoencoder<B>, B>,
    {
        let reconstruction = model.forward(batch.clone());
        let loss = reconstruction_loss(reconstruction.clone(), batch);
        let loss_value = loss.clone().into_scalar().elem::<f64>();
        if !loss_value.is_finite() {
            return Err(Error::Execution(format!(
                "non-finite loss {loss_value} at epoch {epoch}, batch {}",
                window.index
            )));
        }

        // Gradients are averaged over the configured batch size on top of the mean loss.
        let scaled = loss.div_scalar(self.config.batch_size as f64);
        let grads = GradientsParams::from_grads(scaled.backward(), &model);
        let model = optimizer.step(self.config.learning_rate, model, grads);

        Ok((model, loss_value, reconstruction))
    }

    fn write_snapshot(
        &self,
        reconstruction: Tensor<B, 2>,
        window: &BatchWindow,
        epoch: usize,
    ) -> Result<PathBuf> {
        let width = reconstruction.dims()[1];
        let row = reconstruction
            .slice([SNAPSHOT_EXAMPLE..SNAPSHOT_EXAMPLE + 1, 0..width])
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|err| Error::Execution(format!("failed to read reconstruction: {err:?}")))?;

        let name = training_snapshot_name(SNAPSHOT_EXAMPLE, window.index, epoch);
        self.snapshots.write(&name, &row)
    }
}
