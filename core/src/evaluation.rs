use std::path::PathBuf;

use burn::tensor::{backend::Backend, ElementConversion, Tensor};
use log::{debug, info};

use crate::{
    config::BatchPolicy,
    dataset::Images,
    error::{Error, Result},
    loss::reconstruction_loss,
    metrics::{EvaluationMetrics, LossTracker},
    model::Autoencoder,
    visualization::{evaluation_input_name, evaluation_output_name, ImageWriter},
};

pub struct EvaluationOutcome {
    pub metrics: EvaluationMetrics,
    pub images: Vec<PathBuf>,
}

/// Forward-only pass over a held-out split that renders every input/output pair.
pub struct Evaluator<B: Backend> {
    batch_size: usize,
    batch_policy: BatchPolicy,
    device: B::Device,
    writer: ImageWriter,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(
        batch_size: usize,
        batch_policy: BatchPolicy,
        device: B::Device,
        writer: ImageWriter,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be positive".into()));
        }
        Ok(Self {
            batch_size,
            batch_policy,
            device,
            writer,
        })
    }

    pub fn evaluate(&self, model: &Autoencoder<B>, dataset: &Images) -> Result<EvaluationOutcome> {
        model.check_input(dataset.width())?;

        let windows = dataset.windows(self.batch_size, self.batch_policy);
        let mut tracker = LossTracker::new();
        let mut images = Vec::with_capacity(2 * windows.len() * self.batch_size);

        for window in &windows {
            let batch = dataset.batch::<B>(window, &self.device)?;
            let reconstruction = model.forward(batch.clone());
            let loss = reconstruction_loss(reconstruction.clone(), batch)
                .into_scalar()
                .elem::<f64>();
            tracker.record(loss, window.len());
            debug!("test batch {}: loss {loss:.6}", window.index);

            for (example, offset) in window.range.clone().enumerate() {
                let input: Vec<f64> = dataset
                    .row(offset)
                    .ok_or_else(|| {
                        Error::Execution(format!("example {offset} missing from dataset"))
                    })?
                    .iter()
                    .map(|&px| f64::from(px))
                    .collect();
                images.push(
                    self.writer
                        .write(&evaluation_input_name(window.index, example), &input)?,
                );
            }

            let outputs = rows(reconstruction)?;
            for (example, output) in outputs.chunks(dataset.width()).enumerate() {
                images.push(
                    self.writer
                        .write(&evaluation_output_name(window.index, example), output)?,
                );
            }
        }

        let metrics = tracker.evaluation_metrics();
        info!(
            "Epoch Test | cost {:.6} over {} examples in {} batches",
            metrics.loss, metrics.examples, metrics.batches
        );
        Ok(EvaluationOutcome { metrics, images })
    }
}

fn rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|err| Error::Execution(format!("failed to read reconstruction: {err:?}")))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use burn_candle::Candle;

    use super::*;
    use crate::{config::Split, model::INPUT_DIM, rng::seeded_rng, visualization::PixelMapping};

    type TestBackend = Candle<f32, i64>;
    type DoubleBackend = Candle<f64, i64>;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bottleneck-evaluation-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn evaluator<B: Backend>(dir: &Path, batch_size: usize) -> Evaluator<B> {
        let writer = ImageWriter::new(dir, PixelMapping::Standard).unwrap();
        Evaluator::new(batch_size, BatchPolicy::DropPartial, Default::default(), writer).unwrap()
    }

    fn two_example_batch_writes_paired_images<B: Backend>(name: &str) {
        let dir = scratch_dir(name);
        let device = Default::default();
        let model = Autoencoder::<B>::init(&device, &mut seeded_rng(9));
        let mut values = vec![0.0; INPUT_DIM];
        values.extend(vec![1.0; INPUT_DIM]);
        let test = Images::new(Split::Test, INPUT_DIM, values).unwrap();

        let outcome = evaluator::<B>(&dir, 2).evaluate(&model, &test).unwrap();

        let mut names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "0 - 0 input.jpg",
                "0 - 0 output.jpg",
                "0 - 1 input.jpg",
                "0 - 1 output.jpg",
            ]
        );
        assert_eq!(outcome.images.len(), 4);
        assert_eq!(outcome.metrics.examples, 2);
        assert!(outcome.metrics.loss > 0.0 && outcome.metrics.loss < 1.0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn single_precision_batch_writes_paired_images() {
        two_example_batch_writes_paired_images::<TestBackend>("pairs-f32");
    }

    #[test]
    fn double_precision_batch_writes_paired_images() {
        two_example_batch_writes_paired_images::<DoubleBackend>("pairs-f64");
    }

    #[test]
    fn loss_is_the_example_weighted_test_mean() {
        let dir = scratch_dir("mean");
        let device = Default::default();
        let model = Autoencoder::<TestBackend>::init(&device, &mut seeded_rng(10));
        let test = Images::new(Split::Test, INPUT_DIM, vec![0.25; 3 * INPUT_DIM]).unwrap();

        let outcome = evaluator::<TestBackend>(&dir, 1).evaluate(&model, &test).unwrap();

        let input = Tensor::<TestBackend, 2>::full([3, INPUT_DIM], 0.25, &device);
        let expected = reconstruction_loss(model.forward(input.clone()), input)
            .into_scalar()
            .elem::<f64>();
        assert_eq!(outcome.metrics.batches, 3);
        assert!((outcome.metrics.loss - expected).abs() < 1e-5);

        fs::remove_dir_all(&dir).unwrap();
    }
}
