use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use bottleneck_core::{
    checkpoint,
    config::{DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, DEFAULT_SEED},
    load_or_init, seeded_rng, Autoencoder, BatchPolicy, Dtype, EpochMetrics, EvaluationMetrics,
    Evaluator, ImageWriter, Images, PixelMapping, Split, Trainer, TrainingConfig, INPUT_DIM,
};
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use burn_autodiff::Autodiff;
use burn_candle::Candle;
use burn_dataset::{vision::MnistDataset, Dataset};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

/// Train a 784-128-64-128-784 sigmoid autoencoder on MNIST and render its reconstructions.
#[derive(Parser, Debug)]
#[command(name = "mnist-autoencoder", version)]
struct Args {
    /// Number of epochs to train for
    #[arg(long, default_value_t = DEFAULT_EPOCHS)]
    epochs: usize,

    /// Which dataset to train on: "train" or "test"
    #[arg(long, default_value = "train")]
    dataset: Split,

    /// Which dtype to use: "float64" or "float32"
    #[arg(long, default_value = "float64")]
    dtype: Dtype,

    /// Batch size
    #[arg(long, alias = "batchsize", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = DEFAULT_LEARNING_RATE)]
    learning_rate: f64,

    /// Weight initialization seed; overrides the one stored in config.json
    #[arg(long)]
    seed: Option<u64>,

    /// Also train on the trailing window when the batch size does not divide the dataset
    #[arg(long)]
    keep_partial: bool,

    /// Render pixels with the wrap-around mapping of earlier releases
    #[arg(long)]
    legacy_pixels: bool,

    /// Root directory for every artifact of the run
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Stop after saving the checkpoint
    #[arg(long)]
    skip_eval: bool,
}

#[derive(Serialize, Deserialize)]
struct ExperimentConfig {
    seed: u64,
}

#[derive(Serialize)]
struct RunSummary {
    config: TrainingConfig,
    dataset: Split,
    epochs: Vec<EpochMetrics>,
    checkpoint: PathBuf,
    evaluation: Option<EvaluationMetrics>,
}

struct ExperimentPaths {
    config: PathBuf,
    graph: PathBuf,
    training: PathBuf,
    images: PathBuf,
    backup: PathBuf,
    summary: PathBuf,
}

type Float64Backend = Autodiff<Candle<f64, i64>>;
type Float32Backend = Autodiff<Candle<f32, i64>>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let paths = initialize_paths(&args.out_dir)?;
    let experiment: ExperimentConfig =
        load_or_init(&paths.config, || ExperimentConfig { seed: DEFAULT_SEED })?;

    let config = TrainingConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        dtype: args.dtype,
        seed: args.seed.unwrap_or(experiment.seed),
        batch_policy: if args.keep_partial {
            BatchPolicy::KeepPartial
        } else {
            BatchPolicy::DropPartial
        },
        pixel_mapping: if args.legacy_pixels {
            PixelMapping::Legacy
        } else {
            PixelMapping::Standard
        },
    };
    config.validate()?;

    info!(
        "running MNIST autoencoder: {} epochs, batch size {}, dtype {}, seed {}",
        config.epochs, config.batch_size, config.dtype, config.seed
    );

    let summary = match config.dtype {
        Dtype::Float64 => run::<Float64Backend>(&args, config, &paths)?,
        Dtype::Float32 => run::<Float32Backend>(&args, config, &paths)?,
    };

    save_summary(&paths.summary, &summary)?;
    info!("wrote run summary to {}", paths.summary.display());
    Ok(())
}

fn initialize_paths(root: &Path) -> Result<ExperimentPaths> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed to create output directory {}", root.display()))?;

    Ok(ExperimentPaths {
        config: root.join("config.json"),
        graph: root.join("graph.txt"),
        training: root.join("training"),
        images: root.join("images"),
        backup: root.join("backup"),
        summary: root.join("summary.json"),
    })
}

fn run<B: AutodiffBackend>(
    args: &Args,
    config: TrainingConfig,
    paths: &ExperimentPaths,
) -> Result<RunSummary> {
    let device: B::Device = Default::default();
    let model = Autoencoder::<B>::init(&device, &mut seeded_rng(config.seed));
    model.check_input(INPUT_DIM)?;

    fs::write(&paths.graph, model.describe(config.batch_size))
        .with_context(|| format!("failed to write {}", paths.graph.display()))?;

    let train = load_split(args.dataset)?;
    let snapshots = ImageWriter::new(&paths.training, config.pixel_mapping)?;
    let trainer = Trainer::<B>::new(config.clone(), device.clone(), snapshots)?;
    let outcome = trainer
        .fit(model, &train)
        .with_context(|| format!("training on the {} split failed", args.dataset))?;

    let checkpoint = checkpoint::save(&outcome.model, &paths.backup)
        .context("failed to write the checkpoint")?;

    let evaluation = if args.skip_eval {
        None
    } else {
        info!("Run Tests");
        let test = load_split(Split::Test)?;
        let writer = ImageWriter::new(&paths.images, config.pixel_mapping)?;
        let evaluator = Evaluator::<B::InnerBackend>::new(
            config.batch_size,
            config.batch_policy,
            device,
            writer,
        )?;
        let result = evaluator
            .evaluate(&outcome.model.valid(), &test)
            .context("evaluation on the test split failed")?;
        Some(result.metrics)
    };

    if let Some(last) = outcome.last_epoch() {
        info!(
            "final train cost {:.6} (last batch {:.6})",
            last.mean_loss, last.last_batch_loss
        );
    }

    Ok(RunSummary {
        config,
        dataset: args.dataset,
        epochs: outcome.epochs,
        checkpoint,
        evaluation,
    })
}

fn load_split(split: Split) -> Result<Images> {
    info!("loading MNIST {split} split");
    let dataset = match split {
        Split::Train => MnistDataset::train(),
        Split::Test => MnistDataset::test(),
    };

    // Items carry raw 0..=255 intensities stored as floats.
    let mut bytes = Vec::with_capacity(dataset.len() * INPUT_DIM);
    for item in dataset.iter() {
        for row in item.image.iter() {
            bytes.extend(row.iter().map(|&pixel| pixel as u8));
        }
    }

    let images = Images::from_bytes(split, INPUT_DIM, &bytes)?;
    info!("loaded {} examples", images.len());
    Ok(images)
}

fn save_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let serialized = serde_json::to_string_pretty(summary)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write summary to {}", path.display()))?;
    Ok(())
}
