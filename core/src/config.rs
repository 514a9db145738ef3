use std::{fmt, fs, path::Path, str::FromStr};

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    visualization::PixelMapping,
};

pub const DEFAULT_EPOCHS: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_SEED: u64 = 1337;

/// Floating point precision of the weights and activations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    #[default]
    Float64,
    Float32,
}

impl Dtype {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Float64 => "float64",
            Self::Float32 => "float32",
        }
    }
}

impl FromStr for Dtype {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "float64" => Ok(Self::Float64),
            "float32" => Ok(Self::Float32),
            other => Err(Error::Configuration(format!("unknown dtype: {other}"))),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which MNIST split a dataset was loaded from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    Test,
}

impl Split {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "train" => Ok(Self::Train),
            "test" => Ok(Self::Test),
            other => Err(Error::Configuration(format!(
                "unknown dataset split: {other} (expected \"train\" or \"test\")"
            ))),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do with the trailing window when the batch size does not divide the dataset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPolicy {
    /// Visit only the `N / S` full windows.
    #[default]
    DropPartial,
    /// Also run the trailing short window at its own size.
    KeepPartial,
}

/// Immutable settings handed to the trainer and evaluator at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub dtype: Dtype,
    pub seed: u64,
    pub batch_policy: BatchPolicy,
    pub pixel_mapping: PixelMapping,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            dtype: Dtype::default(),
            seed: DEFAULT_SEED,
            batch_policy: BatchPolicy::default(),
            pixel_mapping: PixelMapping::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Configuration(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Load a JSON configuration from disk, creating it with the provided initializer if missing.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> anyhow::Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        Ok(value)
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let value = initializer();
        let serialized = serde_json::to_string_pretty(&value)?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dtype_is_a_configuration_error() {
        assert_eq!("float32".parse::<Dtype>().unwrap(), Dtype::Float32);
        assert_eq!("float64".parse::<Dtype>().unwrap(), Dtype::Float64);

        let err = "float16".parse::<Dtype>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("float16"));
    }

    #[test]
    fn split_parses_both_names() {
        assert_eq!("train".parse::<Split>().unwrap(), Split::Train);
        assert_eq!("test".parse::<Split>().unwrap(), Split::Test);
        assert!("valid".parse::<Split>().is_err());
    }

    #[test]
    fn defaults_match_documented_flags() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.dtype, Dtype::Float64);
        assert_eq!(config.batch_policy, BatchPolicy::DropPartial);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = TrainingConfig {
            batch_size: 0,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn load_or_init_writes_then_reads_back() {
        let dir = std::env::temp_dir().join(format!("bottleneck-config-{}", std::process::id()));
        let path = dir.join("nested/config.json");
        let _ = fs::remove_dir_all(&dir);

        let written: TrainingConfig = load_or_init(&path, || TrainingConfig {
            seed: 7,
            ..TrainingConfig::default()
        })
        .unwrap();
        assert!(path.exists());

        let read: TrainingConfig = load_or_init(&path, TrainingConfig::default).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.seed, 7);

        fs::remove_dir_all(&dir).unwrap();
    }
}
