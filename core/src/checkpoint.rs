use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    module::Module,
    record::{BinFileRecorder, DoublePrecisionSettings, FileRecorder},
    tensor::{backend::Backend, Tensor},
};
use log::info;

use crate::{
    error::{Error, Result},
    model::{Autoencoder, INPUT_DIM, LAYER_WIDTHS},
};

/// Bumped whenever the learnable order or layout changes.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Learnables are stored at double precision so both dtypes round-trip exactly.
pub type CheckpointRecorder = BinFileRecorder<DoublePrecisionSettings>;

fn stem(dir: &Path) -> PathBuf {
    dir.join(format!("autoencoder-v{CHECKPOINT_FORMAT_VERSION}"))
}

/// Location of the checkpoint file inside `dir`.
pub fn checkpoint_path<B: Backend>(dir: &Path) -> PathBuf {
    let extension = <CheckpointRecorder as FileRecorder<B>>::file_extension();
    stem(dir).with_extension(extension)
}

/// Write w0..w3, in order, to the fixed checkpoint file under `dir`.
pub fn save<B: Backend>(model: &Autoencoder<B>, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|err| Error::persistence(dir, err))?;

    let path = checkpoint_path::<B>(dir);
    model
        .clone()
        .save_file(stem(dir), &CheckpointRecorder::new())
        .map_err(|err| Error::persistence(&path, err))?;

    info!("saved learnables to {}", path.display());
    Ok(path)
}

/// Read a checkpoint written by [`save`] and re-check the weight shapes.
pub fn load<B: Backend>(dir: &Path, device: &B::Device) -> Result<Autoencoder<B>> {
    let path = checkpoint_path::<B>(dir);
    if !path.exists() {
        return Err(Error::persistence(&path, "checkpoint file not found"));
    }

    let template = Autoencoder::from_weights(std::array::from_fn(|i| {
        Tensor::<B, 2>::zeros([LAYER_WIDTHS[i], LAYER_WIDTHS[i + 1]], device)
    }))?;
    let model = template
        .load_file(stem(dir), &CheckpointRecorder::new(), device)
        .map_err(|err| Error::persistence(&path, err))?;

    model.check_input(INPUT_DIM)?;
    Ok(model)
}
