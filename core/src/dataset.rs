use std::ops::Range;

use burn::tensor::{backend::Backend, Tensor, TensorData};

use crate::{
    config::{BatchPolicy, Split},
    error::{Error, Result},
};

/// A contiguous slice of examples and the row count the graph expects for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchWindow {
    pub index: usize,
    pub range: Range<usize>,
    pub expected_rows: usize,
}

impl BatchWindow {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Windows `[b*S, min(N, (b+1)*S))` visited in one epoch.
///
/// `DropPartial` yields exactly `N / S` full windows. `KeepPartial` appends the
/// trailing short window, if any, sized to what is left.
pub fn batch_windows(len: usize, batch_size: usize, policy: BatchPolicy) -> Vec<BatchWindow> {
    if batch_size == 0 {
        return Vec::new();
    }

    let batches = match policy {
        BatchPolicy::DropPartial => len / batch_size,
        BatchPolicy::KeepPartial => len.div_ceil(batch_size),
    };

    let mut windows = Vec::with_capacity(batches);
    for index in 0..batches {
        let start = index * batch_size;
        if start >= len {
            break;
        }
        let end = (start + batch_size).min(len);
        let expected_rows = match policy {
            BatchPolicy::DropPartial => batch_size,
            BatchPolicy::KeepPartial => end - start,
        };
        windows.push(BatchWindow {
            index,
            range: start..end,
            expected_rows,
        });
    }
    windows
}

/// In-memory `(N, width)` matrix of intensities in `[0, 1]`.
#[derive(Clone, Debug)]
pub struct Images {
    split: Split,
    width: usize,
    values: Vec<f32>,
}

impl Images {
    pub fn new(split: Split, width: usize, values: Vec<f32>) -> Result<Self> {
        if width == 0 || values.len() % width != 0 {
            return Err(Error::Configuration(format!(
                "{} values cannot be split into rows of {width}",
                values.len()
            )));
        }
        Ok(Self {
            split,
            width,
            values,
        })
    }

    /// Build from raw grayscale bytes, scaling each to `byte / 255`.
    pub fn from_bytes(split: Split, width: usize, bytes: &[u8]) -> Result<Self> {
        let values = bytes.iter().map(|&b| b as f32 / 255.0).collect();
        Self::new(split, width, values)
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index * self.width;
        self.values.get(start..start + self.width)
    }

    pub fn windows(&self, batch_size: usize, policy: BatchPolicy) -> Vec<BatchWindow> {
        batch_windows(self.len(), batch_size, policy)
    }

    /// Copy a window into a `(rows, width)` tensor on `device`.
    pub fn batch<B: Backend>(
        &self,
        window: &BatchWindow,
        device: &B::Device,
    ) -> Result<Tensor<B, 2>> {
        let (start, end) = (window.range.start, window.range.end);
        let actual = end.min(self.len()).saturating_sub(start);
        if actual != window.expected_rows || actual == 0 {
            return Err(Error::BatchReshape {
                start,
                end,
                actual,
                expected: window.expected_rows,
            });
        }

        let values = self.values[start * self.width..(start + actual) * self.width].to_vec();
        let data = TensorData::new(values, [actual, self.width]);
        Ok(Tensor::<B, 2>::from_floats(data, device))
    }
}
