use std::fmt::Write;

use burn::{
    module::{Module, Param},
    tensor::{activation::sigmoid, backend::Backend, Tensor, TensorData},
};
use rand::rngs::StdRng;

use crate::{
    error::{Error, Result},
    rng::glorot_uniform,
};

/// Flattened 28x28 digit.
pub const INPUT_DIM: usize = 28 * 28;

/// Layer widths from input through the bottleneck back to the reconstruction.
pub const LAYER_WIDTHS: [usize; 5] = [INPUT_DIM, 128, 64, 128, INPUT_DIM];

/// Learnable names, in checkpoint order.
pub const LEARNABLE_NAMES: [&str; 4] = ["w0", "w1", "w2", "w3"];

const GLOROT_GAIN: f64 = 1.0;

/// Four bias-free sigmoid layers: 784 -> 128 -> 64 -> 128 -> 784.
///
/// Field order is the checkpoint contract. Reordering the weights requires a bump of
/// [`crate::checkpoint::CHECKPOINT_FORMAT_VERSION`].
#[derive(Module, Debug)]
pub struct Autoencoder<B: Backend> {
    w0: Param<Tensor<B, 2>>,
    w1: Param<Tensor<B, 2>>,
    w2: Param<Tensor<B, 2>>,
    w3: Param<Tensor<B, 2>>,
}

impl<B: Backend> Autoencoder<B> {
    /// Glorot-uniform initialization drawn from `rng`.
    pub fn init(device: &B::Device, rng: &mut StdRng) -> Self {
        Self::assemble(std::array::from_fn(|i| {
            let (fan_in, fan_out) = (LAYER_WIDTHS[i], LAYER_WIDTHS[i + 1]);
            let values = glorot_uniform(rng, fan_in, fan_out, GLOROT_GAIN);
            Tensor::<B, 2>::from_data(TensorData::new(values, [fan_in, fan_out]), device)
        }))
    }

    /// Build from explicit weights, checking that the multiply chain lines up.
    pub fn from_weights(weights: [Tensor<B, 2>; 4]) -> Result<Self> {
        let shapes = weights.each_ref().map(|w| w.dims());
        check_chain(&shapes)?;
        Ok(Self::assemble(weights))
    }

    fn assemble([w0, w1, w2, w3]: [Tensor<B, 2>; 4]) -> Self {
        Self {
            w0: Param::from_tensor(w0),
            w1: Param::from_tensor(w1),
            w2: Param::from_tensor(w2),
            w3: Param::from_tensor(w3),
        }
    }

    /// Current weight values in learnable order.
    pub fn learnables(&self) -> [Tensor<B, 2>; 4] {
        [self.w0.val(), self.w1.val(), self.w2.val(), self.w3.val()]
    }

    pub fn learnable_shapes(&self) -> [[usize; 2]; 4] {
        self.learnables().map(|w| w.dims())
    }

    /// Fail before any batch runs if an input of `width` columns cannot flow through.
    pub fn check_input(&self, width: usize) -> Result<()> {
        let shapes = self.learnable_shapes();
        check_chain(&shapes)?;
        if shapes[0][0] != width {
            return Err(Error::GraphConstruction(format!(
                "unable to multiply input (?, {width}) and w0 {:?}",
                shapes[0]
            )));
        }
        Ok(())
    }

    /// `l0 = x`, `l(i+1) = sigmoid(l(i) x w(i))`, returning `l4`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.learnables()
            .into_iter()
            .fold(input, |layer, weight| sigmoid(layer.matmul(weight)))
    }

    /// Text rendering of the computation graph for diagnostics.
    pub fn describe(&self, batch_size: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "x: ({batch_size}, {})", LAYER_WIDTHS[0]);
        let mut input = "x".to_string();
        for (i, (name, shape)) in LEARNABLE_NAMES
            .iter()
            .zip(self.learnable_shapes())
            .enumerate()
        {
            let _ = writeln!(out, "{name}: {:?} learnable", shape);
            let _ = writeln!(
                out,
                "l{} = sigmoid({input} x {name}): ({batch_size}, {})",
                i + 1,
                shape[1]
            );
            input = format!("l{}", i + 1);
        }
        let _ = writeln!(out, "cost = mean((x - {input})^2): scalar");
        out
    }
}

fn check_chain(shapes: &[[usize; 2]; 4]) -> Result<()> {
    for (i, pair) in shapes.windows(2).enumerate() {
        if pair[0][1] != pair[1][0] {
            return Err(Error::GraphConstruction(format!(
                "unable to multiply l{} and {}: {:?} x {:?}",
                i + 1,
                LEARNABLE_NAMES[i + 1],
                pair[0],
                pair[1]
            )));
        }
    }
    if shapes[3][1] != shapes[0][0] {
        return Err(Error::GraphConstruction(format!(
            "reconstruction width {} does not match input width {}",
            shapes[3][1], shapes[0][0]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use burn::tensor::ElementConversion;
    use burn_candle::Candle;

    use super::*;
    use crate::rng::{glorot_limit, seeded_rng};

    type TestBackend = Candle<f32, i64>;

    #[test]
    fn weights_have_the_bottleneck_shapes() {
        let device = Default::default();
        let model = Autoencoder::<TestBackend>::init(&device, &mut seeded_rng(1));
        assert_eq!(
            model.learnable_shapes(),
            [[784, 128], [128, 64], [64, 128], [128, 784]]
        );
        assert!(model.check_input(INPUT_DIM).is_ok());
    }

    #[test]
    fn init_respects_the_glorot_bound() {
        let device = Default::default();
        let model = Autoencoder::<TestBackend>::init(&device, &mut seeded_rng(2));
        for (weight, pair) in model.learnables().into_iter().zip(LAYER_WIDTHS.windows(2)) {
            let limit = glorot_limit(pair[0], pair[1], 1.0) as f32;
            let max = weight.abs().max().into_scalar().elem::<f32>();
            assert!(max <= limit + 1e-6, "max {max} above limit {limit}");
        }
    }

    #[test]
    fn reconstruction_keeps_batch_shape_inside_open_unit_interval() {
        let device = Default::default();
        let model = Autoencoder::<TestBackend>::init(&device, &mut seeded_rng(3));

        for batch in [1, 3, 16] {
            let input = Tensor::<TestBackend, 2>::random(
                [batch, INPUT_DIM],
                burn::tensor::Distribution::Uniform(0.0, 1.0),
                &device,
            );
            let output = model.forward(input);
            assert_eq!(output.dims(), [batch, INPUT_DIM]);

            let min = output.clone().min().into_scalar().elem::<f32>();
            let max = output.max().into_scalar().elem::<f32>();
            assert!(min > 0.0 && max < 1.0, "range [{min}, {max}]");
        }
    }

    #[test]
    fn mismatched_weights_fail_at_construction() {
        let device = Default::default();
        let zeros = |rows, cols| Tensor::<TestBackend, 2>::zeros([rows, cols], &device);

        let err = Autoencoder::from_weights([
            zeros(784, 128),
            zeros(100, 64),
            zeros(64, 128),
            zeros(128, 784),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::GraphConstruction(_)));

        let model = Autoencoder::from_weights([
            zeros(784, 128),
            zeros(128, 64),
            zeros(64, 128),
            zeros(128, 784),
        ])
        .unwrap();
        assert!(matches!(
            model.check_input(100),
            Err(Error::GraphConstruction(_))
        ));
    }

    #[test]
    fn describe_lists_every_learnable() {
        let device = Default::default();
        let model = Autoencoder::<TestBackend>::init(&device, &mut seeded_rng(4));
        let text = model.describe(100);
        for name in LEARNABLE_NAMES {
            assert!(text.contains(&format!("{name}: ")));
        }
        assert!(text.contains("l4 = sigmoid(l3 x w3): (100, 784)"));
    }
}
