use burn::tensor::{backend::Backend, Tensor};

/// Mean over all elements of `(target - reconstruction)^2`.
///
/// The autoencoder target is its own input batch.
pub fn reconstruction_loss<B: Backend>(
    reconstruction: Tensor<B, 2>,
    target: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (target - reconstruction).powf_scalar(2.0).mean()
}

#[cfg(test)]
mod tests {
    use burn::tensor::ElementConversion;
    use burn_candle::Candle;

    use super::*;

    type TestBackend = Candle<f32, i64>;

    #[test]
    fn averages_squared_error_over_every_element() {
        let device = Default::default();
        let target = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);
        let recon = Tensor::<TestBackend, 2>::from_floats([[0.5, 0.0], [0.0, 0.0]], &device);

        let loss = reconstruction_loss(recon, target).into_scalar().elem::<f32>();
        assert!((loss - (0.25 + 1.0) / 4.0).abs() < 1e-6);
    }

    #[test]
    fn perfect_reconstruction_costs_nothing() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats([[0.2, 0.8, 0.4]], &device);
        let loss = reconstruction_loss(x.clone(), x).into_scalar().elem::<f32>();
        assert_eq!(loss, 0.0);
    }
}
