// ============================================================
// Layer 5 — Normalisation Strategies
// ============================================================
// Instance normalisation: every (sample, channel) plane is
// shifted to zero mean and scaled to unit variance, then an
// affine transform is applied.
//
//   InstanceNorm2d          — one learned scale/shift per channel
//   ConditionalInstanceNorm — one learned scale/shift row per
//                             style, gathered by style id
//
// The decoder holds a DecoderNorm, chosen once when the model is
// built; both variants implement StyleNorm.

use burn::prelude::*;
use burn::module::Param;

const EPSILON: f64 = 1e-5;

/// A normalisation step that may depend on the style being drawn.
pub trait StyleNorm<B: Backend> {
    fn normalize(&self, x: Tensor<B, 4>, style_ids: Tensor<B, 1, Int>) -> Tensor<B, 4>;
}

/// Zero-mean, unit-variance per (sample, channel) plane.
pub fn instance_standardize<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, c, h, w] = x.dims();
    let flat     = x.reshape([n, c, h * w]);
    let mean     = flat.clone().mean_dim(2);
    let centered = flat - mean;
    let var      = centered.clone().powf_scalar(2.0).mean_dim(2);
    (centered / (var + EPSILON).sqrt()).reshape([n, c, h, w])
}

// ─── InstanceNorm2d ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct InstanceNorm2d<B: Backend> {
    pub gamma: Param<Tensor<B, 1>>,
    pub beta:  Param<Tensor<B, 1>>,
}

impl<B: Backend> InstanceNorm2d<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta:  Param::from_tensor(Tensor::zeros([channels], device)),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let c     = x.dims()[1];
        let gamma = self.gamma.val().reshape([1, c, 1, 1]);
        let beta  = self.beta.val().reshape([1, c, 1, 1]);
        instance_standardize(x) * gamma + beta
    }
}

impl<B: Backend> StyleNorm<B> for InstanceNorm2d<B> {
    fn normalize(&self, x: Tensor<B, 4>, _style_ids: Tensor<B, 1, Int>) -> Tensor<B, 4> {
        self.forward(x)
    }
}

// ─── ConditionalInstanceNorm ──────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConditionalInstanceNorm<B: Backend> {
    /// shape: [styles, channels]
    pub gamma: Param<Tensor<B, 2>>,
    /// shape: [styles, channels]
    pub beta:  Param<Tensor<B, 2>>,
}

impl<B: Backend> ConditionalInstanceNorm<B> {
    pub fn new(styles: usize, channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([styles, channels], device)),
            beta:  Param::from_tensor(Tensor::zeros([styles, channels], device)),
        }
    }
}

impl<B: Backend> StyleNorm<B> for ConditionalInstanceNorm<B> {
    fn normalize(&self, x: Tensor<B, 4>, style_ids: Tensor<B, 1, Int>) -> Tensor<B, 4> {
        let [n, c, _, _] = x.dims();
        let gamma = self.gamma.val().select(0, style_ids.clone()).reshape([n, c, 1, 1]);
        let beta  = self.beta.val().select(0, style_ids).reshape([n, c, 1, 1]);
        instance_standardize(x) * gamma + beta
    }
}

// ─── DecoderNorm ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub enum DecoderNorm<B: Backend> {
    Plain(InstanceNorm2d<B>),
    Conditional(ConditionalInstanceNorm<B>),
}

impl<B: Backend> DecoderNorm<B> {
    pub fn new(conditional: bool, styles: usize, channels: usize, device: &B::Device) -> Self {
        if conditional {
            Self::Conditional(ConditionalInstanceNorm::new(styles, channels, device))
        } else {
            Self::Plain(InstanceNorm2d::new(channels, device))
        }
    }
}

impl<B: Backend> StyleNorm<B> for DecoderNorm<B> {
    fn normalize(&self, x: Tensor<B, 4>, style_ids: Tensor<B, 1, Int>) -> Tensor<B, 4> {
        match self {
            Self::Plain(norm)       => norm.normalize(x, style_ids),
            Self::Conditional(norm) => norm.normalize(x, style_ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ramp(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), device).reshape([2, 2, 2, 2])
    }

    #[test]
    fn test_standardized_planes_have_zero_mean() {
        let device = Default::default();
        let out    = instance_standardize(ramp(&device));
        let means: Vec<f32> = out.reshape([4, 4]).mean_dim(1).into_data().to_vec().unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-5));
    }

    #[test]
    fn test_conditional_norm_uses_style_rows() {
        let device = Default::default();
        let mut norm = ConditionalInstanceNorm::<TestBackend>::new(3, 2, &device);
        // style 2 shifts every channel by +5
        let beta = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0, 0.0, 0.0, 5.0, 5.0], &device)
            .reshape([3, 2]);
        norm.beta = Param::from_tensor(beta);

        let ids = Tensor::<TestBackend, 1, Int>::from_ints([0, 2], &device);
        let out = norm.normalize(ramp(&device), ids);
        let means: Vec<f32> = out.reshape([4, 4]).mean_dim(1).into_data().to_vec().unwrap();
        assert!(means[0].abs() < 1e-4 && means[1].abs() < 1e-4);
        assert!((means[2] - 5.0).abs() < 1e-4 && (means[3] - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_plain_norm_ignores_style() {
        let device = Default::default();
        let norm   = DecoderNorm::<TestBackend>::new(false, 3, 2, &device);
        let a = norm.normalize(ramp(&device), Tensor::from_ints([0, 0], &device));
        let b = norm.normalize(ramp(&device), Tensor::from_ints([1, 2], &device));
        let a: Vec<f32> = a.into_data().to_vec().unwrap();
        let b: Vec<f32> = b.into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }
}
