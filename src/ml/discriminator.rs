// ============================================================
// Layer 5 — Discriminator (patch realness + style classifier)
// ============================================================
//   concat(source, candidate) [N,2,S,S]
//     │  conv4/2 → lrelu                       d
//     │  conv4/2 → norm → lrelu                2d
//     │  conv4/2 → norm → lrelu                4d     [N,4d,S/8,S/8]
//     ├─ patch head  conv3/1                 → realness logits [N,1,S/8,S/8]
//     └─ mean pool → linear                  → style logits    [N,K]
//
// Both heads read the same trunk features.

use burn::{
    nn::{conv::{Conv2d, Conv2dConfig}, Linear, LinearConfig, PaddingConfig2d},
    prelude::*,
    tensor::activation::leaky_relu,
};

use crate::ml::model::ModelConfig;
use crate::ml::norm::InstanceNorm2d;

const LEAKY_SLOPE: f64 = 0.2;
const TRUNK_MULTIPLIERS: [usize; 3] = [1, 2, 4];

#[derive(Module, Debug)]
pub struct TrunkBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: Option<InstanceNorm2d<B>>,
}

impl<B: Backend> TrunkBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        leaky_relu(x, LEAKY_SLOPE)
    }
}

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub trunk:           Vec<TrunkBlock<B>>,
    pub patch_head:      Conv2d<B>,
    pub classifier_head: Linear<B>,
}

pub struct DiscriminatorOutput<B: Backend> {
    /// Per-patch realness logits — shape: [batch, 1, h, w]
    pub realness: Tensor<B, 4>,
    /// Unnormalised style scores — shape: [batch, embedding_num]
    pub style_logits: Tensor<B, 2>,
}

impl<B: Backend> Discriminator<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Self {
        let mut in_ch = 2 * cfg.channels;
        let trunk = TRUNK_MULTIPLIERS
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let out_ch = m * cfg.discriminator_dim;
                let conv = Conv2dConfig::new([in_ch, out_ch], [4, 4])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device);
                let norm = (i > 0).then(|| InstanceNorm2d::new(out_ch, device));
                in_ch = out_ch;
                TrunkBlock { conv, norm }
            })
            .collect();

        let patch_head = Conv2dConfig::new([in_ch, 1], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let classifier_head = LinearConfig::new(in_ch, cfg.embedding_num).init(device);

        Self { trunk, patch_head, classifier_head }
    }

    /// `image` is source and candidate stacked on the channel axis.
    pub fn forward(&self, image: Tensor<B, 4>) -> DiscriminatorOutput<B> {
        let features = self.trunk.iter().fold(image, |x, block| block.forward(x));
        let [n, c, h, w] = features.dims();

        let realness = self.patch_head.forward(features.clone());
        let pooled   = features.reshape([n, c, h * w]).mean_dim(2).reshape([n, c]);
        let style_logits = self.classifier_head.forward(pooled);

        DiscriminatorOutput { realness, style_logits }
    }

    /// Judge `candidate` as a rendering of `source`.
    pub fn discriminate(&self, source: Tensor<B, 4>, candidate: Tensor<B, 4>) -> DiscriminatorOutput<B> {
        self.forward(Tensor::cat(vec![source, candidate], 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_head_shapes() {
        let device = Default::default();
        let cfg  = ModelConfig::new(32, 5, 4).with_discriminator_dim(2);
        let disc: Discriminator<TestBackend> = cfg.init_discriminator(&device);
        let src  = Tensor::<TestBackend, 4>::zeros([3, 1, 32, 32], &device);
        let cand = Tensor::<TestBackend, 4>::ones([3, 1, 32, 32], &device);
        let out  = disc.discriminate(src, cand);
        assert_eq!(out.realness.dims(), [3, 1, 4, 4]);
        assert_eq!(out.style_logits.dims(), [3, 5]);
    }
}
