// ============================================================
// Layer 5 — Generator (U-Net with style embedding)
// ============================================================
// Architecture for an S×S glyph, L = encoder_layers():
//
//   source [N,1,S,S]
//     │  enc₀ conv4/2                       → e₀   (no norm)
//     │  enc₁ lrelu → conv4/2 → norm        → e₁
//     │  …
//     │  enc_{L-1} lrelu → conv4/2          → e_{L-1}  bottleneck, 1×1
//     ▼
//   concat(relu(bottleneck), style embedding) → [N, e_{L-1}+E, 1, 1]
//     │  dec₀ deconv4/2 → norm → dropout → concat e_{L-2}
//     │  dec₁ relu → deconv4/2 → norm → dropout → concat e_{L-3}
//     │  …
//     │  dec_{L-1} relu → deconv4/2 → tanh  → image [N,1,S,S]
//
// The style embedding joins after the bottleneck's relu so rows
// with negative entries still receive gradient. Dropout sits on
// the first three decoder layers and is only active on autodiff
// backends. The encoder is reused on its own
// for the consistency loss.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{leaky_relu, relu, tanh},
};

use crate::domain::error::GanResult;
use crate::domain::style::StyleId;
use crate::ml::model::ModelConfig;
use crate::ml::norm::{DecoderNorm, InstanceNorm2d, StyleNorm};

const LEAKY_SLOPE: f64 = 0.2;
const DROPOUT_LAYERS: usize = 3;

// ─── EncoderBlock ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: Option<InstanceNorm2d<B>>,
}

impl<B: Backend> EncoderBlock<B> {
    fn new(in_ch: usize, out_ch: usize, normed: bool, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_ch, out_ch], [4, 4])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let norm = normed.then(|| InstanceNorm2d::new(out_ch, device));
        Self { conv, norm }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        }
    }
}

// ─── DecoderBlock ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub deconv:  ConvTranspose2d<B>,
    pub norm:    Option<DecoderNorm<B>>,
    pub dropout: Option<Dropout>,
}

impl<B: Backend> DecoderBlock<B> {
    /// `x` is expected to be activated already.
    pub fn forward(&self, x: Tensor<B, 4>, style_ids: Tensor<B, 1, Int>) -> Tensor<B, 4> {
        let mut x = self.deconv.forward(x);
        if let Some(norm) = &self.norm {
            x = norm.normalize(x, style_ids);
        }
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        }
    }
}

// ─── Generator ────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    pub encoder:   Vec<EncoderBlock<B>>,
    pub embedding: Embedding<B>,
    pub decoder:   Vec<DecoderBlock<B>>,
}

pub struct GeneratorOutput<B: Backend> {
    /// tanh output in [-1, 1] — shape: [batch, channels, size, size]
    pub image: Tensor<B, 4>,
    /// Encoder code of the source — shape: [batch, C, 1, 1]
    pub bottleneck: Tensor<B, 4>,
}

impl<B: Backend> Generator<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Self {
        let enc    = cfg.encoder_channels();
        let layers = enc.len();

        let encoder = (0..layers)
            .map(|i| {
                let in_ch  = if i == 0 { cfg.channels } else { enc[i - 1] };
                let normed = i != 0 && i != layers - 1;
                EncoderBlock::new(in_ch, enc[i], normed, device)
            })
            .collect();

        let embedding = EmbeddingConfig::new(cfg.embedding_num, cfg.embedding_dim).init(device);

        let decoder = (0..layers)
            .map(|j| {
                let last   = j == layers - 1;
                let in_ch  = if j == 0 { enc[layers - 1] + cfg.embedding_dim } else { 2 * enc[layers - 1 - j] };
                let out_ch = if last { cfg.channels } else { enc[layers - 2 - j] };
                let deconv = ConvTranspose2dConfig::new([in_ch, out_ch], [4, 4])
                    .with_stride([2, 2])
                    .with_padding([1, 1])
                    .init(device);
                let norm = (!last).then(|| {
                    DecoderNorm::new(cfg.inst_norm, cfg.embedding_num, out_ch, device)
                });
                let dropout = (!last && j < DROPOUT_LAYERS).then(|| DropoutConfig::new(0.5).init());
                DecoderBlock { deconv, norm, dropout }
            })
            .collect();

        Self { encoder, embedding, decoder }
    }

    pub fn embedding_rows(&self) -> usize {
        self.embedding.weight.dims()[0]
    }

    fn encoder_step(&self, i: usize, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = if i > 0 { leaky_relu(x, LEAKY_SLOPE) } else { x };
        self.encoder[i].forward(x)
    }

    /// Every encoder activation, outermost first.
    fn encode_all(&self, source: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut skips = Vec::with_capacity(self.encoder.len());
        let mut x = source;
        for i in 0..self.encoder.len() {
            x = self.encoder_step(i, x);
            skips.push(x.clone());
        }
        skips
    }

    /// The bottleneck code alone — shape: [batch, C, 1, 1]
    pub fn encode(&self, source: Tensor<B, 4>) -> Tensor<B, 4> {
        (0..self.encoder.len()).fold(source, |x, i| self.encoder_step(i, x))
    }

    /// Forward pass with tensor style ids; ids must already be in range.
    pub fn forward(&self, source: Tensor<B, 4>, style_ids: Tensor<B, 1, Int>) -> GeneratorOutput<B> {
        let skips      = self.encode_all(source);
        let depth      = skips.len();
        let bottleneck = skips[depth - 1].clone();
        let [n, _, h, w] = bottleneck.dims();

        let style = self.embedding.weight.val().select(0, style_ids.clone());
        let e_dim = style.dims()[1];
        let style = style.reshape([n, e_dim, 1, 1]).expand([n, e_dim, h, w]);

        let mut x = Tensor::cat(vec![relu(bottleneck.clone()), style], 1);
        for (j, block) in self.decoder.iter().enumerate() {
            let input = if j == 0 { x } else { relu(x) };
            x = block.forward(input, style_ids.clone());
            if j + 1 < depth {
                x = Tensor::cat(vec![x, skips[depth - 2 - j].clone()], 1);
            }
        }

        GeneratorOutput { image: tanh(x), bottleneck }
    }

    /// Checked entry point: rejects style ids outside the embedding table.
    pub fn generate(&self, source: Tensor<B, 4>, styles: &[StyleId]) -> GanResult<GeneratorOutput<B>> {
        let rows = self.embedding_rows();
        let ids = styles
            .iter()
            .map(|s| StyleId::checked(s.index(), rows).map(|s| s.index() as i32))
            .collect::<GanResult<Vec<i32>>>()?;
        let style_ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &source.device());
        Ok(self.forward(source, style_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::module::Param;

    type TestBackend = NdArray;

    fn tiny() -> ModelConfig {
        ModelConfig::new(16, 3, 4).with_generator_dim(2)
    }

    #[test]
    fn test_output_matches_input_shape() {
        let device = Default::default();
        let gen: Generator<TestBackend> = tiny().init_generator(&device);
        let source = Tensor::<TestBackend, 4>::zeros([2, 1, 16, 16], &device);
        let out = gen.generate(source, &[StyleId(0), StyleId(2)]).unwrap();
        assert_eq!(out.image.dims(), [2, 1, 16, 16]);
        assert_eq!(out.bottleneck.dims(), [2, 16, 1, 1]);
    }

    #[test]
    fn test_output_is_bounded() {
        let device = Default::default();
        let gen: Generator<TestBackend> = tiny().init_generator(&device);
        let source = Tensor::<TestBackend, 4>::ones([1, 1, 16, 16], &device);
        let out: Vec<f32> = gen.generate(source, &[StyleId(1)]).unwrap()
            .image.into_data().to_vec().unwrap();
        assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_style_out_of_range() {
        let device = Default::default();
        let gen: Generator<TestBackend> = tiny().init_generator(&device);
        let source = Tensor::<TestBackend, 4>::zeros([1, 1, 16, 16], &device);
        assert!(gen.generate(source, &[StyleId(3)]).is_err());
    }

    #[test]
    fn test_negative_embedding_row_gets_gradient() {
        type AdBackend = burn::backend::Autodiff<NdArray>;
        let device = Default::default();
        let mut gen: Generator<AdBackend> = tiny().init_generator(&device);
        gen.embedding.weight = Param::from_tensor(Tensor::full([3, 4], -1.0, &device));

        let source = Tensor::<AdBackend, 4>::ones([2, 1, 16, 16], &device);
        let out = gen.generate(source, &[StyleId(1), StyleId(1)]).unwrap();
        let grads = out.image.sum().backward();

        let grad: Vec<f32> = gen.embedding.weight.val().grad(&grads).unwrap()
            .into_data().to_vec().unwrap();
        // row 1 only
        assert!(grad[4..8].iter().any(|g| *g != 0.0));
        assert!(grad[..4].iter().chain(&grad[8..]).all(|g| *g == 0.0));
    }

    #[test]
    fn test_conditional_norm_builds() {
        let device = Default::default();
        let gen: Generator<TestBackend> = tiny().with_inst_norm(true).init_generator(&device);
        assert!(matches!(gen.decoder[0].norm, Some(DecoderNorm::Conditional(_))));
        assert!(gen.decoder.last().unwrap().norm.is_none());
        assert!(gen.encoder[0].norm.is_none());
    }
}
