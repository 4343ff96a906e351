// ============================================================
// Layer 5 — Loss Composer
// ============================================================
// Discriminator objective:
//   real  = BCE(realness(source, target), 1)
//   fake  = BCE(realness(source, G(source)), 0)
//   total = real + fake + Lcategory · CE(style_logits_real, style)
//
// Generator objective:
//   cheat    = BCE(realness(source, G(source)), 1)   non-saturating
//   l1       = mean |G(source) − target|
//   const    = mean (encode(source) − encode(target))²
//   tv       = Σ adjacent-pixel squared differences / (N · width)
//   category = CE(style_logits_fake, style)
//   total    = cheat + L1·l1 + Lconst·const + Ltv·tv + Lcategory·category
//
// A zero Ltv leaves the tv term out of the graph entirely.

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::activation::log_sigmoid,
};
use serde::{Deserialize, Serialize};

use crate::ml::discriminator::DiscriminatorOutput;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    pub l1:       f64,
    pub constant: f64,
    pub tv:       f64,
    pub category: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self { l1: 100.0, constant: 15.0, tv: 0.0, category: 1.0 }
    }
}

pub struct DiscriminatorLosses<B: Backend> {
    pub total:    Tensor<B, 1>,
    pub real:     Tensor<B, 1>,
    pub fake:     Tensor<B, 1>,
    pub category: Tensor<B, 1>,
}

pub struct GeneratorLosses<B: Backend> {
    pub total:    Tensor<B, 1>,
    pub cheat:    Tensor<B, 1>,
    pub l1:       Tensor<B, 1>,
    pub constant: Tensor<B, 1>,
    pub tv:       Option<Tensor<B, 1>>,
    pub category: Tensor<B, 1>,
}

// ─── Individual terms ─────────────────────────────────────────────────────────

/// BCE-with-logits against an all-ones label.
pub fn bce_real<B: Backend, const D: usize>(logits: Tensor<B, D>) -> Tensor<B, 1> {
    log_sigmoid(logits).mean().neg()
}

/// BCE-with-logits against an all-zeros label.
pub fn bce_fake<B: Backend, const D: usize>(logits: Tensor<B, D>) -> Tensor<B, 1> {
    log_sigmoid(logits.neg()).mean().neg()
}

pub fn l1_loss<B: Backend>(generated: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    (generated - target).abs().mean()
}

pub fn constant_loss<B: Backend>(source_code: Tensor<B, 4>, target_code: Tensor<B, 4>) -> Tensor<B, 1> {
    (source_code - target_code).powf_scalar(2.0).mean()
}

pub fn total_variation<B: Backend>(image: Tensor<B, 4>) -> Tensor<B, 1> {
    let [n, c, h, w] = image.dims();
    let dh = image.clone().slice([0..n, 0..c, 1..h, 0..w]) - image.clone().slice([0..n, 0..c, 0..h - 1, 0..w]);
    let dw = image.clone().slice([0..n, 0..c, 0..h, 1..w]) - image.slice([0..n, 0..c, 0..h, 0..w - 1]);
    (dh.powf_scalar(2.0).sum() + dw.powf_scalar(2.0).sum()) / (n * w) as f64
}

pub fn category_loss<B: Backend>(style_logits: Tensor<B, 2>, style_ids: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&style_logits.device())
        .forward(style_logits, style_ids)
}

// ─── Composer ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct LossComposer {
    pub weights: LossWeights,
}

impl LossComposer {
    pub fn new(weights: LossWeights) -> Self {
        Self { weights }
    }

    pub fn discriminator<B: Backend>(
        &self,
        on_real:   DiscriminatorOutput<B>,
        on_fake:   DiscriminatorOutput<B>,
        style_ids: Tensor<B, 1, Int>,
    ) -> DiscriminatorLosses<B> {
        let real     = bce_real(on_real.realness);
        let fake     = bce_fake(on_fake.realness);
        let category = category_loss(on_real.style_logits, style_ids);
        let total    = real.clone() + fake.clone() + category.clone() * self.weights.category;
        DiscriminatorLosses { total, real, fake, category }
    }

    pub fn generator<B: Backend>(
        &self,
        generated:   Tensor<B, 4>,
        target:      Tensor<B, 4>,
        source_code: Tensor<B, 4>,
        target_code: Tensor<B, 4>,
        on_fake:     DiscriminatorOutput<B>,
        style_ids:   Tensor<B, 1, Int>,
    ) -> GeneratorLosses<B> {
        let w = self.weights;
        let cheat    = bce_real(on_fake.realness);
        let category = category_loss(on_fake.style_logits, style_ids);
        let l1       = l1_loss(generated.clone(), target);
        let constant = constant_loss(source_code, target_code);

        let mut total = cheat.clone()
            + l1.clone() * w.l1
            + constant.clone() * w.constant
            + category.clone() * w.category;

        let tv = (w.tv != 0.0).then(|| total_variation(generated));
        if let Some(tv) = &tv {
            total = total + tv.clone() * w.tv;
        }

        GeneratorLosses { total, cheat, l1, constant, tv, category }
    }
}

/// Host-side copy of one step's losses, for logging and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossReport {
    pub d_loss:        f64,
    pub g_loss:        f64,
    pub d_real:        f64,
    pub d_fake:        f64,
    pub category_real: f64,
    pub cheat:         f64,
    pub l1:            f64,
    pub constant:      f64,
    pub tv:            f64,
    pub category_fake: f64,
}

pub fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

impl LossReport {
    pub fn from_losses<B: Backend>(d: &DiscriminatorLosses<B>, g: &GeneratorLosses<B>) -> Self {
        Self {
            d_loss:        scalar(&d.total),
            g_loss:        scalar(&g.total),
            d_real:        scalar(&d.real),
            d_fake:        scalar(&d.fake),
            category_real: scalar(&d.category),
            cheat:         scalar(&g.cheat),
            l1:            scalar(&g.l1),
            constant:      scalar(&g.constant),
            tv:            g.tv.as_ref().map(scalar).unwrap_or(0.0),
            category_fake: scalar(&g.category),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.d_loss.is_finite() && self.g_loss.is_finite()
    }
}
