// ============================================================
// Layer 5 — Model Configuration
// ============================================================
// Shape hyperparameters shared by the generator and the
// discriminator. Persisted as model_config.json next to the
// checkpoints; a resumed run must match it exactly.

use burn::prelude::*;

use crate::domain::error::{GanError, GanResult};
use crate::ml::discriminator::Discriminator;
use crate::ml::generator::Generator;

/// Channel multipliers of the encoder, outermost first.
const ENCODER_MULTIPLIERS: [usize; 8] = [1, 2, 4, 8, 8, 8, 8, 8];

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Side of the square glyph images (power of two)
    pub image_size:    usize,
    /// Rows of the style embedding table
    pub embedding_num: usize,
    /// Width of each style embedding row
    pub embedding_dim: usize,
    #[config(default = 64)]
    pub generator_dim: usize,
    #[config(default = 64)]
    pub discriminator_dim: usize,
    #[config(default = 1)]
    pub channels: usize,
    /// Conditional instance norm in the decoder instead of plain
    #[config(default = false)]
    pub inst_norm: bool,
}

impl ModelConfig {
    pub fn validate(&self) -> GanResult<()> {
        if self.image_size < 8 || !self.image_size.is_power_of_two() {
            return Err(GanError::config(format!(
                "image_size must be a power of two >= 8, got {}", self.image_size
            )));
        }
        if self.embedding_num == 0 || self.embedding_dim == 0 {
            return Err(GanError::config("embedding_num and embedding_dim must be positive"));
        }
        if self.generator_dim == 0 || self.discriminator_dim == 0 || self.channels == 0 {
            return Err(GanError::config("layer widths must be positive"));
        }
        Ok(())
    }

    /// Encoder depth: down to 1×1 for images up to 256 px.
    pub fn encoder_layers(&self) -> usize {
        (self.image_size.trailing_zeros() as usize).clamp(1, ENCODER_MULTIPLIERS.len())
    }

    /// Output channels of each encoder layer, outermost first.
    pub fn encoder_channels(&self) -> Vec<usize> {
        ENCODER_MULTIPLIERS[..self.encoder_layers()]
            .iter()
            .map(|m| m * self.generator_dim)
            .collect()
    }

    pub fn init_generator<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        Generator::new(self, device)
    }

    pub fn init_discriminator<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        Discriminator::new(self, device)
    }

    /// A checkpoint can only be restored into a model of identical shape.
    pub fn ensure_compatible(&self, stored: &ModelConfig) -> GanResult<()> {
        let ours   = serde_json::to_value(self)?;
        let theirs = serde_json::to_value(stored)?;
        if ours != theirs {
            return Err(GanError::checkpoint(format!(
                "checkpoint was written for a different model: stored {theirs}, requested {ours}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_follows_image_size() {
        assert_eq!(ModelConfig::new(256, 40, 128).encoder_layers(), 8);
        assert_eq!(ModelConfig::new(512, 40, 128).encoder_layers(), 8);
        assert_eq!(ModelConfig::new(16, 2, 8).encoder_layers(), 4);
    }

    #[test]
    fn test_encoder_channels() {
        let cfg = ModelConfig::new(32, 2, 8).with_generator_dim(4);
        assert_eq!(cfg.encoder_channels(), vec![4, 8, 16, 32, 32]);
    }

    #[test]
    fn test_rejects_odd_sizes() {
        assert!(ModelConfig::new(100, 2, 8).validate().is_err());
        assert!(ModelConfig::new(64, 0, 8).validate().is_err());
        assert!(ModelConfig::new(64, 2, 8).validate().is_ok());
    }

    #[test]
    fn test_compatibility_is_field_exact() {
        let a = ModelConfig::new(64, 2, 8);
        assert!(a.ensure_compatible(&a.clone()).is_ok());
        let b = a.clone().with_inst_norm(true);
        assert!(matches!(a.ensure_compatible(&b), Err(GanError::Checkpoint(_))));
    }
}
