// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn network and optimisation code lives here.
//
//   session.rs       — device + seeded RNG for one run
//   norm.rs          — instance / conditional instance norm
//   model.rs         — ModelConfig shared by both networks
//   generator.rs     — U-Net generator with style embedding
//   discriminator.rs — patch realness + style classifier heads
//   losses.rs        — the loss composer
//   trainer.rs       — GanTrainer state machine and loop
//   inferencer.rs    — generation from a saved checkpoint
//
// Reference: Isola et al. (2017) pix2pix
//            Burn Book §5 (Training)

/// Device and random state for a run
pub mod session;

/// Normalisation strategies for the decoder
pub mod norm;

/// Architecture hyperparameters
pub mod model;

/// Encoder–decoder glyph generator
pub mod generator;

/// Conditional patch discriminator
pub mod discriminator;

/// Adversarial and auxiliary losses
pub mod losses;

/// Resumable GAN training loop
pub mod trainer;

/// Offline generation from a checkpoint
pub mod inferencer;
