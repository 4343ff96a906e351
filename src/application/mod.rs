// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one user-level goal.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
//   package → record stores from rasterised pair images
//   train   → a resumable GAN training run
//   infer   → glyph images from the latest checkpoint

/// Packaging pair images into record stores
pub mod package_use_case;

/// The training workflow and its configuration
pub mod train_use_case;

/// Offline generation with a trained experiment
pub mod infer_use_case;
