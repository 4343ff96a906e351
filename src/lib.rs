// ============================================================
// glyph-gan — library root
// ============================================================
// Layers, outermost first:
//
//   cli/          Layer 1 — argument parsing
//   application/  Layer 2 — use cases (package, train, infer)
//   domain/       Layer 3 — framework-free types and errors
//   data/         Layer 4 — record stores, decoding, batching
//   ml/           Layer 5 — networks, losses, trainer (burn)
//   infra/        Layer 6 — checkpoints, lock, metrics, samples

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
