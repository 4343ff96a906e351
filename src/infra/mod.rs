// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything a run writes to disk besides the record stores:
//
//   checkpoint.rs — step_<n>/ snapshots, model/train configs,
//                   latest-step resolution
//   lock.rs       — one trainer per experiment directory
//   metrics.rs    — per-step losses as CSV
//   sampler.rs    — PNG sample sheets and generated glyphs

/// Checkpoint saving, discovery and restoring
pub mod checkpoint;

/// Exclusive experiment lock
pub mod lock;

/// Training metrics CSV logger
pub mod metrics;

/// PNG output of generated glyphs
pub mod sampler;
