// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: glyph examples, style ids, trainer phases, the error
// taxonomy and the seams other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

/// A labelled source/target glyph pair
pub mod example;

/// Style ids and fine-tune subsets
pub mod style;

/// Trainer lifecycle phases
pub mod phase;

/// Error taxonomy shared by every library layer
pub mod error;

/// Core abstractions (traits) that other layers implement
pub mod traits;
