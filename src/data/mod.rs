// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from packaged record files to GPU-ready batches:
//
//   record store (.obj)
//       │
//       ▼
//   RecordReader      → framed, independently decodable records
//       │
//       ▼
//   image_pair        → PNG pair → normalised source/target
//       │
//       ▼
//   RecordStoreSource → skips bad records, enforces tolerance
//       │
//       ▼
//   GlyphDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   EpochCycler       → per-epoch shuffle, full batches
//       │
//       ▼
//   GlyphBatcher      → stacks examples into tensor batches

/// Framed binary record files (reader and writer)
pub mod record_store;

/// Paired raster decoding, encoding and augmentation
pub mod image_pair;

/// Decoded examples behind Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait and the epoch cycler
pub mod batcher;

/// Splits packaged images into train/validation sets
pub mod splitter;
