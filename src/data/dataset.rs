// ============================================================
// Layer 4 — Glyph Dataset
// ============================================================
// RecordStoreSource turns a record store into decoded examples,
// skipping records that cannot be used. Skips are counted per
// window of `batch_size` consecutive records; a window whose bad
// fraction exceeds the configured tolerance aborts the load,
// since at that point the store itself is suspect.
//
// GlyphDataset wraps the decoded examples in Burn's Dataset trait.

use std::path::PathBuf;

use burn::data::dataset::Dataset;

use crate::data::image_pair::decode_pair;
use crate::data::record_store::{RecordPayload, RecordReader};
use crate::domain::error::{GanError, GanResult};
use crate::domain::example::{Example, ExampleLabel};
use crate::domain::style::StyleId;
use crate::domain::traits::ExampleSource;

pub struct RecordStoreSource {
    path:             PathBuf,
    image_size:       usize,
    embedding_num:    usize,
    window:           usize,
    max_bad_fraction: f64,
}

impl RecordStoreSource {
    pub fn new(path: impl Into<PathBuf>, image_size: usize, embedding_num: usize) -> Self {
        Self {
            path: path.into(),
            image_size,
            embedding_num,
            window: 16,
            max_bad_fraction: 0.1,
        }
    }

    /// Tolerate up to `max_bad_fraction` unusable records in every
    /// `window` consecutive records.
    pub fn with_tolerance(mut self, window: usize, max_bad_fraction: f64) -> Self {
        self.window = window.max(1);
        self.max_bad_fraction = max_bad_fraction;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn to_example(&self, index: usize, record: RecordPayload) -> GanResult<Example> {
        let style_id = StyleId::checked(record.label() as usize, self.embedding_num)
            .map_err(|e| GanError::data(format!("record {index}: {e}")))?;
        let pair = decode_pair(record.image(), self.image_size)
            .map_err(|e| GanError::data(format!("record {index}: {e}")))?;
        let label = match record {
            RecordPayload::FixedSample { unicode, .. } => ExampleLabel::Unicode(unicode),
            RecordPayload::Labeled { .. } => ExampleLabel::Sequence(index as u32),
        };
        Ok(Example::new(style_id, pair, label))
    }
}

impl ExampleSource for RecordStoreSource {
    fn load_examples(&self) -> GanResult<Vec<Example>> {
        let reader = RecordReader::open(&self.path)?;
        let mut guard    = BadRecordGuard::new(self.window, self.max_bad_fraction);
        let mut examples = Vec::new();

        for (index, item) in reader.enumerate() {
            let outcome = item.and_then(|record| self.to_example(index, record));
            match outcome {
                Ok(example) => {
                    guard.record(false)?;
                    examples.push(example);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping record in '{}': {}", self.path.display(), e);
                    guard.record(true)?;
                }
                Err(e) => return Err(e),
            }
        }
        guard.finish()?;

        tracing::info!(
            "Loaded {} examples from '{}' ({} skipped)",
            examples.len(),
            self.path.display(),
            guard.total_bad,
        );
        Ok(examples)
    }
}

// ─── BadRecordGuard ───────────────────────────────────────────────────────────
struct BadRecordGuard {
    window:       usize,
    max_fraction: f64,
    seen:         usize,
    bad:          usize,
    total_bad:    usize,
}

impl BadRecordGuard {
    fn new(window: usize, max_fraction: f64) -> Self {
        Self { window, max_fraction, seen: 0, bad: 0, total_bad: 0 }
    }

    fn record(&mut self, is_bad: bool) -> GanResult<()> {
        self.seen += 1;
        if is_bad {
            self.bad += 1;
            self.total_bad += 1;
        }
        if self.seen == self.window {
            self.check()?;
            self.seen = 0;
            self.bad  = 0;
        }
        Ok(())
    }

    /// A partial final window is judged against the full window
    /// size so a short tail is not held to a stricter bar.
    fn finish(&mut self) -> GanResult<()> {
        if self.seen > 0 {
            self.seen = self.window;
            self.check()?;
        }
        Ok(())
    }

    fn check(&self) -> GanResult<()> {
        let fraction = self.bad as f64 / self.window as f64;
        if fraction > self.max_fraction {
            return Err(GanError::data(format!(
                "{} of {} consecutive records are unusable (tolerance {:.0}%)",
                self.bad,
                self.window,
                self.max_fraction * 100.0
            )));
        }
        Ok(())
    }
}

// ─── GlyphDataset ─────────────────────────────────────────────────────────────
pub struct GlyphDataset {
    examples: Vec<Example>,
}

impl GlyphDataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Keep only the examples whose style passes `keep`.
    pub fn retain_styles(&mut self, keep: impl Fn(StyleId) -> bool) {
        self.examples.retain(|ex| keep(ex.style_id));
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

impl Dataset<Example> for GlyphDataset {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image_pair::encode_pair_png;
    use crate::data::record_store::RecordWriter;
    use crate::domain::example::ImagePair;

    fn png(size: usize) -> Vec<u8> {
        let pair = ImagePair::new(size, vec![1.0; size * size], vec![-1.0; size * size]);
        encode_pair_png(&pair).unwrap()
    }

    fn write_store(path: &std::path::Path, records: &[RecordPayload]) {
        let mut w = RecordWriter::create(path).unwrap();
        for r in records {
            w.append(r).unwrap();
        }
        w.finish().unwrap();
    }

    #[test]
    fn test_loads_and_labels_examples() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.obj");
        write_store(&path, &[
            RecordPayload::Labeled { label: 1, image: png(8) },
            RecordPayload::FixedSample { label: 0, unicode: "B".into(), image: png(8) },
        ]);

        let examples = RecordStoreSource::new(&path, 8, 2).load_examples().unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].style_id, StyleId(1));
        assert_eq!(examples[0].label, ExampleLabel::Sequence(0));
        assert_eq!(examples[1].label, ExampleLabel::Unicode("B".into()));
    }

    #[test]
    fn test_skips_isolated_bad_record() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.obj");
        let mut records: Vec<_> = (0..9)
            .map(|_| RecordPayload::Labeled { label: 0, image: png(8) })
            .collect();
        records.insert(4, RecordPayload::Labeled { label: 0, image: b"junk".to_vec() });
        write_store(&path, &records);

        let examples = RecordStoreSource::new(&path, 8, 1)
            .with_tolerance(10, 0.1)
            .load_examples()
            .unwrap();
        assert_eq!(examples.len(), 9);
    }

    #[test]
    fn test_escalates_when_too_many_records_are_bad() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.obj");
        let mut records: Vec<_> = (0..8)
            .map(|_| RecordPayload::Labeled { label: 0, image: png(8) })
            .collect();
        // wrong canvas size and out-of-range style
        records.push(RecordPayload::Labeled { label: 0, image: png(4) });
        records.push(RecordPayload::Labeled { label: 5, image: png(8) });
        write_store(&path, &records);

        let err = RecordStoreSource::new(&path, 8, 1)
            .with_tolerance(10, 0.1)
            .load_examples()
            .unwrap_err();
        assert!(matches!(err, GanError::Data(_)));
    }

    #[test]
    fn test_missing_store_is_data_error() {
        let err = RecordStoreSource::new("/nonexistent/train.obj", 8, 1)
            .load_examples()
            .unwrap_err();
        assert!(matches!(err, GanError::Data(_)));
    }

    #[test]
    fn test_dataset_trait() {
        let pair = ImagePair::new(1, vec![0.0], vec![0.0]);
        let mut ds = GlyphDataset::new(vec![
            Example::new(StyleId(0), pair.clone(), ExampleLabel::Sequence(0)),
            Example::new(StyleId(1), pair, ExampleLabel::Sequence(1)),
        ]);
        assert_eq!(ds.len(), 2);
        ds.retain_styles(|s| s == StyleId(1));
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0).unwrap().style_id, StyleId(1));
        assert!(ds.get(1).is_none());
    }
}
