// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The trainer depends on these seams rather than on concrete
// files, so tests can feed it in-memory examples and capture
// samples without touching the disk.

use crate::domain::error::GanResult;
use crate::domain::example::Example;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can produce decoded training examples.
///
/// Implementations:
///   - RecordStoreSource → a packaged `.obj` record store
///   - Vec<Example>      → in-memory examples (tests, tooling)
pub trait ExampleSource {
    fn load_examples(&self) -> GanResult<Vec<Example>>;
}

impl ExampleSource for Vec<Example> {
    fn load_examples(&self) -> GanResult<Vec<Example>> {
        Ok(self.clone())
    }
}

// ─── SampleSink ───────────────────────────────────────────────────────────────
/// Side-by-side comparison of a validation slice at one step.
/// Every image is `size × size`, pixels in [-1, 1].
#[derive(Debug, Clone)]
pub struct SampleSheet {
    pub epoch:     usize,
    pub step:      usize,
    pub size:      usize,
    pub labels:    Vec<String>,
    pub sources:   Vec<Vec<f32>>,
    pub targets:   Vec<Vec<f32>>,
    pub generated: Vec<Vec<f32>>,
}

/// Receives periodic qualitative output from the trainer.
///
/// Implementations:
///   - ImageSampler → writes PNG sheets under the experiment dir
pub trait SampleSink {
    fn write_sample(&mut self, sheet: &SampleSheet) -> GanResult<()>;
}
