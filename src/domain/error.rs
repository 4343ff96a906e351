// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every library layer returns Result<T, GanError>. The CLI and
// application layers wrap these in anyhow with extra context.
//
//   Config      — invalid hyperparameters, bad phase transition
//   Data        — corrupt/missing record, dimension mismatch
//   Checkpoint  — incompatible or unreadable snapshot, lock held
//   Divergence  — non-finite loss, never retried

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GanError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("training diverged at step {step}: d_loss={d_loss}, g_loss={g_loss}")]
    Divergence { step: usize, d_loss: f64, g_loss: f64 },

    #[error("record encoding error: {0}")]
    Record(#[from] bincode::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GanError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Per-record data problems are skipped by the reader; all
    /// other variants terminate the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Data(_) | Self::Image(_) | Self::Record(_))
    }
}

pub type GanResult<T> = Result<T, GanError>;
