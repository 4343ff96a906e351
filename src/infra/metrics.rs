// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row of losses per optimizer step.
//
// Output file: logs/experiment_<id>/metrics.csv
//
//   step,epoch,lr,d_loss,g_loss,d_real,d_fake,category_real,cheat,l1,const,tv,category_fake
//   1,0,0.001000,1.512300,78.221000,…
//
// The file is appended to across resumed runs, so a step can
// appear twice when a run restarts an epoch after a checkpoint.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::error::GanResult;
use crate::ml::losses::LossReport;

const HEADER: &str =
    "step,epoch,lr,d_loss,g_loss,d_real,d_fake,category_real,cheat,l1,const,tv,category_fake";

/// One row of the metrics file.
#[derive(Debug, Clone, Copy)]
pub struct StepMetrics {
    pub step:   usize,
    pub epoch:  usize,
    pub lr:     f64,
    pub losses: LossReport,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: &Path) -> GanResult<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> GanResult<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        let l = &m.losses;
        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.step, m.epoch, m.lr,
            l.d_loss, l.g_loss, l.d_real, l.d_fake, l.category_real,
            l.cheat, l.l1, l.constant, l.tv, l.category_fake,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        let row = StepMetrics {
            step: 1,
            epoch: 0,
            lr: 0.001,
            losses: LossReport { d_loss: 1.5, g_loss: 80.0, ..LossReport::default() },
        };
        logger.log(&row).unwrap();

        // reopening must not repeat the header
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&StepMetrics { step: 2, ..row }).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("1,0,0.001000,1.500000,80.000000"));
        assert!(lines[2].starts_with("2,"));
    }
}
