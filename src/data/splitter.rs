// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Two ways to decide which packaged images become validation
// records:
//
//   - split_train_val:     shuffle, then cut at a fraction
//   - split_by_file_name:  trust the rasterizer's naming
//                          (`..._train.png` / `..._val.png`)
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

/// Randomly shuffle `samples` and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.9 = 90%
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64) -> (Vec<T>, Vec<T>) {
    let mut rng = rand::thread_rng();
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    // After this: samples = [0..split_at], val = [split_at..total]
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

/// Files whose name mentions `val` are validation, everything
/// else is training. Order is preserved.
pub fn split_by_file_name(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    paths.into_iter().partition(|p| !is_validation_file(p))
}

fn is_validation_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains("val"))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.9);
        assert_eq!(train.len(), 90);
        assert_eq!(val.len(),   10);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.7);
        assert_eq!(train.len() + val.len(), 50);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_split_by_file_name() {
        let paths = vec![
            PathBuf::from("pairs/0_A_train.png"),
            PathBuf::from("pairs/0_B_val.png"),
            PathBuf::from("pairs/1_C_train.png"),
        ];
        let (train, val) = split_by_file_name(paths);
        assert_eq!(train.len(), 2);
        assert_eq!(val, vec![PathBuf::from("pairs/0_B_val.png")]);
    }
}
