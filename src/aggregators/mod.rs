//! Aggregation rules over client updates.
//!
//! Krum runs in two renditions that share one scoring core:
//!
//! | Rule | Input | Byzantine tolerance |
//! |------|-------|---------------------|
//! | [`krum`] | cleartext updates | `n >= 2f + 3` |
//! | [`encrypted`] | BFV-encrypted updates | `n >= 2f + 3` |
//! | [`fedavg`] | cleartext updates | none (baseline) |
//!
//! Both Krum paths reduce their inputs to an `n x n` squared-distance
//! matrix and call [`select_from_distances`], so the selection logic cannot
//! drift between them.

pub mod encrypted;
pub mod fedavg;
pub mod krum;

pub use encrypted::CipherAggregate;
pub use fedavg::fedavg;
pub use krum::KrumOutcome;

use ndarray::Array2;

use crate::error::FlError;

/// Enforce Krum's participation precondition `n > 2f + 2`.
pub fn check_krum_bound(participants: usize, bound: usize) -> Result<(), FlError> {
    if participants > 2 * bound + 2 {
        Ok(())
    } else {
        Err(FlError::InsufficientHonestClients {
            participants,
            bound,
        })
    }
}

/// Krum closeness scores from a symmetric squared-distance matrix.
///
/// Score of candidate `i` is the sum of its `n - f - 2` smallest distances
/// to other candidates.
pub fn krum_scores(distances: &Array2<f64>, f: usize) -> Result<Vec<f64>, FlError> {
    let n = distances.nrows();
    if n != distances.ncols() {
        return Err(FlError::DimensionMismatch);
    }
    check_krum_bound(n, f)?;

    let k = n - f - 2;
    let scores = (0..n)
        .map(|i| {
            let mut row: Vec<f64> = (0..n).filter(|&j| j != i).map(|j| distances[[i, j]]).collect();
            row.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            row.iter().take(k).sum()
        })
        .collect();
    Ok(scores)
}

/// Index of the Krum winner: minimum score, ties broken by lowest index.
pub fn select_from_distances(distances: &Array2<f64>, f: usize) -> Result<usize, FlError> {
    let scores = krum_scores(distances, f)?;
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s < scores[best] {
            best = i;
        }
    }
    Ok(best)
}
