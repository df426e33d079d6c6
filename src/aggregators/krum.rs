//! Plaintext Krum aggregation (Blanchard et al., 2017).
//!
//! Krum is a selection rule, not an average: the winner is the update whose
//! summed distance to its `n - f - 2` nearest neighbors is smallest. The
//! result depends only on the multiset of updates and `f`; input order
//! matters only for breaking exact score ties (lowest index wins).
//!
//! Distances are accumulated in f64 over one contiguous flat vector per
//! update. O(n^2 d) overall, parallelized across candidates.

use ndarray::Array2;
use rayon::prelude::*;

use crate::codec;
use crate::error::FlError;
use crate::model::ModelState;

use super::{krum_scores, select_from_distances};

/// Result of one plaintext Krum invocation.
#[derive(Clone, Debug)]
pub struct KrumOutcome {
    /// Index of the winning update in the input list.
    pub selected: usize,
    /// The winning update itself (owned copy).
    pub state: ModelState,
    /// Closeness score per candidate.
    pub scores: Vec<f64>,
}

/// Squared Euclidean distance, f64 accumulation.
fn dist_sq(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum()
}

/// Pairwise squared distances between flat vectors.
pub(crate) fn pairwise_sq_distances(flats: &[Vec<f32>]) -> Array2<f64> {
    let n = flats.len();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| if i == j { 0.0 } else { dist_sq(&flats[i], &flats[j]) })
                .collect()
        })
        .collect();

    let mut m = Array2::zeros((n, n));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, v) in row.into_iter().enumerate() {
            m[[i, j]] = v;
        }
    }
    m
}

/// Run Krum over cleartext updates with byzantine bound `f`.
///
/// Requires `n > 2f + 2` ([`FlError::InsufficientHonestClients`] otherwise)
/// and layout-identical updates.
pub fn aggregate(updates: &[ModelState], f: usize) -> Result<KrumOutcome, FlError> {
    if updates.is_empty() {
        return Err(FlError::EmptyUpdates);
    }
    for u in &updates[1..] {
        if !u.same_layout(&updates[0]) {
            return Err(FlError::DimensionMismatch);
        }
    }

    let flats: Vec<Vec<f32>> = updates.iter().map(codec::flatten).collect();
    let distances = pairwise_sq_distances(&flats);
    let scores = krum_scores(&distances, f)?;
    let selected = select_from_distances(&distances, f)?;

    Ok(KrumOutcome {
        selected,
        state: updates[selected].clone(),
        scores,
    })
}
