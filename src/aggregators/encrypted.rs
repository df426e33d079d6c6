//! Encrypted Krum: the same selection rule as the plaintext path, computed
//! without decrypting any individual client update until the winner.
//!
//! Pipeline per invocation:
//!
//! 1. Flatten and quantize every update under one shared fixed-point scale.
//! 2. Encrypt each quantized vector independently (forward + reversed
//!    coefficient packings).
//! 3. Compute all pairwise squared distances homomorphically, one
//!    ciphertext-ciphertext multiplication per pair, in parallel across
//!    the pair set.
//! 4. Decrypt only the n x n scalar distance matrix and run the shared
//!    Krum scoring on it. No d-dimensional value is ever decrypted here.
//! 5. Decrypt the winning ciphertext once, at the boundary, and dequantize
//!    it into a flat vector in codec order.
//!
//! The public contract is a single synchronous call; parallelism over the
//! accelerator pool is internal. Calls for different rounds never overlap
//! because the round controller is strictly sequential.

use ndarray::Array2;
use rayon::prelude::*;

use crate::cipher::{CipherContext, EncryptedUpdate};
use crate::codec;
use crate::error::FlError;
use crate::model::ModelState;

use super::{check_krum_bound, krum_scores, select_from_distances};

/// Result of one encrypted Krum invocation.
#[derive(Clone, Debug)]
pub struct CipherAggregate {
    /// Index of the winning update in the input list.
    pub selected: usize,
    /// The winner as a flat vector in codec order, dequantized.
    pub flat: Vec<f32>,
    /// Closeness score per candidate, from the decrypted distance matrix.
    pub scores: Vec<f64>,
}

/// Run Krum over encrypted updates with byzantine bound `f`.
///
/// Fails before any ciphertext work if the participation bound is violated
/// or the flat vectors disagree on dimension; any scheme-level error is
/// fatal for the round (no degraded aggregate is produced).
pub fn aggregate(
    ctx: &CipherContext,
    updates: &[ModelState],
    f: usize,
) -> Result<CipherAggregate, FlError> {
    if updates.is_empty() {
        return Err(FlError::EmptyUpdates);
    }
    let n = updates.len();
    check_krum_bound(n, f)?;

    let flats: Vec<Vec<f32>> = updates.iter().map(codec::flatten).collect();
    let dim = flats[0].len();
    for flat in &flats[1..] {
        if flat.len() != dim {
            return Err(FlError::ShapeMismatch {
                expected: dim,
                actual: flat.len(),
            });
        }
    }

    let scale = ctx.scale_for_dimension(dim)?;

    // Each update is encrypted independently before any arithmetic.
    let encrypted: Vec<EncryptedUpdate> = flats
        .par_iter()
        .map(|flat| ctx.encrypt_update(&scale.quantize(flat)))
        .collect::<Result<_, _>>()?;

    // O(n^2) pairwise ciphertext work, spread across the pool.
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let pair_distances: Vec<((usize, usize), f64)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let ct = ctx.pair_distance(&encrypted[i], &encrypted[j])?;
            let raw = ctx.decrypt_distance(&ct, dim)?;
            Ok(((i, j), scale.distance_from_raw(raw)))
        })
        .collect::<Result<_, FlError>>()?;

    let mut distances = Array2::zeros((n, n));
    for ((i, j), d) in pair_distances {
        distances[[i, j]] = d;
        distances[[j, i]] = d;
    }

    let scores = krum_scores(&distances, f)?;
    let selected = select_from_distances(&distances, f)?;

    let winner = ctx.decrypt_update(&encrypted[selected])?;
    Ok(CipherAggregate {
        selected,
        flat: scale.dequantize(&winner),
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherConfig;
    use ndarray::ArrayD;

    fn state_of(values: &[f32]) -> ModelState {
        let mut s = ModelState::new();
        s.push(
            "w",
            ArrayD::from_shape_vec(ndarray::IxDyn(&[values.len()]), values.to_vec()).unwrap(),
        );
        s
    }

    #[test]
    fn test_encrypted_krum_selects_honest_and_matches_plaintext() {
        let ctx = CipherContext::init(CipherConfig::compact()).unwrap();
        let updates = vec![
            state_of(&[1.0, 1.1, 0.9]),
            state_of(&[0.9, 1.0, 1.1]),
            state_of(&[1.05, 0.95, 1.0]),
            state_of(&[1.0, 1.0, 1.0]),
            state_of(&[-7.5, 7.5, -7.5]), // byzantine, inside the clip range
        ];

        let plain = crate::aggregators::krum::aggregate(&updates, 1).unwrap();
        let cipher = aggregate(&ctx, &updates, 1).unwrap();

        assert_eq!(cipher.selected, plain.selected);
        assert_ne!(cipher.selected, 4);

        let plain_flat = codec::flatten(&plain.state);
        for (p, c) in plain_flat.iter().zip(cipher.flat.iter()) {
            assert!((p - c).abs() < 1e-2, "plain {p} vs cipher {c}");
        }
    }

    #[test]
    fn test_encrypted_krum_bound_violation_precedes_crypto_work() {
        let ctx = CipherContext::init(CipherConfig::compact()).unwrap();
        let updates = vec![state_of(&[1.0]), state_of(&[1.1]), state_of(&[0.9])];
        // n=3, f=1 -> needs n > 4.
        assert!(matches!(
            aggregate(&ctx, &updates, 1),
            Err(FlError::InsufficientHonestClients { .. })
        ));
    }

    #[test]
    fn test_encrypted_krum_rejects_mixed_dimensions() {
        let ctx = CipherContext::init(CipherConfig::compact()).unwrap();
        let updates = vec![
            state_of(&[1.0, 2.0]),
            state_of(&[1.0]),
            state_of(&[1.0, 2.0]),
            state_of(&[1.0, 2.0]),
            state_of(&[1.0, 2.0]),
        ];
        assert!(matches!(
            aggregate(&ctx, &updates, 1),
            Err(FlError::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
