//! Cross-path correctness validation.
//!
//! Compares the plaintext aggregate against the decrypted-and-reshaped
//! encrypted aggregate. The metric is a normalized mean per-element
//! deviation: per shared parameter `||plain - cipher||_2 / numel`, summed
//! over parameters and divided by the parameter count.
//!
//! This is a diagnostic signal only; it never blocks round progression.

use crate::error::FlError;
use crate::math::l2_norm;
use crate::model::ModelState;

/// Normalized deviation between two layout-identical states.
pub fn normalized_deviation(plain: &ModelState, cipher: &ModelState) -> Result<f64, FlError> {
    if !plain.same_layout(cipher) {
        return Err(FlError::DimensionMismatch);
    }
    if plain.is_empty() {
        return Ok(0.0);
    }

    let mut total = 0.0f64;
    for (p, c) in plain.iter().zip(cipher.iter()) {
        let diff: Vec<f32> = p
            .tensor
            .iter()
            .zip(c.tensor.iter())
            .map(|(a, b)| a - b)
            .collect();
        total += f64::from(l2_norm(&diff)) / p.tensor.len().max(1) as f64;
    }
    Ok(total / plain.len() as f64)
}
