//! FedAvg baseline aggregation (no Byzantine tolerance).
//!
//! Standard federated averaging as described by McMahan et al. (2017).
//! Vulnerable to even a single Byzantine client; kept as the comparison
//! baseline Krum is measured against.

use crate::error::FlError;
use crate::model::ModelState;

/// Parameter-wise (optionally weighted) mean across client updates.
pub fn fedavg(updates: &[ModelState], weights: Option<&[f32]>) -> Result<ModelState, FlError> {
    if updates.is_empty() {
        return Err(FlError::EmptyUpdates);
    }
    for u in &updates[1..] {
        if !u.same_layout(&updates[0]) {
            return Err(FlError::DimensionMismatch);
        }
    }

    let (weights, total): (Vec<f32>, f32) = match weights {
        Some(w) => {
            if w.len() != updates.len() {
                return Err(FlError::DimensionMismatch);
            }
            let sum: f32 = w.iter().sum();
            if sum == 0.0 {
                return Err(FlError::EmptyUpdates);
            }
            (w.to_vec(), sum)
        }
        None => (vec![1.0; updates.len()], updates.len() as f32),
    };

    let mut acc = updates[0].clone();
    for p in acc.iter_mut() {
        p.tensor.mapv_inplace(|v| v * weights[0]);
    }
    for (update, &w) in updates.iter().zip(weights.iter()).skip(1) {
        for (dst, src) in acc.iter_mut().zip(update.iter()) {
            dst.tensor.zip_mut_with(&src.tensor, |a, &b| *a += b * w);
        }
    }
    for p in acc.iter_mut() {
        p.tensor.mapv_inplace(|v| v / total);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn test_fedavg_unweighted() {
        let updates = vec![state_of(&[1.0, 2.0]), state_of(&[3.0, 4.0])];
        let avg = fedavg(&updates, None).unwrap();
        assert!((avg.get("w").unwrap()[[0]] - 2.0).abs() < 1e-6);
        assert!((avg.get("w").unwrap()[[1]] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fedavg_weighted() {
        let updates = vec![state_of(&[1.0]), state_of(&[3.0])];
        let avg = fedavg(&updates, Some(&[1.0, 3.0])).unwrap();
        // (1*1 + 3*3) / 4 = 2.5
        assert!((avg.get("w").unwrap()[[0]] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_fedavg_vulnerable_to_single_attacker() {
        let updates = vec![state_of(&[1.0]), state_of(&[1.0]), state_of(&[100.0])];
        let avg = fedavg(&updates, None).unwrap();
        assert!(avg.get("w").unwrap()[[0]] > 10.0);
    }

    #[test]
    fn test_fedavg_error_paths() {
        assert!(matches!(fedavg(&[], None), Err(FlError::EmptyUpdates)));

        let updates = vec![state_of(&[1.0]), state_of(&[2.0])];
        assert!(matches!(
            fedavg(&updates, Some(&[1.0])),
            Err(FlError::DimensionMismatch)
        ));
        assert!(matches!(
            fedavg(&updates, Some(&[0.0, 0.0])),
            Err(FlError::EmptyUpdates)
        ));
    }
}
