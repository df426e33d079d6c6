//! Flatten/reshape codec between [`ModelState`] and flat vectors.
//!
//! `flatten` walks parameters in insertion order and concatenates each
//! tensor's elements row-major. `reshape` is its inverse given a template
//! state that supplies the parameter order and shapes.
//!
//! Round-trip law: `reshape(&flatten(s), s) == s` element-for-element.

use ndarray::ArrayD;

use crate::error::FlError;
use crate::model::ModelState;

/// Flatten a state into one contiguous vector in codec order.
pub fn flatten(state: &ModelState) -> Vec<f32> {
    let mut out = Vec::with_capacity(state.numel());
    for p in state.iter() {
        out.extend(p.tensor.iter().copied());
    }
    out
}

/// Rebuild a state from a flat vector using `template` for order and shapes.
///
/// Fails with [`FlError::ShapeMismatch`] if the vector length does not equal
/// the template's total element count.
pub fn reshape(flat: &[f32], template: &ModelState) -> Result<ModelState, FlError> {
    let expected = template.numel();
    if flat.len() != expected {
        return Err(FlError::ShapeMismatch {
            expected,
            actual: flat.len(),
        });
    }

    let mut out = ModelState::new();
    let mut offset = 0;
    for p in template.iter() {
        let numel = p.tensor.len();
        let segment = flat[offset..offset + numel].to_vec();
        let tensor = ArrayD::from_shape_vec(p.tensor.raw_dim(), segment)?;
        out.push(p.name.clone(), tensor);
        offset += numel;
    }
    Ok(out)
}
