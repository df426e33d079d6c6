//! Ordered model state: the global model as a sequence of named tensors.
//!
//! Parameter order is fixed at construction and never changes afterwards.
//! That order is the contract the flatten/reshape codec relies on: two
//! states built from the same template produce flat vectors whose elements
//! line up position by position.
//!
//! `ModelState` has value semantics. `Clone` is the snapshot operation:
//! every collaborator receives either a shared read-only borrow or its own
//! owned copy, so no client update can alias the coordinator's state.

use ndarray::ArrayD;

/// One named parameter tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Parameter name (e.g. `"conv1.weight"`).
    pub name: String,
    /// Tensor values, any dimensionality, row-major.
    pub tensor: ArrayD<f32>,
}

/// Ordered mapping from parameter name to tensor.
///
/// Insertion order is stable and defines the flattening order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelState {
    params: Vec<Param>,
}

impl ModelState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Append a parameter. Order of insertion is the codec order.
    pub fn push(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        self.params.push(Param {
            name: name.into(),
            tensor,
        });
    }

    /// Iterate parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Iterate parameters mutably, preserving order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.params.iter_mut()
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.tensor)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the state has no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of scalar elements across all parameters.
    pub fn numel(&self) -> usize {
        self.params.iter().map(|p| p.tensor.len()).sum()
    }

    /// Whether `other` has the same parameter names, in the same order,
    /// with the same shapes.
    pub fn same_layout(&self, other: &ModelState) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.name == b.name && a.tensor.shape() == b.tensor.shape())
    }
}
