//! # cipherfed: dual-path Byzantine-robust federated aggregation
//!
//! cipherfed runs federated learning rounds over a simulated client
//! population with a compromised subset, aggregating client updates with
//! the Krum selection rule twice per round: once in cleartext and once
//! under BFV homomorphic encryption. The encrypted path never decrypts an
//! individual client update: only the n x n scalar distance matrix and the
//! final winner cross the boundary, and a validator checks that the two
//! paths agree numerically.
//!
//! ## Components
//!
//! - [`round::FederatedRun`]: the round controller: sample, collect,
//!   aggregate on both paths, validate, install, evaluate, early-stop.
//! - [`aggregators::krum`] / [`aggregators::encrypted`]: the two Krum
//!   renditions, sharing one scoring core.
//! - [`codec`]: the flatten/reshape bridge between structured model state
//!   and flat ciphertext-compatible vectors.
//! - [`cipher::CipherContext`]: BFV parameters, keys, and the fixed-point
//!   vector codec.
//! - [`stopping::EarlyStopping`]: patience/delta accuracy policy.
//! - [`sim`]: deterministic simulated clients for demos and tests.
//!
//! ## Quick taste
//!
//! ```rust
//! use cipherfed::aggregators::krum;
//! use cipherfed::sim::toy_state;
//!
//! // Four benign updates near the current state, one wild outlier.
//! let mut updates: Vec<_> = (0..4).map(|i| toy_state(1.0 + i as f32 * 0.01)).collect();
//! updates.push(toy_state(500.0));
//!
//! let out = krum::aggregate(&updates, 1).unwrap();
//! assert_ne!(out.selected, 4); // the outlier never wins
//! ```

#![deny(missing_docs)]

pub mod aggregators;
pub mod cipher;
pub mod clients;
pub mod codec;
pub mod config;
pub mod error;
pub mod math;
pub mod metrics;
pub mod model;
pub mod round;
pub mod sampling;
pub mod sim;
pub mod stopping;
pub mod validator;

// Re-exports
pub use aggregators::{fedavg, CipherAggregate, KrumOutcome};
pub use cipher::{CipherConfig, CipherContext};
pub use config::{AggregationMethod, AttackPolicy, RunConfig};
pub use error::FlError;
pub use model::ModelState;
pub use round::{Collaborators, FederatedRun, RunSummary};
pub use stopping::EarlyStopping;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
