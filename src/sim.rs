//! Deterministic simulation harness: trainer, attack, and evaluator
//! implementations used by the demos and the integration tests.
//!
//! The "training task" is synthetic: a hidden target state plays the role
//! of the loss minimum. Benign clients step toward it with seeded per-client
//! noise, label-flip clients step away from it, and the untargeted attack
//! fabricates an amplified sign-flip of the current state. Accuracy is a
//! monotone function of the distance to the target, so a healthy run shows
//! rising accuracy and a poisoned aggregate shows a collapse.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clients::{Attack, Evaluator, Trainer};
use crate::codec;
use crate::error::FlError;
use crate::math::l2_norm;
use crate::model::ModelState;

fn per_client_rng(seed: u64, client_id: usize) -> StdRng {
    // Splitmix-style mix so adjacent client ids land far apart.
    let mut z = seed ^ (client_id as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    StdRng::seed_from_u64(z ^ (z >> 31))
}

/// Simulated local trainer stepping toward (or away from) a target state.
pub struct SimTrainer {
    target: ModelState,
    step: f32,
    noise: f32,
    seed: u64,
    /// +1.0 for benign descent, -1.0 for label-flip ascent.
    direction: f32,
}

impl SimTrainer {
    /// Benign trainer: steps toward the target.
    pub fn benign(target: ModelState, step: f32, noise: f32, seed: u64) -> Self {
        Self {
            target,
            step,
            noise,
            seed,
            direction: 1.0,
        }
    }

    /// Label-flip trainer: steps away from the target, as if trained on
    /// poisoned labels.
    pub fn label_flip(target: ModelState, step: f32, noise: f32, seed: u64) -> Self {
        Self {
            target,
            step,
            noise,
            seed,
            direction: -1.0,
        }
    }
}

impl Trainer for SimTrainer {
    fn train(&self, snapshot: &ModelState, client_id: usize) -> Result<ModelState, FlError> {
        let mut rng = per_client_rng(self.seed, client_id);
        let mut update = snapshot.clone();
        for (p, t) in update.iter_mut().zip(self.target.iter()) {
            if p.tensor.shape() != t.tensor.shape() {
                return Err(FlError::DimensionMismatch);
            }
            for (w, goal) in p.tensor.iter_mut().zip(t.tensor.iter()) {
                let jitter = rng.gen_range(-self.noise..=self.noise);
                *w += self.direction * self.step * (goal - *w) + jitter;
            }
        }
        Ok(update)
    }
}

/// Untargeted attack: amplified sign flip of the current global state.
pub struct SignFlipAttack {
    scale: f32,
    noise: f32,
    seed: u64,
}

impl SignFlipAttack {
    /// `scale` controls how far the fabricated update deviates.
    pub fn new(scale: f32, noise: f32, seed: u64) -> Self {
        Self { scale, noise, seed }
    }
}

impl Attack for SignFlipAttack {
    fn fabricate(&self, snapshot: &ModelState, client_id: usize) -> Result<ModelState, FlError> {
        let mut rng = per_client_rng(self.seed, client_id);
        let mut update = snapshot.clone();
        for p in update.iter_mut() {
            for w in p.tensor.iter_mut() {
                *w = -self.scale * *w + rng.gen_range(-self.noise..=self.noise);
            }
        }
        Ok(update)
    }
}

/// Evaluator scoring a state by its distance to the hidden target.
pub struct DistanceEvaluator {
    target: ModelState,
}

impl DistanceEvaluator {
    /// Evaluate against the given target state.
    pub fn new(target: ModelState) -> Self {
        Self { target }
    }
}

impl Evaluator for DistanceEvaluator {
    fn evaluate(&self, state: &ModelState) -> Result<(f64, f64), FlError> {
        if !state.same_layout(&self.target) {
            return Err(FlError::DimensionMismatch);
        }
        let a = codec::flatten(state);
        let b = codec::flatten(&self.target);
        let diff: Vec<f32> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
        let dist = l2_norm(&diff) as f64;
        let loss = dist * dist / diff.len().max(1) as f64;
        let accuracy = 1.0 / (1.0 + loss);
        Ok((accuracy, loss))
    }
}

/// Convenience: a small two-layer state for demos and tests.
pub fn toy_state(fill: f32) -> ModelState {
    let mut s = ModelState::new();
    s.push(
        "dense.weight",
        ndarray::ArrayD::from_elem(ndarray::IxDyn(&[4, 3]), fill),
    );
    s.push(
        "dense.bias",
        ndarray::ArrayD::from_elem(ndarray::IxDyn(&[4]), fill * 0.5),
    );
    s
}
