//! Run configuration and its resolution into closed enums.
//!
//! The configuration surface is consumed as written by the caller (CLI,
//! file, test); string-typed `method` and `attack_policy` fields are
//! resolved exactly once, before any round executes, so unsupported values
//! fail fast with a typed error instead of aborting mid-run.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlError;

/// Aggregation technique driven by the round controller.
///
/// Krum is the one technique the dual-path run supports; parsing anything
/// else is a configuration error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    /// Distance-based robust selection (Blanchard et al., 2017), run in
    /// cleartext and, when enabled, again under encryption.
    Krum,
}

impl AggregationMethod {
    /// Name used in log lines and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Krum => "krum",
        }
    }
}

impl FromStr for AggregationMethod {
    type Err = FlError;

    fn from_str(s: &str) -> Result<Self, FlError> {
        match s {
            "krum" => Ok(AggregationMethod::Krum),
            other => Err(FlError::UnknownMethod(other.to_string())),
        }
    }
}

/// How compromised clients produce their updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPolicy {
    /// Fabricate a maximally-deviating update directly from global state,
    /// with no local training.
    #[serde(rename = "untarget")]
    Untargeted,
    /// Train locally on poisoned labels; the trained update is the attack.
    #[serde(rename = "labelflip")]
    LabelFlip,
}

impl AttackPolicy {
    /// Name used in log lines and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackPolicy::Untargeted => "untarget",
            AttackPolicy::LabelFlip => "labelflip",
        }
    }
}

impl FromStr for AttackPolicy {
    type Err = FlError;

    fn from_str(s: &str) -> Result<Self, FlError> {
        match s {
            "untarget" => Ok(AttackPolicy::Untargeted),
            "labelflip" => Ok(AttackPolicy::LabelFlip),
            other => Err(FlError::UnknownAttackPolicy(other.to_string())),
        }
    }
}

/// Configuration for one federated run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total client population size.
    pub num_clients: usize,
    /// Fraction of clients selected each round.
    pub frac: f64,
    /// Fraction of the population that is compromised.
    pub c_frac: f64,
    /// Maximum number of rounds.
    pub global_ep: usize,
    /// Minimum accuracy improvement that resets the early-stop counter.
    pub delta: f64,
    /// Rounds of staleness tolerated before stopping.
    pub patience: u32,
    /// Aggregation technique name; must parse (`"krum"`).
    pub method: String,
    /// Attack policy name; must parse (`"untarget"` or `"labelflip"`).
    pub attack_policy: String,
    /// Whether to run the encrypted aggregation path.
    pub cipher_open: bool,
    /// Data-heterogeneity tag carried into metric series names.
    pub alpha: f64,
    /// Seed for the run's random generator.
    pub seed: u64,
    /// Normalized cross-path deviation above which a warning is surfaced.
    pub deviation_tolerance: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_clients: 10,
            frac: 0.5,
            c_frac: 0.3,
            global_ep: 10,
            delta: 0.01,
            patience: 5,
            method: "krum".to_string(),
            attack_policy: "untarget".to_string(),
            cipher_open: false,
            alpha: 0.5,
            seed: 42,
            deviation_tolerance: 1e-3,
        }
    }
}

impl RunConfig {
    /// Resolve the string-typed fields into closed enums.
    ///
    /// The first unrecognized value aborts with a [`FlError`] before any
    /// round state exists.
    pub fn resolve(&self) -> Result<(AggregationMethod, AttackPolicy), FlError> {
        let method = self.method.parse::<AggregationMethod>()?;
        let policy = self.attack_policy.parse::<AttackPolicy>()?;
        Ok((method, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_krum_parses() {
        assert_eq!(
            "krum".parse::<AggregationMethod>().unwrap(),
            AggregationMethod::Krum
        );
    }

    #[test]
    fn test_unknown_method_is_config_error() {
        let err = "fang".parse::<AggregationMethod>().unwrap_err();
        assert!(matches!(err, FlError::UnknownMethod(name) if name == "fang"));
    }

    #[test]
    fn test_attack_policies_parse() {
        assert_eq!(
            "untarget".parse::<AttackPolicy>().unwrap(),
            AttackPolicy::Untargeted
        );
        assert_eq!(
            "labelflip".parse::<AttackPolicy>().unwrap(),
            AttackPolicy::LabelFlip
        );
        assert!("grad_ascent".parse::<AttackPolicy>().is_err());
    }

    #[test]
    fn test_resolve_reports_offending_value() {
        let cfg = RunConfig {
            method: "median".to_string(),
            ..RunConfig::default()
        };
        let msg = cfg.resolve().unwrap_err().to_string();
        assert!(msg.contains("median"), "diagnostic must name the value: {msg}");
    }

    #[test]
    fn test_config_serde_round_trip() {
        let cfg = RunConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_clients, cfg.num_clients);
        assert_eq!(back.method, cfg.method);
    }
}
