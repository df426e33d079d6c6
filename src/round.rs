//! Round orchestration: sample, collect updates, aggregate on both paths,
//! validate, install, evaluate, early-stop.
//!
//! The controller owns the global model state exclusively. Collaborators
//! see read-only snapshots and return owned updates; exactly one round's
//! aggregate is installed before the next round's sampling begins.
//!
//! Configuration and encryption-context failures abort before any round
//! state is mutated. Per-round fatal errors abort mid-loop but preserve
//! everything already logged.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::aggregators::{encrypted, krum};
use crate::cipher::{CipherConfig, CipherContext};
use crate::clients::{Attack, Evaluator, Trainer};
use crate::codec;
use crate::config::{AggregationMethod, AttackPolicy, RunConfig};
use crate::error::FlError;
use crate::metrics::{MetricsSink, SeriesTags};
use crate::model::ModelState;
use crate::sampling::{draw_round, ClientRoster};
use crate::stopping::EarlyStopping;
use crate::validator;

/// Append-only destination for the per-round log line.
pub trait RoundLog: Send {
    /// Append one line (newline added by the sink).
    fn append(&mut self, line: &str) -> Result<(), FlError>;
}

/// Log sink appending to a text file.
pub struct FileRoundLog {
    path: PathBuf,
}

impl FileRoundLog {
    /// Append to `path`, creating the file on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Conventional log file name for a run.
    pub fn default_name(cipher_open: bool, tag: &str, seed: u64) -> String {
        if cipher_open {
            format!("log_cipher_{tag}_{seed}.txt")
        } else {
            format!("log_{tag}_{seed}.txt")
        }
    }
}

impl RoundLog for FileRoundLog {
    fn append(&mut self, line: &str) -> Result<(), FlError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// In-memory log sink for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryRoundLog {
    lines: Vec<String>,
}

impl MemoryRoundLog {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines appended so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl RoundLog for MemoryRoundLog {
    fn append(&mut self, line: &str) -> Result<(), FlError> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

impl<L: RoundLog> RoundLog for std::sync::Arc<std::sync::Mutex<L>> {
    fn append(&mut self, line: &str) -> Result<(), FlError> {
        self.lock()
            .map_err(|_| FlError::Collaborator("poisoned log sink lock".into()))?
            .append(line)
    }
}

/// Format to 4 significant digits, trailing zeros trimmed (but at least one
/// digit after the point), matching the round-log convention.
pub fn format_sig4(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value:.1}");
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (3 - magnitude).max(1) as usize;
    let mut s = format!("{value:.decimals$}");
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    s
}

/// External collaborators wired into a run.
pub struct Collaborators {
    /// Benign local trainer.
    pub trainer: Box<dyn Trainer>,
    /// Trainer used by compromised clients under non-fabricating policies.
    pub malicious_trainer: Box<dyn Trainer>,
    /// Direct fabrication attack.
    pub attack: Box<dyn Attack>,
    /// Held-out test evaluator.
    pub evaluator: Box<dyn Evaluator>,
}

/// Everything observed in one round.
#[derive(Clone, Debug)]
pub struct RoundRecord {
    /// Round number, 0-indexed.
    pub round: usize,
    /// Participants this round.
    pub participants: usize,
    /// Byzantine bound handed to the aggregators.
    pub nominal_bound: usize,
    /// Selected ids that fall in the fixed compromised roster.
    pub realized_compromised: usize,
    /// Winner index on the plaintext path.
    pub selected_plain: usize,
    /// Winner index on the encrypted path, if it ran.
    pub selected_cipher: Option<usize>,
    /// Plaintext aggregation wall-clock seconds.
    pub plain_secs: f64,
    /// Encrypted aggregation wall-clock seconds, if it ran.
    pub cipher_secs: Option<f64>,
    /// Normalized cross-path deviation, if the encrypted path ran.
    pub deviation: Option<f64>,
    /// Post-round test accuracy.
    pub accuracy: f64,
    /// Post-round test loss.
    pub loss: f64,
}

/// Outcome of a completed (or early-stopped) run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// One record per executed round.
    pub records: Vec<RoundRecord>,
    /// Whether the early-stopping policy terminated the loop.
    pub early_stopped: bool,
}

impl RunSummary {
    /// Accuracy after the last executed round.
    pub fn final_accuracy(&self) -> Option<f64> {
        self.records.last().map(|r| r.accuracy)
    }
}

/// The round controller. Owns the global state for the whole run.
pub struct FederatedRun {
    config: RunConfig,
    method: AggregationMethod,
    policy: AttackPolicy,
    global: ModelState,
    roster: ClientRoster,
    rng: StdRng,
    cipher: Option<CipherContext>,
    collab: Collaborators,
    log: Box<dyn RoundLog>,
    metrics: Box<dyn MetricsSink>,
    stopping: EarlyStopping,
}

impl FederatedRun {
    /// Build a run with the default encryption profile.
    ///
    /// Resolves the method and attack-policy names and, when the encrypted
    /// path is enabled, initializes the encryption context, all before any
    /// round executes. Any failure here leaves no round state behind.
    pub fn new(
        config: RunConfig,
        initial: ModelState,
        collab: Collaborators,
        log: Box<dyn RoundLog>,
        metrics: Box<dyn MetricsSink>,
    ) -> Result<Self, FlError> {
        Self::with_profile(config, CipherConfig::default(), initial, collab, log, metrics)
    }

    /// Build a run with an explicit encryption profile.
    pub fn with_profile(
        config: RunConfig,
        profile: CipherConfig,
        initial: ModelState,
        collab: Collaborators,
        log: Box<dyn RoundLog>,
        metrics: Box<dyn MetricsSink>,
    ) -> Result<Self, FlError> {
        let (method, policy) = config.resolve()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let roster = ClientRoster::new(config.num_clients, config.c_frac, &mut rng);

        let cipher = if config.cipher_open {
            Some(CipherContext::init(profile)?)
        } else {
            None
        };

        let stopping = EarlyStopping::new(config.delta, config.patience);

        Ok(Self {
            config,
            method,
            policy,
            global: initial,
            roster,
            rng,
            cipher,
            collab,
            log,
            metrics,
            stopping,
        })
    }

    /// Current global model state.
    pub fn global_state(&self) -> &ModelState {
        &self.global
    }

    /// Ids fixed as compromised at startup.
    pub fn compromised_ids(&self) -> Vec<usize> {
        self.roster.compromised_ids()
    }

    /// Execute up to `global_ep` rounds.
    pub fn run(&mut self) -> Result<RunSummary, FlError> {
        let tags = SeriesTags {
            method: self.method,
            attack_policy: self.policy,
            c_frac: self.config.c_frac,
            alpha: self.config.alpha,
        };
        let acc_series = tags.accuracy_series();
        let loss_series = tags.loss_series();

        let mut records = Vec::new();
        let mut early_stopped = false;

        for round in 0..self.config.global_ep {
            let selection = draw_round(
                &self.roster,
                self.config.frac,
                self.config.c_frac,
                &mut self.rng,
            )?;
            debug!(
                round,
                participants = selection.participants.len(),
                nominal_bound = selection.nominal_bound,
                realized = selection.realized_compromised,
                "sampled round participants"
            );

            let updates = self.collect_updates(&selection.participants)?;
            let bound = selection.nominal_bound;

            let plain_start = Instant::now();
            let plain = krum::aggregate(&updates, bound)?;
            let plain_secs = plain_start.elapsed().as_secs_f64();
            info!(round, selected = plain.selected, secs = plain_secs, "plaintext krum");

            let mut selected_cipher = None;
            let mut cipher_secs = None;
            let mut deviation = None;

            let winner = if let Some(ctx) = &self.cipher {
                let cipher_start = Instant::now();
                let cipher_out = encrypted::aggregate(ctx, &updates, bound)?;
                let secs = cipher_start.elapsed().as_secs_f64();
                info!(round, selected = cipher_out.selected, secs, "encrypted krum");

                // Reshape the decrypted flat winner using the plaintext
                // aggregate as the template.
                let cipher_state = codec::reshape(&cipher_out.flat, &plain.state)?;
                let dev = validator::normalized_deviation(&plain.state, &cipher_state)?;
                if dev > self.config.deviation_tolerance {
                    warn!(
                        round,
                        deviation = dev,
                        tolerance = self.config.deviation_tolerance,
                        "cross-path deviation above tolerance"
                    );
                }

                selected_cipher = Some(cipher_out.selected);
                cipher_secs = Some(secs);
                deviation = Some(dev);
                cipher_state
            } else {
                plain.state.clone()
            };

            // Install the winning aggregate; the only mutation of global
            // state in the system.
            self.global = winner;

            let (accuracy, loss) = self.collab.evaluator.evaluate(&self.global)?;

            self.log.append(&format!(
                "==> EP: {round}, Test acc: {}",
                format_sig4(accuracy)
            ))?;
            self.metrics.record(&acc_series, round, accuracy);
            self.metrics.record(&loss_series, round, loss);

            records.push(RoundRecord {
                round,
                participants: selection.participants.len(),
                nominal_bound: bound,
                realized_compromised: selection.realized_compromised,
                selected_plain: plain.selected,
                selected_cipher,
                plain_secs,
                cipher_secs,
                deviation,
                accuracy,
                loss,
            });

            if self.stopping.observe(accuracy) {
                info!(round, "early stopped federated training");
                early_stopped = true;
                break;
            }
        }

        Ok(RunSummary {
            records,
            early_stopped,
        })
    }

    fn collect_updates(&mut self, participants: &[usize]) -> Result<Vec<ModelState>, FlError> {
        let mut updates = Vec::with_capacity(participants.len());
        for &id in participants {
            let update = if self.roster.is_compromised(id) {
                match self.policy {
                    AttackPolicy::Untargeted => self.collab.attack.fabricate(&self.global, id)?,
                    AttackPolicy::LabelFlip => {
                        self.collab.malicious_trainer.train(&self.global, id)?
                    }
                }
            } else {
                self.collab.trainer.train(&self.global, id)?
            };
            updates.push(update);
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sig4() {
        assert_eq!(format_sig4(0.5123456), "0.5123");
        assert_eq!(format_sig4(0.5), "0.5");
        assert_eq!(format_sig4(0.05123456), "0.05123");
        assert_eq!(format_sig4(1.0), "1.0");
        assert_eq!(format_sig4(0.0), "0.0");
        assert_eq!(format_sig4(0.9999), "0.9999");
    }

    #[test]
    fn test_memory_log_appends_in_order() {
        let mut log = MemoryRoundLog::new();
        log.append("a").unwrap();
        log.append("b").unwrap();
        assert_eq!(log.lines(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_default_log_names() {
        assert_eq!(
            FileRoundLog::default_name(true, "sim", 42),
            "log_cipher_sim_42.txt"
        );
        assert_eq!(FileRoundLog::default_name(false, "sim", 42), "log_sim_42.txt");
    }
}
