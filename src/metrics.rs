//! Metrics emission behind a sink seam.
//!
//! Two named time series are emitted per run, accuracy and loss, keyed by
//! `(method, attack_policy, compromise fraction, alpha)`.

use std::collections::BTreeMap;

use crate::config::{AggregationMethod, AttackPolicy};

/// Tag set identifying a run's series.
#[derive(Clone, Debug)]
pub struct SeriesTags {
    /// Aggregation technique.
    pub method: AggregationMethod,
    /// Attack policy.
    pub attack_policy: AttackPolicy,
    /// Compromise fraction `c_frac`.
    pub c_frac: f64,
    /// Data-heterogeneity parameter.
    pub alpha: f64,
}

impl SeriesTags {
    /// Accuracy series name, e.g. `testacc/krum_untarget_cfrac_0.3_alpha_0.5`.
    pub fn accuracy_series(&self) -> String {
        format!(
            "testacc/{}_{}_cfrac_{}_alpha_{}",
            self.method.as_str(),
            self.attack_policy.as_str(),
            self.c_frac,
            self.alpha
        )
    }

    /// Loss series name.
    pub fn loss_series(&self) -> String {
        format!(
            "testloss/{}_{}_cfrac_{}_alpha_{}",
            self.method.as_str(),
            self.attack_policy.as_str(),
            self.c_frac,
            self.alpha
        )
    }
}

/// Destination for per-round metric points.
pub trait MetricsSink: Send {
    /// Record one `(round, value)` point on a named series.
    fn record(&mut self, series: &str, round: usize, value: f64);
}

/// In-memory sink; also the test double.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetrics {
    series: BTreeMap<String, Vec<(usize, f64)>>,
}

impl MemoryMetrics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Points recorded on a series, in emission order.
    pub fn points(&self, series: &str) -> &[(usize, f64)] {
        self.series.get(series).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of all series touched so far.
    pub fn series_names(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }
}

impl MetricsSink for MemoryMetrics {
    fn record(&mut self, series: &str, round: usize, value: f64) {
        self.series
            .entry(series.to_string())
            .or_default()
            .push((round, value));
    }
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn record(&mut self, _series: &str, _round: usize, _value: f64) {}
}

impl<M: MetricsSink> MetricsSink for std::sync::Arc<std::sync::Mutex<M>> {
    fn record(&mut self, series: &str, round: usize, value: f64) {
        if let Ok(mut sink) = self.lock() {
            sink.record(series, round, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_names_follow_tag_shape() {
        let tags = SeriesTags {
            method: AggregationMethod::Krum,
            attack_policy: AttackPolicy::Untargeted,
            c_frac: 0.3,
            alpha: 0.5,
        };
        assert_eq!(
            tags.accuracy_series(),
            "testacc/krum_untarget_cfrac_0.3_alpha_0.5"
        );
        assert_eq!(
            tags.loss_series(),
            "testloss/krum_untarget_cfrac_0.3_alpha_0.5"
        );
    }

    #[test]
    fn test_memory_sink_preserves_order() {
        let mut sink = MemoryMetrics::new();
        sink.record("acc", 0, 0.5);
        sink.record("acc", 1, 0.6);
        sink.record("loss", 0, 1.2);
        assert_eq!(sink.points("acc"), &[(0, 0.5), (1, 0.6)]);
        assert_eq!(sink.points("loss"), &[(0, 1.2)]);
        assert!(sink.points("missing").is_empty());
    }
}
