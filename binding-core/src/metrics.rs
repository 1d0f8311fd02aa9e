//! Per-binding metrics store and Prometheus exporter

use crate::Result;
use dashmap::DashMap;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};

/// Accumulated counters of one binding + source kind + target kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// `{binding}-{source_kind}-{target_kind}`
    pub key: String,
    /// Binding name
    pub binding: String,
    /// Source connector kind
    pub source_kind: String,
    /// Target connector kind
    pub target_kind: String,
    /// Logical requests
    pub request_count: u64,
    /// Request payload bytes
    pub request_volume: u64,
    /// Successful responses
    pub response_count: u64,
    /// Response payload bytes
    pub response_volume: u64,
    /// Failed requests
    pub errors_count: u64,
}

impl Report {
    /// Empty report for a binding
    pub fn new(
        binding: impl Into<String>,
        source_kind: impl Into<String>,
        target_kind: impl Into<String>,
    ) -> Self {
        let binding = binding.into();
        let source_kind = source_kind.into();
        let target_kind = target_kind.into();
        Self {
            key: format!("{}-{}-{}", binding, source_kind, target_kind),
            binding,
            source_kind,
            target_kind,
            ..Default::default()
        }
    }

    /// Same identity, zero counters
    pub fn empty(&self) -> Self {
        Self {
            key: self.key.clone(),
            binding: self.binding.clone(),
            source_kind: self.source_kind.clone(),
            target_kind: self.target_kind.clone(),
            ..Default::default()
        }
    }

    /// Add another report's counters into this one
    pub fn merge(&mut self, other: &Report) {
        self.request_count = self.request_count.saturating_add(other.request_count);
        self.request_volume = self.request_volume.saturating_add(other.request_volume);
        self.response_count = self.response_count.saturating_add(other.response_count);
        self.response_volume = self.response_volume.saturating_add(other.response_volume);
        self.errors_count = self.errors_count.saturating_add(other.errors_count);
    }

    fn labels(&self) -> [&str; 3] {
        [&self.binding, &self.source_kind, &self.target_kind]
    }
}

/// Concurrent key -> report map
#[derive(Debug, Default)]
pub struct MetricsStore {
    reports: DashMap<String, Report>,
}

impl MetricsStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `report` into the entry for its key, inserting a copy if absent
    pub fn add(&self, report: &Report) {
        self.reports
            .entry(report.key.clone())
            .and_modify(|existing| existing.merge(report))
            .or_insert_with(|| report.clone());
    }

    /// Report for key
    pub fn get(&self, key: &str) -> Option<Report> {
        self.reports.get(key).map(|r| r.value().clone())
    }

    /// Snapshot of all reports, sorted by key
    pub fn list(&self) -> Vec<Report> {
        let mut reports: Vec<Report> = self.reports.iter().map(|r| r.value().clone()).collect();
        reports.sort_by(|a, b| a.key.cmp(&b.key));
        reports
    }

    /// Zero the counters of key; returns whether it existed
    pub fn clear(&self, key: &str) -> bool {
        match self.reports.get_mut(key) {
            Some(mut entry) => {
                let reset = entry.empty();
                *entry = reset;
                true
            }
            None => false,
        }
    }
}

/// Store plus Prometheus counters, shared by every binding of a service
pub struct MetricsExporter {
    store: MetricsStore,
    registry: Registry,
    requests_count: IntCounterVec,
    requests_volume: IntCounterVec,
    responses_count: IntCounterVec,
    responses_volume: IntCounterVec,
    errors_count: IntCounterVec,
}

const LABELS: [&str; 3] = ["binding", "source_kind", "target_kind"];

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help).namespace("bridges"), &LABELS)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl MetricsExporter {
    /// Create exporter with its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        Ok(Self {
            requests_count: counter(&registry, "requests_count", "Requests handled per binding")?,
            requests_volume: counter(&registry, "requests_volume", "Request payload bytes per binding")?,
            responses_count: counter(&registry, "responses_count", "Successful responses per binding")?,
            responses_volume: counter(&registry, "responses_volume", "Response payload bytes per binding")?,
            errors_count: counter(&registry, "errors_count", "Failed requests per binding")?,
            store: MetricsStore::new(),
            registry,
        })
    }

    /// Record a delta report
    pub fn report(&self, report: &Report) {
        self.store.add(report);

        let labels = report.labels();
        let pairs = [
            (&self.requests_count, report.request_count),
            (&self.requests_volume, report.request_volume),
            (&self.responses_count, report.response_count),
            (&self.responses_volume, report.response_volume),
            (&self.errors_count, report.errors_count),
        ];
        for (counter, value) in pairs {
            if value > 0 {
                counter.with_label_values(&labels).inc_by(value);
            }
        }
    }

    /// Report for key
    pub fn get(&self, key: &str) -> Option<Report> {
        self.store.get(key)
    }

    /// All reports
    pub fn list(&self) -> Vec<Report> {
        self.store.list()
    }

    /// Reset a key's counters in the store and drop its exported series
    pub fn clear(&self, key: &str) -> bool {
        let Some(report) = self.store.get(key) else {
            return false;
        };
        let labels = report.labels();
        for counter in [
            &self.requests_count,
            &self.requests_volume,
            &self.responses_count,
            &self.responses_volume,
            &self.errors_count,
        ] {
            let _ = counter.remove_label_values(&labels);
        }
        self.store.clear(key)
    }

    /// Underlying store
    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// Prometheus text exposition of all counters
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
