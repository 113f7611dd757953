//! Excluded items and retrieval accuracy metrics.
//!
//! Users can mark retrieved items as irrelevant for an incident; the
//! orchestrator strips excluded items from every subsequent context. The
//! same store aggregates accuracy per category:
//! `accuracy = 100 * (returned - excluded) / max(returned, 1)`, with the
//! overall figure weighted by `returned`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::ExcludedItem;

/// Retrieval categories tracked for accuracy.
pub const CATEGORIES: &[&str] = &[
    "similar_incidents",
    "knowledge_documents",
    "changes",
    "logs",
    "events",
];

/// Map an excluded-item `kind` onto its accuracy category.
pub fn category_for_kind(kind: &str) -> Option<&'static str> {
    match kind {
        "similar_incident" | "similar_incidents" => Some("similar_incidents"),
        "knowledge_document" | "knowledge_documents" | "document" => Some("knowledge_documents"),
        "change" | "changes" => Some("changes"),
        "log" | "logs" => Some("logs"),
        "event" | "events" => Some("events"),
        _ => None,
    }
}

/// Accuracy numbers for one category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryAccuracy {
    pub returned: u64,
    pub excluded: u64,
    pub accuracy: f64,
}

/// Accuracy report across all categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub categories: BTreeMap<String, CategoryAccuracy>,
    pub overall_accuracy: f64,
    pub total_returned: u64,
    pub total_excluded: u64,
}

#[derive(Default)]
struct ExclusionState {
    /// Per-incident excluded items.
    excluded: HashMap<String, HashSet<ExcludedItem>>,
    /// Monotonic count of items ever returned, per category.
    returned: HashMap<&'static str, u64>,
    /// Distinct items ever excluded, per category.
    excluded_ids: HashMap<&'static str, HashSet<String>>,
}

/// Store of per-incident exclusions plus accuracy counters.
#[derive(Default)]
pub struct ExclusionStore {
    state: Mutex<ExclusionState>,
}

impl ExclusionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the engine returned `count` items in `category`.
    pub fn record_returned(&self, category: &str, count: usize) {
        let Some(&category) = CATEGORIES.iter().find(|&&c| c == category) else {
            return;
        };
        let mut state = self.state.lock().expect("exclusion store lock poisoned");
        *state.returned.entry(category).or_insert(0) += count as u64;
    }

    /// Exclude an item for an incident. Re-excluding the same triple is a
    /// no-op for both the set and the distinct-excluded counter.
    pub fn exclude(&self, incident_id: &str, item: ExcludedItem) -> Result<()> {
        let category = category_for_kind(&item.kind)
            .ok_or_else(|| Error::invalid_input(format!("unknown item kind: {}", item.kind)))?;

        let mut state = self.state.lock().expect("exclusion store lock poisoned");
        let inserted = state
            .excluded
            .entry(incident_id.to_string())
            .or_default()
            .insert(item.clone());
        if inserted {
            state
                .excluded_ids
                .entry(category)
                .or_default()
                .insert(item.item_id.clone());
            info!(incident_id, item_id = %item.item_id, kind = %item.kind, "Item excluded");
        }
        Ok(())
    }

    /// Remove an exclusion. The distinct-excluded accuracy counter is
    /// intentionally left alone: it counts items *ever* excluded.
    pub fn include(&self, incident_id: &str, item_id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("exclusion store lock poisoned");
        let Some(set) = state.excluded.get_mut(incident_id) else {
            return Err(Error::not_found(format!(
                "no exclusions for incident {incident_id}"
            )));
        };
        let before = set.len();
        set.retain(|item| item.item_id != item_id);
        if set.len() == before {
            return Err(Error::not_found(format!(
                "item {item_id} is not excluded for incident {incident_id}"
            )));
        }
        info!(incident_id, item_id, "Item exclusion removed");
        Ok(())
    }

    /// All exclusions for an incident.
    pub fn excluded_for(&self, incident_id: &str) -> Vec<ExcludedItem> {
        let state = self.state.lock().expect("exclusion store lock poisoned");
        state
            .excluded
            .get(incident_id)
            .map(|set| {
                let mut items: Vec<ExcludedItem> = set.iter().cloned().collect();
                items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
                items
            })
            .unwrap_or_default()
    }

    /// The excluded item-id set for an incident, for fast filtering.
    pub fn excluded_ids_for(&self, incident_id: &str) -> HashSet<String> {
        let state = self.state.lock().expect("exclusion store lock poisoned");
        state
            .excluded
            .get(incident_id)
            .map(|set| set.iter().map(|item| item.item_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Build the accuracy report.
    pub fn accuracy_report(&self) -> AccuracyReport {
        let state = self.state.lock().expect("exclusion store lock poisoned");

        let mut categories = BTreeMap::new();
        let mut total_returned = 0u64;
        let mut total_excluded = 0u64;
        let mut weighted = 0.0f64;

        for category in CATEGORIES {
            let returned = state.returned.get(category).copied().unwrap_or(0);
            let excluded = state
                .excluded_ids
                .get(category)
                .map(|s| s.len() as u64)
                .unwrap_or(0);
            let accuracy =
                100.0 * returned.saturating_sub(excluded) as f64 / returned.max(1) as f64;

            total_returned += returned;
            total_excluded += excluded;
            weighted += accuracy * returned as f64;

            categories.insert(
                category.to_string(),
                CategoryAccuracy {
                    returned,
                    excluded,
                    accuracy,
                },
            );
        }

        let overall_accuracy = if total_returned > 0 {
            weighted / total_returned as f64
        } else {
            100.0
        };

        AccuracyReport {
            categories,
            overall_accuracy,
            total_returned,
            total_excluded,
        }
    }
}
