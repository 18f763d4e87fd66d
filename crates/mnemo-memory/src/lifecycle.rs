// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Importance ledger: weighting, reinforcement, decay, and purge bookkeeping.
//!
//! One record per memory item, positionally aligned with the item texts and
//! persisted inside the metadata snapshot. Scores are mutated on write
//! (initial assignment) and read (reinforcement); decay is computed on the
//! fly when purging and never stored destructively.

use serde::{Deserialize, Serialize};
use tracing::info;

use mnemo_core::ImportanceRecord;

/// Scores are clamped into this range.
pub const MIN_IMPORTANCE: f64 = 0.1;
pub const MAX_IMPORTANCE: f64 = 1.0;

/// Per-item importance records, one-to-one with memory items by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportanceLedger {
    records: Vec<ImportanceRecord>,
}

impl ImportanceLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records (equals the item count when aligned).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records exist.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for an id, if in range.
    pub fn get(&self, id: usize) -> Option<&ImportanceRecord> {
        self.records.get(id)
    }

    /// Append a record for a newly written item.
    ///
    /// `score` is the caller's classification; `None` uses the default.
    /// Either way the value is clamped into [0.1, 1.0].
    pub fn push_new(&mut self, score: Option<f64>, default_score: f64, now: f64) {
        let score = score.unwrap_or(default_score).clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        self.records.push(ImportanceRecord {
            score,
            created_at: now,
            reference_count: 0,
            last_accessed_at: now,
            purged: false,
        });
    }

    /// Drop records for ids >= `len`. Used for write-path rollback.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Reinforce a returned memory: boost score, bump reference count,
    /// touch the access time.
    pub fn reinforce(&mut self, id: usize, boost: f64, now: f64) {
        if let Some(record) = self.records.get_mut(id) {
            record.score = (record.score + boost).min(MAX_IMPORTANCE);
            record.reference_count += 1;
            record.last_accessed_at = now;
        }
    }

    /// Whether an item has been purged.
    pub fn is_purged(&self, id: usize) -> bool {
        self.records.get(id).map(|r| r.purged).unwrap_or(false)
    }

    /// Effective score after age decay.
    ///
    /// `score * max(floor, 1 - age_days * rate)`: capped reduction, so decay
    /// alone never drives a score to zero.
    pub fn effective_score(&self, id: usize, now: f64, rate_per_day: f64, floor: f64) -> f64 {
        let Some(record) = self.records.get(id) else {
            return 0.0;
        };
        let age_days = ((now - record.created_at) / 86_400.0).max(0.0);
        record.score * (1.0 - age_days * rate_per_day).max(floor)
    }

    /// Mark never-referenced items whose effective score fell below
    /// `threshold` as purged. Returns how many were newly marked.
    pub fn sweep(&mut self, now: f64, threshold: f64, rate_per_day: f64, floor: f64) -> usize {
        let mut marked = 0;
        for record in &mut self.records {
            if record.purged || record.reference_count > 0 {
                continue;
            }
            let age_days = ((now - record.created_at) / 86_400.0).max(0.0);
            let effective = record.score * (1.0 - age_days * rate_per_day).max(floor);
            if effective < threshold {
                record.purged = true;
                marked += 1;
            }
        }
        if marked > 0 {
            info!(marked, total = self.records.len(), "purged low-importance memories");
        }
        marked
    }

    /// Fraction of records currently marked purged.
    pub fn purged_fraction(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.purged_count() as f64 / self.records.len() as f64
    }

    /// Count of purged records.
    pub fn purged_count(&self) -> usize {
        self.records.iter().filter(|r| r.purged).count()
    }

    /// Rebuild the ledger keeping only the given ids, in order.
    ///
    /// Used by full rebuilds, which renumber ids.
    pub fn retain_ids(&self, retained: &[usize]) -> Self {
        Self {
            records: retained
                .iter()
                .filter_map(|id| self.records.get(*id).cloned())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: f64 = 86_400.0;

    fn ledger_with_one(score: f64, created_at: f64) -> ImportanceLedger {
        let mut ledger = ImportanceLedger::new();
        ledger.push_new(Some(score), 0.5, created_at);
        ledger
    }

    #[test]
    fn new_records_clamp_into_range() {
        let mut ledger = ImportanceLedger::new();
        ledger.push_new(Some(2.0), 0.5, 0.0);
        ledger.push_new(Some(0.0), 0.5, 0.0);
        ledger.push_new(None, 0.5, 0.0);
        assert!((ledger.get(0).unwrap().score - MAX_IMPORTANCE).abs() < f64::EPSILON);
        assert!((ledger.get(1).unwrap().score - MIN_IMPORTANCE).abs() < f64::EPSILON);
        assert!((ledger.get(2).unwrap().score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn reinforcement_is_monotone_and_capped() {
        let mut ledger = ledger_with_one(0.5, 0.0);
        let mut previous = 0.5;
        for n in 1..=10u64 {
            ledger.reinforce(0, 0.1, n as f64);
            let record = ledger.get(0).unwrap();
            assert!(record.score >= previous, "score must be non-decreasing");
            assert!(record.score <= MAX_IMPORTANCE + f64::EPSILON);
            assert_eq!(record.reference_count, n);
            previous = record.score;
        }
        assert!((ledger.get(0).unwrap().score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decay_floor_holds_for_any_age() {
        let ledger = ledger_with_one(0.8, 0.0);
        for days in [0.0, 10.0, 100.0, 10_000.0] {
            let effective = ledger.effective_score(0, days * DAY, 0.01, 0.5);
            assert!(
                effective >= 0.5 * 0.8 - 1e-12,
                "effective score fell below half the stored score at {days} days"
            );
        }
    }

    #[test]
    fn decay_is_linear_before_the_floor() {
        let ledger = ledger_with_one(1.0, 0.0);
        let effective = ledger.effective_score(0, 10.0 * DAY, 0.01, 0.5);
        assert!((effective - 0.9).abs() < 1e-9);
    }

    #[test]
    fn sweep_marks_only_never_referenced_low_scores() {
        let mut ledger = ImportanceLedger::new();
        ledger.push_new(Some(0.1), 0.5, 0.0); // low, never referenced -> purged
        ledger.push_new(Some(0.1), 0.5, 0.0); // low but referenced -> kept
        ledger.push_new(Some(0.9), 0.5, 0.0); // high -> kept
        ledger.reinforce(1, 0.1, 1.0);

        let marked = ledger.sweep(30.0 * DAY, 0.15, 0.01, 0.5);
        assert_eq!(marked, 1);
        assert!(ledger.is_purged(0));
        assert!(!ledger.is_purged(1));
        assert!(!ledger.is_purged(2));
    }

    #[test]
    fn sweep_is_idempotent_on_already_purged() {
        let mut ledger = ledger_with_one(0.1, 0.0);
        assert_eq!(ledger.sweep(0.0, 0.15, 0.01, 0.5), 1);
        assert_eq!(ledger.sweep(0.0, 0.15, 0.01, 0.5), 0);
    }

    #[test]
    fn purged_fraction_counts_marked_records() {
        let mut ledger = ImportanceLedger::new();
        ledger.push_new(Some(0.1), 0.5, 0.0);
        ledger.push_new(Some(0.9), 0.5, 0.0);
        ledger.sweep(0.0, 0.15, 0.01, 0.5);
        assert!((ledger.purged_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn retain_ids_renumbers_in_order() {
        let mut ledger = ImportanceLedger::new();
        ledger.push_new(Some(0.2), 0.5, 0.0);
        ledger.push_new(Some(0.4), 0.5, 0.0);
        ledger.push_new(Some(0.6), 0.5, 0.0);

        let rebuilt = ledger.retain_ids(&[0, 2]);
        assert_eq!(rebuilt.len(), 2);
        assert!((rebuilt.get(0).unwrap().score - 0.2).abs() < f64::EPSILON);
        assert!((rebuilt.get(1).unwrap().score - 0.6).abs() < f64::EPSILON);
    }
}
