//! Content availability: aggregates unavailability reports filed by peers
//! into a per-`(peer, content)` reputation record, weighting each report by
//! its filer's own track record so a handful of unreliable reporters can't
//! outweigh one trustworthy one.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use digc_core::ids::{ContentHash, NodeId};
use digc_core::model::{
    ContentReport, ContentReputationRecord, ReportReason, ReputationLevel, ReputationStatus,
};

/// How long a single report remains part of the weighted count.
pub const REPORT_EXPIRY: Duration = Duration::from_secs(2 * 60 * 60);

/// Weighted-count threshold at which a record leaves `Available`.
pub const SUSPECT_LOW_THRESHOLD: f64 = 2.0;

/// Weighted-count threshold for the medium escalation (also requires
/// [`MEDIUM_MIN_REPORTERS`] distinct reporters).
pub const SUSPECT_MEDIUM_THRESHOLD: f64 = 3.0;

/// Weighted-count threshold for the high/unavailable escalation (also
/// requires [`MEDIUM_MIN_REPORTERS`] distinct reporters).
pub const UNAVAILABLE_THRESHOLD: f64 = 5.0;

/// Minimum distinct reporters required to escalate past low confidence.
pub const MEDIUM_MIN_REPORTERS: usize = 3;

/// Default interval between active-verification re-checks and the overall
/// TTL after which stale content entries are dropped.
pub const REANNOUNCE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Maximum time a content entry survives without reconfirmation.
pub const CONTENT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Default)]
struct ReporterStats {
    success: u32,
    failure: u32,
}

impl ReporterStats {
    fn reputation(&self) -> f64 {
        f64::from(self.success + 1) / f64::from(self.success + self.failure + 2)
    }
}

/// Weight assigned to one report, scaled by its filer's reputation in
/// `[1.0, 1.8]`.
#[must_use]
pub fn report_weight(reporter_reputation: f64) -> f64 {
    1.0 + reporter_reputation * 0.8
}

struct FiledReport {
    reporter: NodeId,
    filed_at: SystemTime,
    reason: ReportReason,
}

/// Tracks content-availability reports and the reputation records derived
/// from them.
pub struct ReputationManager {
    reports: DashMap<(NodeId, ContentHash), Vec<FiledReport>>,
    reporter_stats: DashMap<NodeId, ReporterStats>,
}

impl ReputationManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reports: DashMap::new(),
            reporter_stats: DashMap::new(),
        }
    }

    /// Record a reporter's own transfer outcome, feeding the reputation
    /// score used to weight their future reports.
    pub fn record_reporter_outcome(&self, reporter: NodeId, success: bool) {
        let mut entry = self.reporter_stats.entry(reporter).or_default();
        if success {
            entry.success += 1;
        } else {
            entry.failure += 1;
        }
    }

    /// File a report and recompute the `(reported, hash)` record.
    pub fn file_report(&self, report: ContentReport) -> ContentReputationRecord {
        let key = (report.reported, report.content_hash);
        let mut entries = self.reports.entry(key).or_default();
        entries.push(FiledReport {
            reporter: report.reporter,
            filed_at: report.timestamp,
            reason: report.reason,
        });
        drop(entries);
        self.recompute(key)
    }

    /// Recompute and return the current record for `(reported, hash)`,
    /// expiring reports older than [`REPORT_EXPIRY`] and deduping by
    /// reporter (only the most recent report per reporter counts).
    pub fn recompute(&self, key: (NodeId, ContentHash)) -> ContentReputationRecord {
        let mut entries = self.reports.entry(key).or_default();
        entries.retain(|r| r.filed_at.elapsed().unwrap_or(Duration::MAX) <= REPORT_EXPIRY);

        let mut latest_per_reporter: std::collections::HashMap<NodeId, &FiledReport> =
            std::collections::HashMap::new();
        for entry in entries.iter() {
            latest_per_reporter
                .entry(entry.reporter)
                .and_modify(|existing| {
                    if entry.filed_at > existing.filed_at {
                        *existing = entry;
                    }
                })
                .or_insert(entry);
        }

        let mut reporters: Vec<NodeId> = latest_per_reporter.keys().copied().collect();
        reporters.sort_by_key(NodeId::to_hex);

        let weighted_count: f64 = latest_per_reporter
            .values()
            .map(|r| {
                let reputation = self
                    .reporter_stats
                    .get(&r.reporter)
                    .map(|s| s.reputation())
                    .unwrap_or(0.5);
                report_weight(reputation)
            })
            .sum();

        let (status, level) = classify(weighted_count, reporters.len());

        ContentReputationRecord {
            status,
            reporters,
            weighted_count,
            level,
            verification_attempts: 0,
            verified: false,
        }
    }

    /// True if `reason` alone (a corrupt-data report, say) should still
    /// count toward escalation even from a single reporter. All reasons
    /// currently weight identically; kept as a hook for future asymmetric
    /// handling (e.g. weighting `CorruptData` higher than `NoResponse`).
    #[must_use]
    pub fn reason_weight(_reason: ReportReason) -> f64 {
        1.0
    }

    /// Number of distinct `(reported, hash)` pairs with any history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// True if no reports have ever been filed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl Default for ReputationManager {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(weighted_count: f64, reporter_count: usize) -> (ReputationStatus, ReputationLevel) {
    if weighted_count < SUSPECT_LOW_THRESHOLD {
        return (ReputationStatus::Available, ReputationLevel::None);
    }
    if weighted_count < SUSPECT_MEDIUM_THRESHOLD {
        return (ReputationStatus::Suspect, ReputationLevel::Low);
    }
    if reporter_count >= MEDIUM_MIN_REPORTERS {
        if weighted_count >= UNAVAILABLE_THRESHOLD {
            return (ReputationStatus::Unavailable, ReputationLevel::High);
        }
        return (ReputationStatus::Suspect, ReputationLevel::Medium);
    }
    (ReputationStatus::Suspect, ReputationLevel::Low)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(reporter: NodeId, reported: NodeId, hash: ContentHash) -> ContentReport {
        ContentReport {
            reporter,
            reported,
            content_hash: hash,
            timestamp: SystemTime::now(),
            reason: ReportReason::NoResponse,
        }
    }

    #[test]
    fn single_report_stays_available() {
        let manager = ReputationManager::new();
        let hash = ContentHash::from_hex(&"aa".repeat(32)).unwrap();
        let reported = NodeId::random();
        let record = manager.file_report(report(NodeId::random(), reported, hash));
        assert_eq!(record.status, ReputationStatus::Available);
    }

    #[test]
    fn three_distinct_reporters_with_default_reputation_escalate_to_medium() {
        let manager = ReputationManager::new();
        let hash = ContentHash::from_hex(&"bb".repeat(32)).unwrap();
        let reported = NodeId::random();
        let mut record = ContentReputationRecord {
            status: ReputationStatus::Available,
            reporters: vec![],
            weighted_count: 0.0,
            level: ReputationLevel::None,
            verification_attempts: 0,
            verified: false,
        };
        for _ in 0..3 {
            record = manager.file_report(report(NodeId::random(), reported, hash));
        }
        // default reputation 0.5 -> weight 1.4 each, 3 reporters -> 4.2
        assert_eq!(record.reporters.len(), 3);
        assert!(record.weighted_count >= SUSPECT_MEDIUM_THRESHOLD);
        assert_eq!(record.status, ReputationStatus::Suspect);
        assert_eq!(record.level, ReputationLevel::Medium);
    }

    #[test]
    fn high_reputation_reporters_escalate_to_unavailable() {
        let manager = ReputationManager::new();
        let hash = ContentHash::from_hex(&"cc".repeat(32)).unwrap();
        let reported = NodeId::random();

        let mut record = ContentReputationRecord {
            status: ReputationStatus::Available,
            reporters: vec![],
            weighted_count: 0.0,
            level: ReputationLevel::None,
            verification_attempts: 0,
            verified: false,
        };
        for _ in 0..4 {
            let reporter = NodeId::random();
            for _ in 0..10 {
                manager.record_reporter_outcome(reporter, true);
            }
            record = manager.file_report(report(reporter, reported, hash));
        }
        assert!(record.weighted_count >= UNAVAILABLE_THRESHOLD);
        assert_eq!(record.status, ReputationStatus::Unavailable);
        assert_eq!(record.level, ReputationLevel::High);
    }

    #[test]
    fn repeated_reports_from_one_reporter_do_not_double_count() {
        let manager = ReputationManager::new();
        let hash = ContentHash::from_hex(&"dd".repeat(32)).unwrap();
        let reporter = NodeId::random();
        let reported = NodeId::random();
        manager.file_report(report(reporter, reported, hash));
        let record = manager.file_report(report(reporter, reported, hash));
        assert_eq!(record.reporters.len(), 1);
    }

    #[test]
    fn report_weight_increases_with_reputation() {
        assert!(report_weight(1.0) > report_weight(0.0));
        assert_eq!(report_weight(0.0), 1.0);
        assert_eq!(report_weight(1.0), 1.8);
    }
}
