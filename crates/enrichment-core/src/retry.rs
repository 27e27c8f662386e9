//! Exponential-backoff retry scheduling.
//!
//! Pure decision logic: given a record and the current time, is another
//! enrichment attempt allowed right now, and if not, why not.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::EnrichmentRecord;
use crate::state::EnrichmentStatus;

/// Maximum enrichment attempts per lead.
pub const MAX_RETRIES: i32 = 5;

/// Backoff in hours by retry count; the last value repeats for any count
/// past the end of the table.
const BACKOFF_HOURS: [i64; 5] = [1, 2, 4, 8, 16];

/// Delay that must elapse after `retry_count` attempts before the next one.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let idx = retry_count.clamp(0, BACKOFF_HOURS.len() as i32 - 1) as usize;
    Duration::hours(BACKOFF_HOURS[idx])
}

/// Why a lead was skipped instead of attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyCompleted,
    InvalidPhone,
    /// Backoff window since the last attempt has not elapsed.
    RecentlyEnriched,
    MaxRetriesExceeded,
    /// Batch cancellation observed before this lead was dispatched.
    Cancelled,
}

impl SkipReason {
    pub fn code(self) -> &'static str {
        match self {
            SkipReason::AlreadyCompleted => "already_completed",
            SkipReason::InvalidPhone => "invalid_phone",
            SkipReason::RecentlyEnriched => "recently_enriched",
            SkipReason::MaxRetriesExceeded => "max_retries_exceeded",
            SkipReason::Cancelled => "cancelled",
        }
    }
}

/// Scheduler verdict for a record at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Skip(SkipReason),
}

/// Full eligibility check with the reason a record is held back.
pub fn check_eligibility(record: &EnrichmentRecord, now: DateTime<Utc>) -> Eligibility {
    match record.status {
        EnrichmentStatus::Completed => return Eligibility::Skip(SkipReason::AlreadyCompleted),
        EnrichmentStatus::InvalidPhone => return Eligibility::Skip(SkipReason::InvalidPhone),
        EnrichmentStatus::Failed => return Eligibility::Skip(SkipReason::MaxRetriesExceeded),
        EnrichmentStatus::Unenriched | EnrichmentStatus::Pending | EnrichmentStatus::Partial => {}
    }
    if record.retry_count >= MAX_RETRIES {
        return Eligibility::Skip(SkipReason::MaxRetriesExceeded);
    }
    match record.last_retry_at {
        None => Eligibility::Eligible,
        Some(last) if now - last >= backoff_delay(record.retry_count) => Eligibility::Eligible,
        Some(_) => Eligibility::Skip(SkipReason::RecentlyEnriched),
    }
}

/// Convenience predicate over [`check_eligibility`].
pub fn is_eligible(record: &EnrichmentRecord, now: DateTime<Utc>) -> bool {
    check_eligibility(record, now) == Eligibility::Eligible
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: EnrichmentStatus, retry_count: i32, hours_ago: Option<i64>) -> EnrichmentRecord {
        let mut rec = EnrichmentRecord::new("l1");
        rec.status = status;
        rec.retry_count = retry_count;
        rec.last_retry_at = hours_ago.map(|h| Utc::now() - Duration::hours(h));
        rec
    }

    #[test]
    fn delay_table_matches_policy() {
        assert_eq!(backoff_delay(0), Duration::hours(1));
        assert_eq!(backoff_delay(1), Duration::hours(2));
        assert_eq!(backoff_delay(2), Duration::hours(4));
        assert_eq!(backoff_delay(3), Duration::hours(8));
        assert_eq!(backoff_delay(4), Duration::hours(16));
    }

    #[test]
    fn delay_caps_at_sixteen_hours() {
        assert_eq!(backoff_delay(5), Duration::hours(16));
        assert_eq!(backoff_delay(100), Duration::hours(16));
    }

    #[test]
    fn delay_is_monotonically_non_decreasing() {
        let mut prev = backoff_delay(0);
        for count in 1..20 {
            let d = backoff_delay(count);
            assert!(d >= prev, "delay decreased at retry count {count}");
            prev = d;
        }
    }

    #[test]
    fn terminal_statuses_are_never_eligible() {
        let now = Utc::now();
        for count in [0, 2, MAX_RETRIES] {
            assert!(!is_eligible(&record(EnrichmentStatus::Completed, count, None), now));
            assert!(!is_eligible(&record(EnrichmentStatus::Failed, count, None), now));
            assert!(!is_eligible(&record(EnrichmentStatus::InvalidPhone, count, None), now));
        }
    }

    #[test]
    fn fresh_record_is_immediately_eligible() {
        assert!(is_eligible(
            &record(EnrichmentStatus::Unenriched, 0, None),
            Utc::now()
        ));
    }

    #[test]
    fn partial_at_two_retries_needs_four_hours() {
        let now = Utc::now();
        assert!(!is_eligible(&record(EnrichmentStatus::Partial, 2, Some(3)), now));
        assert!(is_eligible(&record(EnrichmentStatus::Partial, 2, Some(5)), now));
    }

    #[test]
    fn exhausted_retryable_record_reports_max_retries() {
        let verdict = check_eligibility(&record(EnrichmentStatus::Pending, MAX_RETRIES, None), Utc::now());
        assert_eq!(verdict, Eligibility::Skip(SkipReason::MaxRetriesExceeded));
    }

    #[test]
    fn backoff_window_reports_recently_enriched() {
        let verdict = check_eligibility(&record(EnrichmentStatus::Pending, 0, Some(0)), Utc::now());
        assert_eq!(verdict, Eligibility::Skip(SkipReason::RecentlyEnriched));
    }

    #[test]
    fn skip_reason_codes_are_stable() {
        assert_eq!(SkipReason::AlreadyCompleted.code(), "already_completed");
        assert_eq!(SkipReason::RecentlyEnriched.code(), "recently_enriched");
        assert_eq!(SkipReason::MaxRetriesExceeded.code(), "max_retries_exceeded");
    }
}
