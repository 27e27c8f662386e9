//! Enrichment status state machine.
//!
//! Owns the per-lead status and every rule for moving between statuses.
//! All mutation of an [`EnrichmentRecord`] happens through the functions
//! here; callers read the record, apply one transition, and write it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EnrichmentRecord, LookupProfile};
use crate::phone::{check_phone, InvalidPhoneReason, PhoneCheck};
use crate::ports::LookupOutcome;
use crate::retry::MAX_RETRIES;

/// Lifecycle status of a lead's enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Initial status; no attempt made yet.
    Unenriched,
    /// Awaiting retry after a transient failure.
    Pending,
    /// Lookup matched but returned an incomplete profile.
    Partial,
    /// Lookup matched with identity plus economic data. Terminal.
    Completed,
    /// Retries exhausted or unrecoverable. Terminal.
    Failed,
    /// Rejected by the phone validity gate. Terminal.
    InvalidPhone,
}

impl EnrichmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrichmentStatus::Unenriched => "unenriched",
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::Partial => "partial",
            EnrichmentStatus::Completed => "completed",
            EnrichmentStatus::Failed => "failed",
            EnrichmentStatus::InvalidPhone => "invalid_phone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unenriched" => Some(EnrichmentStatus::Unenriched),
            "pending" => Some(EnrichmentStatus::Pending),
            "partial" => Some(EnrichmentStatus::Partial),
            "completed" => Some(EnrichmentStatus::Completed),
            "failed" => Some(EnrichmentStatus::Failed),
            "invalid_phone" => Some(EnrichmentStatus::InvalidPhone),
            _ => None,
        }
    }

    /// Terminal statuses are never advanced by the scheduler, only by
    /// explicit re-validation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EnrichmentStatus::Completed | EnrichmentStatus::Failed | EnrichmentStatus::InvalidPhone
        )
    }

    /// Statuses from which another lookup attempt may be scheduled.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            EnrichmentStatus::Unenriched | EnrichmentStatus::Pending | EnrichmentStatus::Partial
        )
    }
}

/// Record a gate rejection: terminal `invalid_phone`, with the reason code
/// and the original phone value persisted for audit.
pub fn reject_phone(
    record: &mut EnrichmentRecord,
    reason: &InvalidPhoneReason,
    original_phone: Option<&str>,
) {
    record.status = EnrichmentStatus::InvalidPhone;
    record.last_error = Some(match original_phone {
        Some(phone) => format!("{} (phone: {phone})", reason.code()),
        None => reason.code(),
    });
    tracing::debug!(
        lead_id = %record.lead_id,
        reason = %reason.code(),
        "phone rejected by validity gate"
    );
}

/// Apply a lookup outcome to the record.
///
/// Success stores the profile and classifies `completed` vs `partial`;
/// everything else is a transient failure that increments the retry count,
/// stamps `last_retry_at`, and parks the record for backoff.
pub fn apply_outcome(
    record: &mut EnrichmentRecord,
    outcome: LookupOutcome,
    cpf_source: &str,
    now: DateTime<Utc>,
) {
    match outcome {
        LookupOutcome::Found(profile) => record_success(record, profile, cpf_source, now),
        LookupOutcome::NotFound => {
            record_transient_failure(record, "no profile matched the query", now)
        }
        LookupOutcome::RateLimited => {
            record_transient_failure(record, "upstream rate limit", now)
        }
        LookupOutcome::Transient(err) => record_transient_failure(record, &err, now),
    }
}

fn record_success(
    record: &mut EnrichmentRecord,
    profile: LookupProfile,
    cpf_source: &str,
    now: DateTime<Utc>,
) {
    record.status = if profile.has_identity() && profile.has_economic_data() {
        EnrichmentStatus::Completed
    } else {
        EnrichmentStatus::Partial
    };
    record.cpf = Some(profile.cpf.clone());
    record.cpf_source = Some(cpf_source.to_string());
    record.raw_response = Some(profile.raw.clone());
    record.enriched_at = Some(now);
    record.last_error = None;
    tracing::info!(
        lead_id = %record.lead_id,
        status = record.status.as_str(),
        "lead enriched"
    );
}

/// Record a transient failure and schedule the next backoff window.
///
/// `unenriched` enters `pending`; `pending` and `partial` keep their status
/// (a partial record still holds usable data). The retry count never
/// exceeds the configured maximum.
pub fn record_transient_failure(record: &mut EnrichmentRecord, error: &str, now: DateTime<Utc>) {
    if record.status == EnrichmentStatus::Unenriched {
        record.status = EnrichmentStatus::Pending;
    }
    record.retry_count = (record.retry_count + 1).min(MAX_RETRIES);
    record.last_retry_at = Some(now);
    record.last_error = Some(error.to_string());
    tracing::warn!(
        lead_id = %record.lead_id,
        retry_count = record.retry_count,
        error,
        "enrichment attempt failed"
    );
}

/// Move a retryable record whose retries are spent to terminal `failed`.
///
/// Returns whether the transition happened. Applied by the sweep that
/// observes the exhausted record, never by the failure itself.
pub fn mark_exhausted(record: &mut EnrichmentRecord) -> bool {
    if record.status.is_retryable() && record.retry_count >= MAX_RETRIES {
        record.status = EnrichmentStatus::Failed;
        tracing::info!(lead_id = %record.lead_id, "retries exhausted, marking failed");
        return true;
    }
    false
}

/// Re-validate an `invalid_phone` record against a corrected number.
///
/// The only path out of `invalid_phone`: if the new normalized phone passes
/// the gate, the record returns to `pending` with its retry count reset.
/// Returns the gate verdict so the caller can persist the new phone.
pub fn revalidate_phone(record: &mut EnrichmentRecord, normalized_phone: &str) -> PhoneCheck {
    if record.status != EnrichmentStatus::InvalidPhone {
        return PhoneCheck::Valid;
    }
    let verdict = check_phone(normalized_phone);
    if verdict.is_valid() {
        record.status = EnrichmentStatus::Pending;
        record.retry_count = 0;
        record.last_retry_at = None;
        record.last_error = None;
        tracing::info!(lead_id = %record.lead_id, "phone corrected, back to pending");
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_profile() -> LookupProfile {
        LookupProfile {
            cpf: "52998224725".to_string(),
            name: Some("Ana Souza".to_string()),
            birth_date: None,
            mother_name: None,
            income: Some(8200.0),
            income_range: None,
            purchasing_power_code: None,
            phones: vec!["11987654321".to_string()],
            addresses: vec![],
            raw: json!({"cpf": "52998224725"}),
        }
    }

    #[test]
    fn full_profile_completes() {
        let mut rec = EnrichmentRecord::new("l1");
        apply_outcome(
            &mut rec,
            LookupOutcome::Found(full_profile()),
            "phone",
            Utc::now(),
        );
        assert_eq!(rec.status, EnrichmentStatus::Completed);
        assert_eq!(rec.cpf.as_deref(), Some("52998224725"));
        assert_eq!(rec.cpf_source.as_deref(), Some("phone"));
        assert!(rec.enriched_at.is_some());
        assert!(rec.last_error.is_none());
    }

    #[test]
    fn identity_without_economic_data_is_partial() {
        let mut profile = full_profile();
        profile.income = None;
        let mut rec = EnrichmentRecord::new("l1");
        apply_outcome(&mut rec, LookupOutcome::Found(profile), "cpf", Utc::now());
        assert_eq!(rec.status, EnrichmentStatus::Partial);
    }

    #[test]
    fn transient_failure_moves_unenriched_to_pending_and_counts() {
        let mut rec = EnrichmentRecord::new("l1");
        let now = Utc::now();
        apply_outcome(
            &mut rec,
            LookupOutcome::Transient("timeout".to_string()),
            "phone",
            now,
        );
        assert_eq!(rec.status, EnrichmentStatus::Pending);
        assert_eq!(rec.retry_count, 1);
        assert_eq!(rec.last_retry_at, Some(now));
        assert_eq!(rec.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn transient_failure_keeps_partial_status() {
        let mut rec = EnrichmentRecord::new("l1");
        rec.status = EnrichmentStatus::Partial;
        rec.retry_count = 2;
        apply_outcome(&mut rec, LookupOutcome::RateLimited, "phone", Utc::now());
        assert_eq!(rec.status, EnrichmentStatus::Partial);
        assert_eq!(rec.retry_count, 3);
    }

    #[test]
    fn retry_count_caps_at_maximum() {
        let mut rec = EnrichmentRecord::new("l1");
        rec.status = EnrichmentStatus::Pending;
        rec.retry_count = MAX_RETRIES;
        record_transient_failure(&mut rec, "timeout", Utc::now());
        assert_eq!(rec.retry_count, MAX_RETRIES);
    }

    #[test]
    fn exhausted_pending_record_fails() {
        let mut rec = EnrichmentRecord::new("l1");
        rec.status = EnrichmentStatus::Pending;
        rec.retry_count = MAX_RETRIES;
        assert!(mark_exhausted(&mut rec));
        assert_eq!(rec.status, EnrichmentStatus::Failed);
    }

    #[test]
    fn exhaustion_does_not_touch_terminal_or_fresh_records() {
        let mut completed = EnrichmentRecord::new("l1");
        completed.status = EnrichmentStatus::Completed;
        completed.retry_count = MAX_RETRIES;
        assert!(!mark_exhausted(&mut completed));
        assert_eq!(completed.status, EnrichmentStatus::Completed);

        let mut fresh = EnrichmentRecord::new("l2");
        assert!(!mark_exhausted(&mut fresh));
        assert_eq!(fresh.status, EnrichmentStatus::Unenriched);
    }

    #[test]
    fn gate_rejection_persists_reason_and_phone() {
        let mut rec = EnrichmentRecord::new("l1");
        reject_phone(
            &mut rec,
            &InvalidPhoneReason::InvalidDdd("00".to_string()),
            Some("00987654321"),
        );
        assert_eq!(rec.status, EnrichmentStatus::InvalidPhone);
        assert_eq!(
            rec.last_error.as_deref(),
            Some("invalid_ddd_00 (phone: 00987654321)")
        );
    }

    #[test]
    fn revalidation_with_good_phone_resets_to_pending() {
        let mut rec = EnrichmentRecord::new("l1");
        reject_phone(&mut rec, &InvalidPhoneReason::TooShort, Some("1198"));
        rec.retry_count = 3;
        let verdict = revalidate_phone(&mut rec, "11987654321");
        assert!(verdict.is_valid());
        assert_eq!(rec.status, EnrichmentStatus::Pending);
        assert_eq!(rec.retry_count, 0);
        assert!(rec.last_retry_at.is_none());
    }

    #[test]
    fn revalidation_with_bad_phone_stays_invalid() {
        let mut rec = EnrichmentRecord::new("l1");
        reject_phone(&mut rec, &InvalidPhoneReason::TooShort, Some("1198"));
        let verdict = revalidate_phone(&mut rec, "00987654321");
        assert!(!verdict.is_valid());
        assert_eq!(rec.status, EnrichmentStatus::InvalidPhone);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            EnrichmentStatus::Unenriched,
            EnrichmentStatus::Pending,
            EnrichmentStatus::Partial,
            EnrichmentStatus::Completed,
            EnrichmentStatus::Failed,
            EnrichmentStatus::InvalidPhone,
        ] {
            assert_eq!(EnrichmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EnrichmentStatus::parse("garbage"), None);
    }
}
