//! Duplicate-lead detection by shared phone and shared email.
//!
//! A pure batch computation over the lead population. Two independent
//! passes each partition the leads by a normalized matching value; within
//! each group the earliest-created lead is canonical and every other member
//! gets a duplicate edge pointing at it. The caller replaces the stored
//! edge set atomically with the result; re-running is idempotent.
//!
//! The detector never mutates lead or enrichment state, and a lead that is
//! canonical under the phone pass may still be a duplicate under the email
//! pass (edges are independent per match type).

use std::collections::HashMap;

use crate::model::{DuplicateEdge, Lead, MatchType};

/// Minimum digits for a phone to participate in matching.
const MIN_MATCHABLE_PHONE_DIGITS: usize = 10;

/// Recompute the full duplicate-edge set for the lead population.
pub fn detect_duplicates(leads: &[Lead]) -> Vec<DuplicateEdge> {
    let mut edges = pass(leads, MatchType::Phone, phone_key);
    edges.extend(pass(leads, MatchType::Email, email_key));
    edges
}

fn phone_key(lead: &Lead) -> Option<String> {
    let phone = lead.normalized_phone.as_deref()?;
    if phone.len() >= MIN_MATCHABLE_PHONE_DIGITS && phone.chars().all(|c| c.is_ascii_digit()) {
        Some(phone.to_string())
    } else {
        None
    }
}

fn email_key(lead: &Lead) -> Option<String> {
    let email = lead.email.as_deref()?.trim().to_lowercase();
    if email.contains('@') {
        Some(email)
    } else {
        None
    }
}

fn pass(
    leads: &[Lead],
    match_type: MatchType,
    key_of: fn(&Lead) -> Option<String>,
) -> Vec<DuplicateEdge> {
    let mut groups: HashMap<String, Vec<&Lead>> = HashMap::new();
    for lead in leads {
        if let Some(key) = key_of(lead) {
            groups.entry(key).or_default().push(lead);
        }
    }

    let mut edges = Vec::new();
    for (value, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        // Earliest-created lead is canonical; id breaks creation-time ties
        // so re-runs stay deterministic.
        members.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let canonical = members[0];
        for duplicate in &members[1..] {
            edges.push(DuplicateEdge {
                lead_id: duplicate.id.clone(),
                canonical_lead_id: canonical.id.clone(),
                match_type,
                match_value: value.clone(),
            });
        }
    }
    edges
}
