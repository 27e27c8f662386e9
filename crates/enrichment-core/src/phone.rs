//! Phone normalization and the pre-lookup validity gate.
//!
//! Every lead passes through here before anything is spent on an external
//! lookup: the normalizer canonicalizes the raw string to local-format
//! digits, and the gate rejects numbers that can never resolve (wrong
//! length, decoy patterns typed into forms, unknown area codes).

use serde::{Deserialize, Serialize};

/// Minimum digits for a landline with area code.
const MIN_PHONE_DIGITS: usize = 10;
/// Maximum digits we accept before declaring garbage.
const MAX_PHONE_DIGITS: usize = 13;
/// Brazilian country calling code.
const COUNTRY_PREFIX: &str = "55";

/// DDD area codes currently assigned by Anatel.
const VALID_DDDS: &[&str] = &[
    "11", "12", "13", "14", "15", "16", "17", "18", "19", // São Paulo
    "21", "22", "24", "27", "28", // Rio de Janeiro / Espírito Santo
    "31", "32", "33", "34", "35", "37", "38", // Minas Gerais
    "41", "42", "43", "44", "45", "46", "47", "48", "49", // Paraná / Santa Catarina
    "51", "53", "54", "55", // Rio Grande do Sul
    "61", "62", "63", "64", "65", "66", "67", "68", "69", // Centro-Oeste / Norte
    "71", "73", "74", "75", "77", "79", // Bahia / Sergipe
    "81", "82", "83", "84", "85", "86", "87", "88", "89", // Nordeste
    "91", "92", "93", "94", "95", "96", "97", "98", "99", // Norte / Maranhão
];

/// Canonicalize a raw phone string to local-format digits.
///
/// Strips every non-digit character; when the result still carries the `55`
/// country prefix and is long enough that the prefix cannot be an area code
/// (≥ 12 digits), the prefix is dropped. No other transformation.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() >= 12 && digits.starts_with(COUNTRY_PREFIX) {
        Some(digits[COUNTRY_PREFIX.len()..].to_string())
    } else {
        Some(digits)
    }
}

/// Why a normalized phone was rejected by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidPhoneReason {
    TooShort,
    TooLong,
    FakePattern,
    InvalidDdd(String),
}

impl InvalidPhoneReason {
    /// Stable reason code persisted for audit (`invalid_ddd_<code>` carries
    /// the offending area code).
    pub fn code(&self) -> String {
        match self {
            InvalidPhoneReason::TooShort => "too_short".to_string(),
            InvalidPhoneReason::TooLong => "too_long".to_string(),
            InvalidPhoneReason::FakePattern => "fake_pattern".to_string(),
            InvalidPhoneReason::InvalidDdd(ddd) => format!("invalid_ddd_{ddd}"),
        }
    }
}

/// Gate verdict for a normalized digit string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneCheck {
    Valid,
    Invalid(InvalidPhoneReason),
}

impl PhoneCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, PhoneCheck::Valid)
    }
}

// ── Fake-pattern denylist ─────────────────────────────────────
//
// Explicit named predicates rather than inline regexes so the policy stays
// auditable and extensible.

type FakePredicate = fn(&str) -> bool;

const FAKE_PATTERNS: &[(&str, FakePredicate)] = &[
    ("repeated_digits", has_repeated_run),
    ("ascending_decoy", is_ascending_decoy),
    ("descending_decoy", is_descending_decoy),
    ("zero_run", has_zero_run),
    ("sequence_prefix", has_sequence_prefix),
];

/// 11 or more identical digits in a row.
fn has_repeated_run(digits: &str) -> bool {
    let mut run = 0usize;
    let mut prev = None;
    for c in digits.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= 11 {
            return true;
        }
    }
    false
}

fn is_ascending_decoy(digits: &str) -> bool {
    digits == "12345678901"
}

fn is_descending_decoy(digits: &str) -> bool {
    digits == "98765456789"
}

/// A run of 10 or more zeros anywhere in the number.
fn has_zero_run(digits: &str) -> bool {
    digits.contains("0000000000")
}

fn has_sequence_prefix(digits: &str) -> bool {
    digits.starts_with("123456789") || digits.starts_with("987654321")
}

/// Area code of a normalized number.
///
/// A redundant `55` prefix that survived normalization (length ≥ 12) is
/// skipped so it is not misread as DDD 55 (which is a real area code).
fn ddd_of(digits: &str) -> &str {
    let rest = if digits.len() >= 12 && digits.starts_with(COUNTRY_PREFIX) {
        &digits[COUNTRY_PREFIX.len()..]
    } else {
        digits
    };
    &rest[..2]
}

/// Classify a normalized digit string as enrichable or rejected.
///
/// Evaluation order is length → fake pattern → area code; the first failing
/// rule wins.
pub fn check_phone(digits: &str) -> PhoneCheck {
    if digits.len() < MIN_PHONE_DIGITS {
        return PhoneCheck::Invalid(InvalidPhoneReason::TooShort);
    }
    if digits.len() > MAX_PHONE_DIGITS {
        return PhoneCheck::Invalid(InvalidPhoneReason::TooLong);
    }
    if let Some((name, _)) = FAKE_PATTERNS.iter().find(|(_, pred)| pred(digits)) {
        tracing::debug!(pattern = name, "phone matched fake-pattern denylist");
        return PhoneCheck::Invalid(InvalidPhoneReason::FakePattern);
    }
    let ddd = ddd_of(digits);
    if !VALID_DDDS.contains(&ddd) {
        return PhoneCheck::Invalid(InvalidPhoneReason::InvalidDdd(ddd.to_string()));
    }
    PhoneCheck::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(
            normalize_phone("(11) 98765-4321"),
            Some("11987654321".to_string())
        );
    }

    #[test]
    fn normalize_drops_country_prefix_at_twelve_or_more_digits() {
        assert_eq!(
            normalize_phone("5511987654321"),
            Some("11987654321".to_string())
        );
        assert_eq!(
            normalize_phone("+55 11 98765-4321"),
            Some("11987654321".to_string())
        );
    }

    #[test]
    fn normalize_keeps_55_when_it_is_the_area_code() {
        // 11 digits starting with 55: DDD 55 (RS interior), not a country code.
        assert_eq!(
            normalize_phone("55987654321"),
            Some("55987654321".to_string())
        );
    }

    #[test]
    fn normalize_empty_and_digitless_input_is_none() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("sem telefone"), None);
    }

    #[test]
    fn gate_accepts_a_plain_mobile_number() {
        assert_eq!(check_phone("11987654321"), PhoneCheck::Valid);
    }

    #[test]
    fn gate_length_checks_win_first() {
        assert_eq!(
            check_phone("119876"),
            PhoneCheck::Invalid(InvalidPhoneReason::TooShort)
        );
        assert_eq!(
            check_phone("55119876543210"),
            PhoneCheck::Invalid(InvalidPhoneReason::TooLong)
        );
    }

    #[test]
    fn gate_rejects_eleven_zeros_as_fake() {
        assert_eq!(
            check_phone("00000000000"),
            PhoneCheck::Invalid(InvalidPhoneReason::FakePattern)
        );
    }

    #[test]
    fn gate_rejects_decoy_sequences() {
        assert_eq!(
            check_phone("12345678901"),
            PhoneCheck::Invalid(InvalidPhoneReason::FakePattern)
        );
        assert_eq!(
            check_phone("98765456789"),
            PhoneCheck::Invalid(InvalidPhoneReason::FakePattern)
        );
        assert_eq!(
            check_phone("1234567890123"),
            PhoneCheck::Invalid(InvalidPhoneReason::FakePattern)
        );
    }

    #[test]
    fn gate_rejects_ten_zero_run_inside_number() {
        assert_eq!(
            check_phone("1100000000001"),
            PhoneCheck::Invalid(InvalidPhoneReason::FakePattern)
        );
    }

    #[test]
    fn gate_rejects_unknown_ddd_with_code_in_reason() {
        assert_eq!(
            check_phone("00987654321"),
            PhoneCheck::Invalid(InvalidPhoneReason::InvalidDdd("00".to_string()))
        );
        assert_eq!(
            InvalidPhoneReason::InvalidDdd("00".to_string()).code(),
            "invalid_ddd_00"
        );
    }

    #[test]
    fn gate_skips_redundant_country_prefix_when_reading_ddd() {
        // 13 digits still starting with 55: DDD is the next pair, not "55".
        assert_eq!(check_phone("5521987654321"), PhoneCheck::Valid);
    }

    #[test]
    fn ddd_55_is_valid_at_local_length() {
        assert_eq!(check_phone("55987654321"), PhoneCheck::Valid);
    }
}
