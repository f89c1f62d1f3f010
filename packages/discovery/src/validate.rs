//! Post-extraction validation.
//!
//! Validation never fails, it sanitizes. Every rule clamps or defaults,
//! so a validated record is always storable. The only outright rejection
//! in the system (missing name or coordinates) happens in the pipeline
//! before this module is reached.

use tracing::debug;

use crate::types::{PantryStatus, PantryUpdate, RawExtraction};

/// Eligibility shown when the source lists no restrictions.
pub const DEFAULT_ELIGIBILITY: &str = "Open to all - no restrictions listed";

/// Hours text when the source has no schedule.
pub const HOURS_NOT_LISTED: &str = "Not listed on website";

/// Today's-hours text when the source has no schedule.
pub const HOURS_TODAY_NOT_LISTED: &str = "Not listed";

/// Confidence floor for records built from places data alone.
pub const PLACES_ONLY_CONFIDENCE: i32 = 3;

/// Confidence floor when an extraction came back without a score.
const SCRAPED_FALLBACK_CONFIDENCE: i32 = 5;

/// Generous cap on any single string field, to bound document size.
const MAX_FIELD_BYTES: usize = 2048;

/// Sanitize a raw extraction into a storable update.
///
/// Rules, in order:
/// 1. confidence clamped to [1,10]; missing falls back to 3 for
///    places-only records and 5 otherwise.
/// 2. status coerced to the enum; unknown strings become UNKNOWN.
/// 3. missing `is_id_required` becomes false.
/// 4. empty `eligibility_rules` becomes the open-to-all default.
/// 5. every string stripped of control characters and truncated.
pub fn sanitize(raw: RawExtraction, places_only: bool) -> PantryUpdate {
    let fallback = if places_only {
        PLACES_ONLY_CONFIDENCE
    } else {
        SCRAPED_FALLBACK_CONFIDENCE
    };
    let confidence = match raw.confidence {
        Some(c) => {
            let clamped = c.clamp(1, 10) as i32;
            if i64::from(clamped) != c {
                debug!(raw = c, clamped, "clamped out-of-range confidence");
            }
            clamped
        }
        None => fallback,
    };

    let status = raw
        .status
        .as_deref()
        .map(PantryStatus::coerce)
        .unwrap_or(PantryStatus::Unknown);

    let mut eligibility_rules: Vec<String> = raw
        .eligibility_rules
        .unwrap_or_default()
        .into_iter()
        .map(|r| clean_string(&r))
        .filter(|r| !r.is_empty())
        .collect();
    if eligibility_rules.is_empty() {
        eligibility_rules.push(DEFAULT_ELIGIBILITY.to_string());
    }

    PantryUpdate {
        status,
        hours_notes: raw
            .hours_notes
            .as_deref()
            .map(clean_string)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| HOURS_NOT_LISTED.to_string()),
        hours_today: raw
            .hours_today
            .as_deref()
            .map(clean_string)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| HOURS_TODAY_NOT_LISTED.to_string()),
        eligibility_rules,
        is_id_required: raw.is_id_required.unwrap_or(false),
        residency_req: raw
            .residency_req
            .as_deref()
            .map(clean_string)
            .filter(|s| !s.is_empty()),
        special_notes: raw
            .special_notes
            .as_deref()
            .map(clean_string)
            .filter(|s| !s.is_empty()),
        confidence,
    }
}

/// Strip control characters (keeping newlines and tabs) and truncate at
/// a char boundary within the byte cap.
pub fn clean_string(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.len() <= MAX_FIELD_BYTES {
        return trimmed.to_string();
    }
    let mut end = MAX_FIELD_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_clamps_to_range() {
        let high = sanitize(
            RawExtraction {
                confidence: Some(42),
                ..Default::default()
            },
            false,
        );
        assert_eq!(high.confidence, 10);

        let low = sanitize(
            RawExtraction {
                confidence: Some(0),
                ..Default::default()
            },
            false,
        );
        assert_eq!(low.confidence, 1);

        let negative = sanitize(
            RawExtraction {
                confidence: Some(-3),
                ..Default::default()
            },
            false,
        );
        assert_eq!(negative.confidence, 1);
    }

    #[test]
    fn missing_confidence_floors_depend_on_source() {
        let places_only = sanitize(RawExtraction::default(), true);
        assert_eq!(places_only.confidence, 3);

        let scraped = sanitize(RawExtraction::default(), false);
        assert_eq!(scraped.confidence, 5);
    }

    #[test]
    fn unknown_status_coerces() {
        let update = sanitize(
            RawExtraction {
                status: Some("definitely open, probably".to_string()),
                ..Default::default()
            },
            false,
        );
        assert_eq!(update.status, PantryStatus::Unknown);

        let open = sanitize(
            RawExtraction {
                status: Some("OPEN".to_string()),
                ..Default::default()
            },
            false,
        );
        assert_eq!(open.status, PantryStatus::Open);
    }

    #[test]
    fn id_required_defaults_false() {
        let update = sanitize(RawExtraction::default(), false);
        assert!(!update.is_id_required);
    }

    #[test]
    fn empty_eligibility_gets_default() {
        let update = sanitize(
            RawExtraction {
                eligibility_rules: Some(vec![]),
                ..Default::default()
            },
            false,
        );
        assert_eq!(update.eligibility_rules, vec![DEFAULT_ELIGIBILITY]);

        let kept = sanitize(
            RawExtraction {
                eligibility_rules: Some(vec!["Photo ID required".to_string()]),
                ..Default::default()
            },
            false,
        );
        assert_eq!(kept.eligibility_rules, vec!["Photo ID required"]);
    }

    #[test]
    fn strings_are_cleaned_and_truncated() {
        assert_eq!(clean_string("Mon-Fri\u{0000} 9am\u{0007}-5pm"), "Mon-Fri 9am-5pm");
        assert_eq!(clean_string("  padded  "), "padded");

        let long = "x".repeat(5000);
        assert_eq!(clean_string(&long).len(), 2048);

        // Truncation lands on a char boundary for multibyte input.
        let wide = "é".repeat(3000);
        let cleaned = clean_string(&wide);
        assert!(cleaned.len() <= 2048);
        assert!(cleaned.chars().all(|c| c == 'é'));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let update = sanitize(
            RawExtraction {
                residency_req: Some("   ".to_string()),
                special_notes: Some("".to_string()),
                ..Default::default()
            },
            false,
        );
        assert_eq!(update.residency_req, None);
        assert_eq!(update.special_notes, None);
    }

    #[test]
    fn defaults_for_missing_hours() {
        let update = sanitize(RawExtraction::default(), false);
        assert_eq!(update.hours_notes, HOURS_NOT_LISTED);
        assert_eq!(update.hours_today, HOURS_TODAY_NOT_LISTED);
    }
}
