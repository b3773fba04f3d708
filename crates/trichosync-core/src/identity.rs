//! Stable identity for clinic-originated calendar events.
//!
//! Every visit gets a content-based UID derived from its identity-bearing
//! fields only (visit id and patient reference). The UID doubles as the iCal
//! UID and as the key into the sync mapping store, so it must be stable
//! across runs and across edits to mutable fields (notes, procedures).

/// Namespace suffix appended to every clinic UID.
///
/// Keeps clinic UIDs disjoint from identifiers minted by the remote
/// service or any other calendar producer.
pub const UID_NAMESPACE: &str = "trichosync.local";

/// Derives the stable UID for a visit.
///
/// Deterministic for a given `(visit_id, patient_ref)` pair and distinct
/// across different pairs, provided the patient reference contains no
/// `-`. References are numeric PESELs, so the last dash in the UID body
/// always separates the two fields; visit ids themselves may contain
/// dashes.
pub fn visit_uid(visit_id: &str, patient_ref: &str) -> String {
    debug_assert!(
        !patient_ref.contains('-'),
        "patient references must be dash-free"
    );
    format!("visit-{visit_id}-{patient_ref}@{UID_NAMESPACE}")
}

/// Parses a clinic UID back into its `(visit_id, patient_ref)` pair.
///
/// Returns `None` for UIDs outside the clinic namespace. The patient
/// reference is the segment after the last `-` of the body (references
/// are dash-free); everything before it is the visit id.
pub fn parse_visit_uid(uid: &str) -> Option<(String, String)> {
    let suffix = format!("@{UID_NAMESPACE}");
    let body = uid.strip_prefix("visit-")?.strip_suffix(suffix.as_str())?;
    let (visit_id, patient_ref) = body.rsplit_once('-')?;
    if visit_id.is_empty() || patient_ref.is_empty() {
        return None;
    }
    Some((visit_id.to_string(), patient_ref.to_string()))
}

/// Returns `true` if the identifier belongs to the clinic namespace.
pub fn is_clinic_uid(uid: &str) -> bool {
    parse_visit_uid(uid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = visit_uid("42", "92060207477");
        let b = visit_uid("42", "92060207477");
        assert_eq!(a, b);
        assert_eq!(a, "visit-42-92060207477@trichosync.local");
    }

    #[test]
    fn distinct_for_distinct_pairs() {
        let base = visit_uid("42", "92060207477");
        assert_ne!(base, visit_uid("43", "92060207477"));
        assert_ne!(base, visit_uid("42", "85010112345"));
    }

    #[test]
    fn roundtrip() {
        let uid = visit_uid("42", "92060207477");
        assert_eq!(
            parse_visit_uid(&uid),
            Some(("42".to_string(), "92060207477".to_string()))
        );
    }

    #[test]
    fn dashed_visit_ids_stay_unambiguous() {
        // The last dash splits the fields, so ids may carry dashes
        let a = visit_uid("4-2", "92060207477");
        let b = visit_uid("4", "92060207477");
        assert_ne!(a, b);
        assert_eq!(
            parse_visit_uid(&a),
            Some(("4-2".to_string(), "92060207477".to_string()))
        );
        assert_eq!(
            parse_visit_uid(&visit_uid("2024-rev-7", "55120198765")),
            Some(("2024-rev-7".to_string(), "55120198765".to_string()))
        );
    }

    #[test]
    fn rejects_foreign_identifiers() {
        assert!(parse_visit_uid("gcal_abc123").is_none());
        assert!(parse_visit_uid("visit-42-123@elsewhere.example").is_none());
        assert!(parse_visit_uid("visit-@trichosync.local").is_none());
        assert!(!is_clinic_uid("some-opaque-remote-id"));
        assert!(is_clinic_uid(&visit_uid("7", "55120198765")));
    }
}
