//! Status requirement table and transition validation

use super::errors::{ValidationError, ValidationResult};
use super::status::ReviewStatus;
use super::submission::ReviewSubmission;

/// Fields a save must carry for a given status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRequirement {
    pub note_required: bool,
    pub reason_required: bool,
}

impl FieldRequirement {
    const NONE: FieldRequirement = FieldRequirement {
        note_required: false,
        reason_required: false,
    };
    const NOTE: FieldRequirement = FieldRequirement {
        note_required: true,
        reason_required: false,
    };
    const NOTE_AND_REASON: FieldRequirement = FieldRequirement {
        note_required: true,
        reason_required: true,
    };
}

/// Requirement table: status -> required fields.
///
/// `None` means the status is not a valid save target.
pub fn requirement_for(status: ReviewStatus) -> Option<FieldRequirement> {
    match status {
        ReviewStatus::Pending => None,
        ReviewStatus::Ok => Some(FieldRequirement::NONE),
        ReviewStatus::Ko => Some(FieldRequirement::NOTE),
        ReviewStatus::KoMym => Some(FieldRequirement::NOTE_AND_REASON),
        ReviewStatus::KoAgente => Some(FieldRequirement::NOTE),
        ReviewStatus::Duda => Some(FieldRequirement::NOTE),
        ReviewStatus::Fds => Some(FieldRequirement::NOTE),
    }
}

/// Validate a forward transition `current -> proposed.status`.
///
/// Only the forward submission path is checked here; administrative
/// re-edits of terminal records are handled elsewhere. The missing
/// ko reason is reported before a missing note, matching the order in
/// which the review form surfaces them.
pub fn validate_transition(
    current: ReviewStatus,
    proposed: &ReviewSubmission,
) -> ValidationResult<()> {
    if current.is_terminal() {
        return Err(ValidationError::AlreadyTerminal(current));
    }

    let requirement =
        requirement_for(proposed.status).ok_or(ValidationError::PendingNotAllowed)?;

    if requirement.reason_required && proposed.ko_reason.trim().is_empty() {
        return Err(ValidationError::MissingKoReason(proposed.status));
    }

    if requirement.note_required && proposed.reviewer_note.trim().is_empty() {
        return Err(ValidationError::MissingNote(proposed.status));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn submission(status: ReviewStatus) -> ReviewSubmission {
        ReviewSubmission::new("R1", status, "alice", Utc::now())
    }

    #[test]
    fn test_rejects_pending_target() {
        let result = validate_transition(ReviewStatus::Pending, &submission(ReviewStatus::Pending));
        assert_eq!(result, Err(ValidationError::PendingNotAllowed));
    }

    #[test]
    fn test_ko_requires_note() {
        let result = validate_transition(ReviewStatus::Pending, &submission(ReviewStatus::Ko));
        assert_eq!(result, Err(ValidationError::MissingNote(ReviewStatus::Ko)));
    }

    #[test]
    fn test_whitespace_note_is_empty() {
        let s = submission(ReviewStatus::Fds).with_note("   \n\t");
        assert_eq!(
            validate_transition(ReviewStatus::Pending, &s),
            Err(ValidationError::MissingNote(ReviewStatus::Fds))
        );
    }

    #[test]
    fn test_ko_mym_requires_reason() {
        let s = submission(ReviewStatus::KoMym).with_note("falta adjunto");
        assert_eq!(
            validate_transition(ReviewStatus::Pending, &s),
            Err(ValidationError::MissingKoReason(ReviewStatus::KoMym))
        );

        let s = s.with_ko_reason("categoria");
        assert!(validate_transition(ReviewStatus::Pending, &s).is_ok());
    }

    #[test]
    fn test_ok_never_requires_note() {
        assert!(validate_transition(ReviewStatus::Pending, &submission(ReviewStatus::Ok)).is_ok());
    }

    #[test]
    fn test_duda_with_note_accepted() {
        let s = submission(ReviewStatus::Duda).with_note("revisar adjunto");
        assert!(validate_transition(ReviewStatus::Pending, &s).is_ok());
    }

    #[test]
    fn test_terminal_record_rejects_submission() {
        let s = submission(ReviewStatus::Ok);
        assert_eq!(
            validate_transition(ReviewStatus::Ko, &s),
            Err(ValidationError::AlreadyTerminal(ReviewStatus::Ko))
        );
    }

    #[test]
    fn test_table_matches_ko_prefix_rule() {
        for status in ReviewStatus::TERMINAL {
            let req = requirement_for(status).unwrap();
            let prefix_rule = status.as_str().starts_with("KO")
                || matches!(status, ReviewStatus::Duda | ReviewStatus::Fds);
            assert_eq!(req.note_required, prefix_rule, "{}", status);
            assert_eq!(req.reason_required, status == ReviewStatus::KoMym);
        }
        assert!(requirement_for(ReviewStatus::Pending).is_none());
    }
}
