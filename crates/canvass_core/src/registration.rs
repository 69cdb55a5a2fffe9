//! Registration of a single voter from the operator form.

use thiserror::Error;
use tracing::info;

use crate::db::{StoreError, VoterStore};
use crate::normalize::{normalize_optional, normalize_text};
use crate::registry::{verify, RegistryLookup};
use crate::schema::{Classification, ManualRecord, NewVoter, VerificationOutcome, VoterSubmission};
use crate::validation::{
    check_age, optional_text, parse_gender, residence_address, validate_form_phone, validate_name,
    validate_national_id, ValidationError, DEFAULT_AGE, NAME_MAX_CHARS,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("national ID {national_id} already registered")]
    AlreadyRegistered { national_id: String },
    #[error("leader {0} does not exist or is inactive")]
    UnknownLeader(i64),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { national_id } => RegistrationError::AlreadyRegistered { national_id },
            StoreError::Backend(message) => RegistrationError::Storage(message),
        }
    }
}

/// Validate a form submission into a voter ready to store.
pub fn prepare_submission(submission: &VoterSubmission) -> Result<NewVoter, RegistrationError> {
    let name = validate_name(&submission.name)?;
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(ValidationError::NameTooLong.into());
    }
    let national_id = validate_national_id(&submission.national_id)?;
    let age = match submission.age {
        Some(age) => check_age(age)?,
        None => DEFAULT_AGE,
    };

    let discrepancies = if submission.classification == Classification::NeedsReview {
        submission.discrepancies.clone().unwrap_or_default()
    } else {
        Vec::new()
    };

    Ok(NewVoter {
        name: normalize_text(name),
        national_id,
        age,
        phone: validate_form_phone(submission.phone.as_deref())?,
        residence_address: residence_address(submission.residence_address.as_deref()),
        gender: parse_gender(submission.gender.as_deref())?,
        department: normalize_optional(submission.department.as_deref()),
        municipality: normalize_optional(submission.municipality.as_deref()),
        voting_place: normalize_optional(submission.voting_place.as_deref()),
        table: normalize_optional(submission.table.as_deref()),
        polling_address: optional_text(submission.polling_address.as_deref()),
        classification: submission.classification,
        discrepancies,
        leader_id: submission.leader_id,
        registered_by: None,
        notes: optional_text(submission.notes.as_deref()),
    })
}

/// Store a form submission. Registration goes through even when the
/// classification is `inconsistent`; the state is kept for later review.
pub fn register_voter<S: VoterStore + ?Sized>(
    store: &S,
    submission: &VoterSubmission,
    registered_by: Option<&str>,
) -> Result<i64, RegistrationError> {
    let mut voter = prepare_submission(submission)?;

    if store.national_id_exists(&voter.national_id)? {
        return Err(RegistrationError::AlreadyRegistered {
            national_id: voter.national_id,
        });
    }
    if let Some(leader_id) = voter.leader_id {
        if !store.leader_is_active(leader_id)? {
            return Err(RegistrationError::UnknownLeader(leader_id));
        }
    }

    voter.registered_by = registered_by.map(str::to_string);
    let id = store.insert_voter(&voter)?;
    info!(
        voter_id = id,
        registered_by = registered_by.unwrap_or("-"),
        state = %voter.classification,
        "voter registered"
    );
    Ok(id)
}

/// Pre-registration check: the ID must be well-formed and not taken by
/// another voter before the registry is consulted. Pass `exclude_voter_id`
/// when re-verifying a voter who is already stored.
pub fn verify_for_registration<S, R>(
    store: &S,
    registry: &R,
    cedula: &str,
    manual: Option<&ManualRecord>,
    exclude_voter_id: Option<i64>,
) -> Result<VerificationOutcome, RegistrationError>
where
    S: VoterStore + ?Sized,
    R: RegistryLookup + ?Sized,
{
    let national_id = validate_national_id(cedula)?;
    if let Some(existing) = store.find_voter_id(&national_id)? {
        if Some(existing) != exclude_voter_id {
            return Err(RegistrationError::AlreadyRegistered { national_id });
        }
    }
    Ok(verify(registry, &national_id, manual))
}
