//! Row-by-row acceptance of voters coming from a spreadsheet import.
//!
//! Bulk rows never go through the registry: they are stored `unverified`,
//! without gender, and a bad row never stops the rest of the batch.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{StoreError, VoterStore};
use crate::normalize::{normalize_optional, normalize_text};
use crate::schema::{BulkImportReport, Classification, NewVoter, RejectionKind, RowError, VoterRow};
use crate::validation::{
    optional_text, parse_age, residence_address, validate_name, validate_national_id,
    validate_phone, ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("national ID {national_id} already registered")]
    AlreadyRegistered { national_id: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl RowRejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            RowRejection::Invalid(_) => RejectionKind::Validation,
            RowRejection::AlreadyRegistered { .. } => RejectionKind::Conflict,
            RowRejection::Storage(_) => RejectionKind::Storage,
        }
    }

    fn at_row(&self, row: usize) -> RowError {
        RowError {
            row,
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<StoreError> for RowRejection {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { national_id } => RowRejection::AlreadyRegistered { national_id },
            StoreError::Backend(message) => RowRejection::Storage(message),
        }
    }
}

/// Who and what a batch is attributed to.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    pub leader_id: Option<i64>,
    pub registered_by: Option<String>,
    pub source_name: Option<String>,
}

/// Decide whether one row is well-formed, filling the defaults bulk import
/// applies. Uniqueness is checked by [`import_rows`].
pub fn classify_row(row: &VoterRow) -> Result<NewVoter, RowRejection> {
    let name = validate_name(&row.name)?;
    let national_id = validate_national_id(&row.national_id)?;
    let age = parse_age(row.age.as_deref())?;
    let phone = validate_phone(row.phone.as_deref())?;

    Ok(NewVoter {
        name: normalize_text(name),
        national_id,
        age,
        phone,
        residence_address: residence_address(row.residence_address.as_deref()),
        gender: None,
        department: normalize_optional(row.department.as_deref()),
        municipality: normalize_optional(row.municipality.as_deref()),
        voting_place: normalize_optional(row.voting_place.as_deref()),
        table: normalize_optional(row.table.as_deref()),
        polling_address: None,
        classification: Classification::Unverified,
        discrepancies: Vec::new(),
        leader_id: None,
        registered_by: None,
        notes: optional_text(row.notes.as_deref()),
    })
}

/// Import rows in order. Each row is accepted or rejected on its own; the
/// report keeps the source row number of every rejection.
pub fn import_rows<S: VoterStore + ?Sized>(
    store: &S,
    context: &ImportContext,
    rows: &[VoterRow],
) -> BulkImportReport {
    let mut report = BulkImportReport {
        created: 0,
        total_rows: rows.len(),
        errors: Vec::new(),
    };

    for row in rows {
        match import_row(store, context, row) {
            Ok(id) => {
                debug!(row = row.row, voter_id = id, "row imported");
                report.created += 1;
            }
            Err(rejection) => {
                if let RowRejection::Storage(message) = &rejection {
                    warn!(row = row.row, error = %message, "row failed to persist");
                } else {
                    debug!(row = row.row, reason = %rejection, "row rejected");
                }
                report.errors.push(rejection.at_row(row.row));
            }
        }
    }

    info!(
        source = context.source_name.as_deref().unwrap_or("-"),
        created = report.created,
        rejected = report.errors.len(),
        total = report.total_rows,
        "bulk import finished"
    );
    report
}

fn import_row<S: VoterStore + ?Sized>(
    store: &S,
    context: &ImportContext,
    row: &VoterRow,
) -> Result<i64, RowRejection> {
    let mut voter = classify_row(row)?;
    if store.national_id_exists(&voter.national_id)? {
        return Err(RowRejection::AlreadyRegistered {
            national_id: voter.national_id,
        });
    }
    voter.leader_id = context.leader_id;
    voter.registered_by = context.registered_by.clone();
    // a concurrent writer can still win the race; insert reports it as a conflict
    Ok(store.insert_voter(&voter)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::collections::HashSet;

    fn row(position: usize, national_id: &str) -> VoterRow {
        VoterRow {
            row: position,
            name: "  maria   lopez ".to_string(),
            national_id: national_id.to_string(),
            ..VoterRow::default()
        }
    }

    /// In-memory store; `hidden` IDs pass the pre-check but collide on insert.
    #[derive(Default)]
    struct MemoryStore {
        ids: RefCell<HashSet<String>>,
        hidden: HashSet<String>,
        inserted: RefCell<Vec<NewVoter>>,
        broken: bool,
    }

    impl VoterStore for MemoryStore {
        fn find_voter_id(&self, national_id: &str) -> Result<Option<i64>, StoreError> {
            Ok(self.ids.borrow().contains(national_id).then_some(1))
        }

        fn leader_is_active(&self, _leader_id: i64) -> Result<bool, StoreError> {
            Ok(true)
        }

        fn insert_voter(&self, voter: &NewVoter) -> Result<i64, StoreError> {
            if self.broken {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            if self.hidden.contains(&voter.national_id)
                || !self.ids.borrow_mut().insert(voter.national_id.clone())
            {
                return Err(StoreError::Conflict {
                    national_id: voter.national_id.clone(),
                });
            }
            self.inserted.borrow_mut().push(voter.clone());
            Ok(self.inserted.borrow().len() as i64)
        }
    }

    #[test]
    fn valid_row_gets_bulk_defaults() {
        let voter = classify_row(&row(2, "1.144.123.456")).unwrap();
        assert_eq!(voter.name, "MARIA LOPEZ");
        assert_eq!(voter.national_id, "1144123456");
        assert_eq!(voter.age, 18);
        assert_eq!(voter.phone, None);
        assert_eq!(voter.residence_address, "Por definir");
        assert_eq!(voter.gender, None);
        assert_eq!(voter.classification, Classification::Unverified);
        assert!(voter.discrepancies.is_empty());
        assert_eq!(voter.department, None);
        assert_eq!(voter.notes, None);
    }

    #[test]
    fn place_fields_are_normalized_when_present() {
        let mut input = row(2, "123456");
        input.department = Some(" valle  del cauca ".to_string());
        input.municipality = Some("   ".to_string());
        input.voting_place = Some("col. san jose".to_string());
        input.table = Some(" 12 ".to_string());
        input.notes = Some("  referido por Ana ".to_string());

        let voter = classify_row(&input).unwrap();
        assert_eq!(voter.department.as_deref(), Some("VALLE DEL CAUCA"));
        assert_eq!(voter.municipality, None);
        assert_eq!(voter.voting_place.as_deref(), Some("COL. SAN JOSE"));
        assert_eq!(voter.table.as_deref(), Some("12"));
        assert_eq!(voter.notes.as_deref(), Some("referido por Ana"));
    }

    #[rstest]
    #[case(Some("17"), false)]
    #[case(Some(""), true)]
    #[case(None, true)]
    #[case(Some("121"), false)]
    #[case(Some("45"), true)]
    fn age_decides_row(#[case] age: Option<&str>, #[case] accepted: bool) {
        let mut input = row(3, "123456");
        input.age = age.map(str::to_string);
        assert_eq!(classify_row(&input).is_ok(), accepted);
    }

    #[rstest]
    #[case(Some("3001234567"), true)]
    #[case(Some("2001234567"), false)]
    #[case(Some(""), true)]
    fn phone_decides_row(#[case] phone: Option<&str>, #[case] accepted: bool) {
        let mut input = row(3, "123456");
        input.phone = phone.map(str::to_string);
        let outcome = classify_row(&input);
        assert_eq!(outcome.is_ok(), accepted);
        if phone == Some("") {
            assert_eq!(outcome.unwrap().phone, None);
        }
    }

    #[test]
    fn bad_name_or_id_is_a_validation_rejection() {
        let mut input = row(4, "123456");
        input.name = " x ".to_string();
        let rejection = classify_row(&input).unwrap_err();
        assert_eq!(rejection.kind(), RejectionKind::Validation);

        let rejection = classify_row(&row(4, "12345")).unwrap_err();
        assert_eq!(rejection, RowRejection::Invalid(ValidationError::NationalId));
    }

    #[test]
    fn duplicate_in_batch_is_a_conflict_on_the_second_row() {
        let store = MemoryStore::default();
        let rows = vec![row(2, "123456"), row(3, "123456")];
        let report = import_rows(&store, &ImportContext::default(), &rows);

        assert_eq!(report.created, 1);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 3);
        assert_eq!(report.errors[0].kind, RejectionKind::Conflict);
        assert_eq!(
            report.errors[0].to_string(),
            "row 3: national ID 123456 already registered"
        );
    }

    #[test]
    fn rejected_rows_do_not_stop_the_batch() {
        let store = MemoryStore::default();
        let mut bad_age = row(3, "234567");
        bad_age.age = Some("17".to_string());
        let rows = vec![row(2, "123456"), bad_age, row(4, "345678")];

        let report = import_rows(&store, &ImportContext::default(), &rows);
        assert_eq!(report.created, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 3);
        assert_eq!(report.errors[0].kind, RejectionKind::Validation);
    }

    #[test]
    fn commit_time_conflict_is_reported_as_already_registered() {
        let store = MemoryStore {
            hidden: HashSet::from(["123456".to_string()]),
            ..MemoryStore::default()
        };
        let report = import_rows(&store, &ImportContext::default(), &[row(7, "123456")]);
        assert_eq!(report.created, 0);
        assert_eq!(report.errors[0].row, 7);
        assert_eq!(report.errors[0].kind, RejectionKind::Conflict);
    }

    #[test]
    fn storage_failures_are_recorded_per_row() {
        let store = MemoryStore {
            broken: true,
            ..MemoryStore::default()
        };
        let rows = vec![row(2, "123456"), row(3, "234567")];
        let report = import_rows(&store, &ImportContext::default(), &rows);
        assert_eq!(report.created, 0);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.kind == RejectionKind::Storage));
    }

    #[test]
    fn context_is_stamped_on_imported_voters() {
        let store = MemoryStore::default();
        let context = ImportContext {
            leader_id: Some(9),
            registered_by: Some("operador1".to_string()),
            source_name: Some("barrio_norte.xlsx".to_string()),
        };
        import_rows(&store, &context, &[row(2, "123456")]);

        let inserted = store.inserted.borrow();
        assert_eq!(inserted[0].leader_id, Some(9));
        assert_eq!(inserted[0].registered_by.as_deref(), Some("operador1"));
        assert_eq!(inserted[0].gender, None);
    }
}
