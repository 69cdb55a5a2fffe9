//! Compares operator-entered polling data against the registry record.

use std::collections::BTreeSet;

use crate::normalize::{normalize_for_comparison, normalize_voting_place};
use crate::schema::{AuthoritativeRecord, Classification, Field, ManualRecord, ReconciliationResult};

/// Words ignored when comparing voting places token by token.
const PLACE_STOPWORDS: [&str; 12] = [
    "DE", "LA", "EL", "DEL", "LOS", "LAS", "UN", "UNA", "Y", "E", "AL", "EN",
];

/// Classify a registration against the registry.
///
/// A missing record short-circuits to `Inconsistent` without looking at any
/// field. Otherwise every disagreeing field is collected, and any number of
/// them yields `NeedsReview`; mismatches alone never produce `Inconsistent`.
pub fn compare(
    authoritative: Option<&AuthoritativeRecord>,
    manual: &ManualRecord,
) -> ReconciliationResult {
    let Some(authoritative) = authoritative else {
        return ReconciliationResult {
            classification: Classification::Inconsistent,
            discrepancies: Vec::new(),
        };
    };

    let discrepancies: Vec<Field> = Field::COMPARED
        .into_iter()
        .filter(|field| !field_matches(*field, authoritative, manual))
        .collect();

    let classification = if discrepancies.is_empty() {
        Classification::Verified
    } else {
        Classification::NeedsReview
    };

    ReconciliationResult {
        classification,
        discrepancies,
    }
}

fn field_matches(field: Field, authoritative: &AuthoritativeRecord, manual: &ManualRecord) -> bool {
    match field {
        Field::Department => exact_match(&authoritative.department, &manual.department),
        Field::Municipality => exact_match(&authoritative.municipality, &manual.municipality),
        Field::VotingStation => voting_place_matches(
            authoritative.voting_station.as_deref(),
            manual.voting_station.as_deref(),
        ),
        Field::PollingTable => exact_match(&authoritative.polling_table, &manual.polling_table),
    }
}

fn exact_match(authoritative: &Option<String>, manual: &Option<String>) -> bool {
    normalize_for_comparison(authoritative.as_deref()) == normalize_for_comparison(manual.as_deref())
}

/// Flexible comparison for the voting-place field.
///
/// Checks run cheapest first: both-empty, equality, containment, then a
/// stopword-free token subset test in either direction.
pub fn voting_place_matches(authoritative: Option<&str>, manual: Option<&str>) -> bool {
    let authoritative = normalize_voting_place(authoritative);
    let manual = normalize_voting_place(manual);

    if authoritative.is_empty() || manual.is_empty() {
        return authoritative == manual;
    }
    if authoritative == manual {
        return true;
    }
    if authoritative.contains(manual.as_str()) || manual.contains(authoritative.as_str()) {
        return true;
    }

    let authoritative_words = significant_words(&authoritative);
    let manual_words = significant_words(&manual);
    if manual_words.is_empty() {
        // nothing left to hold against the operator
        return true;
    }
    manual_words.is_subset(&authoritative_words) || authoritative_words.is_subset(&manual_words)
}

fn significant_words(place: &str) -> BTreeSet<&str> {
    place
        .split_whitespace()
        .filter(|word| word.chars().count() > 1 && !PLACE_STOPWORDS.contains(word))
        .collect()
}
