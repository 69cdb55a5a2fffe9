//! Access to the national registry and interpretation of its answers.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::reconcile::compare;
use crate::schema::{AuthoritativeRecord, ManualRecord, VerificationOutcome};
use crate::validation::clean_national_id;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("national ID not found in the registry")]
    NotFound,
    #[error("registry credential rejected or expired")]
    InvalidCredential,
    #[error("document number missing or malformed")]
    MalformedRequest,
    #[error("registry unreachable: {0}")]
    Transport(String),
}

/// Looks up the raw registry payload for a document number.
pub trait RegistryLookup {
    fn lookup(&self, document_number: &str) -> Result<Value, LookupFailure>;
}

/// The registry expects bare digits: no spaces, no thousands separators.
pub fn document_number(cedula: &str) -> String {
    clean_national_id(cedula)
}

impl AuthoritativeRecord {
    /// Read a registry payload, unwrapping a `data` envelope when present.
    /// Returns `None` when the payload is not an object or carries no fields.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let body = match payload.get("data") {
            Some(data) => data,
            None => payload,
        };
        let fields = body.as_object().filter(|fields| !fields.is_empty())?;
        Some(AuthoritativeRecord {
            department: text_field(fields, "department"),
            municipality: text_field(fields, "municipality"),
            voting_station: text_field(fields, "votingStation"),
            polling_table: text_field(fields, "pollingTable"),
            address: text_field(fields, "address"),
        })
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Look the ID up and, when operator data is given, reconcile against it.
pub fn verify<R: RegistryLookup + ?Sized>(
    registry: &R,
    cedula: &str,
    manual: Option<&ManualRecord>,
) -> VerificationOutcome {
    let payload = match registry.lookup(&document_number(cedula)) {
        Ok(payload) => payload,
        Err(failure) => {
            warn!(error = %failure, "registry lookup failed");
            let result = compare(None, manual.unwrap_or(&ManualRecord::default()));
            return VerificationOutcome {
                success: false,
                record: None,
                error: Some(failure.to_string()),
                classification: Some(result.classification),
                discrepancies: result.discrepancies,
            };
        }
    };

    let record = AuthoritativeRecord::from_payload(&payload);
    let Some(manual) = manual else {
        return VerificationOutcome {
            success: true,
            record,
            error: None,
            classification: None,
            discrepancies: Vec::new(),
        };
    };

    let result = compare(record.as_ref(), manual);
    VerificationOutcome {
        success: true,
        record,
        error: None,
        classification: Some(result.classification),
        discrepancies: result.discrepancies,
    }
}

/// Registry answers served from a JSON file keyed by document number.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    payloads: HashMap<String, Value>,
}

impl FixtureRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading registry fixtures {}", path.display()))?;
        let payloads: HashMap<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing registry fixtures {}", path.display()))?;
        Ok(Self { payloads })
    }

    pub fn insert(&mut self, document_number: impl Into<String>, payload: Value) {
        self.payloads.insert(document_number.into(), payload);
    }
}

impl RegistryLookup for FixtureRegistry {
    fn lookup(&self, document_number: &str) -> Result<Value, LookupFailure> {
        if document_number.is_empty() || !document_number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LookupFailure::MalformedRequest);
        }
        self.payloads
            .get(document_number)
            .cloned()
            .ok_or(LookupFailure::NotFound)
    }
}
