//! Field rules shared by bulk import rows and single registrations.

use thiserror::Error;

use crate::schema::Gender;

pub const MIN_AGE: i64 = 18;
pub const MAX_AGE: i64 = 120;
pub const DEFAULT_AGE: u8 = 18;
pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 200;
pub const ADDRESS_MAX_CHARS: usize = 500;
pub const ADDRESS_PLACEHOLDER: &str = "Por definir";

const PHONE_DIGITS: usize = 10;
const NATIONAL_ID_DIGITS: std::ops::RangeInclusive<usize> = 6..=10;
const NO_PHONE_MARKERS: [&str; 2] = ["NO TIENE", "NO TIENE CELULAR"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid name (at least 2 characters)")]
    NameTooShort,
    #[error("invalid name (at most 200 characters)")]
    NameTooLong,
    #[error("invalid national ID (6-10 digits)")]
    NationalId,
    #[error("age must be between 18 and 120 (or blank)")]
    Age,
    #[error("phone must be 10 digits starting with 3 (or blank)")]
    Phone,
    #[error("gender must be M, F or Otro")]
    Gender,
}

/// Strip the spaces and periods that spreadsheets and forms leave in IDs.
pub fn clean_national_id(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != ' ' && *c != '.').collect()
}

/// A cleaned national ID, 6 to 10 ASCII digits.
pub fn validate_national_id(raw: &str) -> Result<String, ValidationError> {
    let cleaned = clean_national_id(raw);
    if NATIONAL_ID_DIGITS.contains(&cleaned.len()) && cleaned.bytes().all(|b| b.is_ascii_digit()) {
        Ok(cleaned)
    } else {
        Err(ValidationError::NationalId)
    }
}

/// Trimmed name with at least two characters.
pub fn validate_name(raw: &str) -> Result<&str, ValidationError> {
    let name = raw.trim();
    if name.chars().count() < NAME_MIN_CHARS {
        return Err(ValidationError::NameTooShort);
    }
    Ok(name)
}

/// Age from spreadsheet text. Blank means the default age; whole-number
/// decimals such as `"34.0"` are accepted since sheets often store numbers
/// that way.
pub fn parse_age(raw: Option<&str>) -> Result<u8, ValidationError> {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(DEFAULT_AGE);
    };
    let age = match text.parse::<i64>() {
        Ok(age) => age,
        Err(_) => whole_number(text).ok_or(ValidationError::Age)?,
    };
    check_age(age)
}

pub fn check_age(age: i64) -> Result<u8, ValidationError> {
    if (MIN_AGE..=MAX_AGE).contains(&age) {
        u8::try_from(age).map_err(|_| ValidationError::Age)
    } else {
        Err(ValidationError::Age)
    }
}

fn whole_number(text: &str) -> Option<i64> {
    let value = text.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e12 {
        Some(value as i64)
    } else {
        None
    }
}

/// Mobile number: absent when blank, otherwise 10 digits starting with 3.
pub fn validate_phone(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(phone) = raw
        .map(|value| value.trim().replace(' ', ""))
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };
    let well_formed = phone.len() == PHONE_DIGITS
        && phone.bytes().all(|b| b.is_ascii_digit())
        && phone.starts_with('3');
    if well_formed {
        Ok(Some(phone))
    } else {
        Err(ValidationError::Phone)
    }
}

/// Like [`validate_phone`], also reading the "NO TIENE" marker the
/// registration form offers as absent.
pub fn validate_form_phone(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let stated_absent = raw
        .map(|value| value.trim().to_uppercase())
        .is_some_and(|value| NO_PHONE_MARKERS.contains(&value.as_str()));
    if stated_absent {
        return Ok(None);
    }
    validate_phone(raw)
}

pub fn parse_gender(raw: Option<&str>) -> Result<Option<Gender>, ValidationError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => Gender::parse(value).map(Some).ok_or(ValidationError::Gender),
    }
}

/// Residence address with the placeholder for blanks, capped in length.
pub fn residence_address(raw: Option<&str>) -> String {
    let address = raw.map(str::trim).unwrap_or_default();
    if address.is_empty() {
        return ADDRESS_PLACEHOLDER.to_string();
    }
    address.chars().take(ADDRESS_MAX_CHARS).collect()
}

/// Trimmed free text, `None` when blank.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
