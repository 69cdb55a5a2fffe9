//! Canonical text forms used for storage and for comparing polling data.

/// Characters replaced by a space in voting-place names.
const PLACE_PUNCTUATION: [char; 6] = ['.', '-', ',', '_', ';', ':'];

/// Registry abbreviations and their expansion. Applied in order as plain
/// substring replacements, so an abbreviation that ends a longer word
/// (`NICOL ` -> `NICOLEGIO `) is expanded too.
const PLACE_ABBREVIATIONS: [(&str, &str); 6] = [
    ("LIC ", "LICEO "),
    ("COL ", "COLEGIO "),
    ("INST ", "INSTITUTO "),
    ("ESC ", "ESCUELA "),
    ("IED ", "INSTITUCION "),
    ("I E ", "INSTITUCION "),
];

/// Campus qualifiers dropped wherever a space or hyphen precedes them.
const PLACE_NOISE_SUFFIXES: [&str; 6] = [
    "BACHILLERATO",
    "PRIMARIA",
    "SECUNDARIA",
    "SEDE",
    "PRINCIPAL",
    "CENTRO",
];

/// Trim, upper-case and collapse whitespace. Missing values become `""`.
pub fn normalize_for_comparison(value: Option<&str>) -> String {
    value.map(normalize_text).unwrap_or_default()
}

/// Storage form of free text: upper-cased, single-spaced.
pub fn normalize_text(value: &str) -> String {
    collapse_whitespace(&value.to_uppercase())
}

/// Normalized text, or `None` when the value is missing or blank.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(normalize_text)
        .filter(|normalized| !normalized.is_empty())
}

/// Canonical form of a voting place, tolerant to abbreviation and campus noise.
pub fn normalize_voting_place(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    let spaced: String = value
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| if PLACE_PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();
    let mut place = collapse_whitespace(&spaced);

    for (abbreviation, expansion) in PLACE_ABBREVIATIONS {
        place = place.replace(abbreviation, expansion);
    }

    for suffix in PLACE_NOISE_SUFFIXES {
        place = place
            .replace(&format!("-{suffix}"), "")
            .replace(&format!(" {suffix}"), "");
    }

    collapse_whitespace(&place)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn comparison_form_trims_uppercases_and_collapses() {
        assert_eq!(
            normalize_for_comparison(Some("  valle   del\tcauca ")),
            "VALLE DEL CAUCA"
        );
    }

    #[test]
    fn missing_and_empty_compare_equal() {
        assert_eq!(normalize_for_comparison(None), "");
        assert_eq!(normalize_for_comparison(Some("   ")), "");
    }

    #[test]
    fn optional_form_drops_blank_values() {
        assert_eq!(normalize_optional(Some("  ")), None);
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some(" cali ")), Some("CALI".to_string()));
    }

    #[rstest]
    #[case("col. san jose", "COLEGIO SAN JOSE")]
    #[case("Lic. La Merced", "LICEO LA MERCED")]
    #[case("INST TECNICO INDUSTRIAL", "INSTITUTO TECNICO INDUSTRIAL")]
    #[case("esc rural el placer", "ESCUELA RURAL EL PLACER")]
    #[case("IED Simon Bolivar", "INSTITUCION SIMON BOLIVAR")]
    #[case("I.E. Santa Librada", "INSTITUCION SANTA LIBRADA")]
    fn expands_registry_abbreviations(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_voting_place(Some(raw)), expected);
    }

    #[rstest]
    #[case("COLEGIO SAN JOSE - SEDE PRINCIPAL", "COLEGIO SAN JOSE")]
    #[case("ESCUELA LA ESPERANZA PRIMARIA", "ESCUELA LA ESPERANZA")]
    #[case("LICEO ANDINO_BACHILLERATO", "LICEO ANDINO")]
    #[case("COLISEO CENTRO", "COLISEO")]
    fn strips_campus_noise(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_voting_place(Some(raw)), expected);
    }

    #[test]
    fn punctuation_becomes_single_spaces() {
        assert_eq!(
            normalize_voting_place(Some("  plaza;de:toros,  norte ")),
            "PLAZA DE TOROS NORTE"
        );
    }

    #[test]
    fn expansion_is_not_bounded_to_whole_words() {
        // Substring expansion reaches into longer words ending in an abbreviation.
        assert_eq!(
            normalize_voting_place(Some("CASA NICOL ROJAS")),
            "CASA NICOLEGIO ROJAS"
        );
        // Suffix stripping also eats the start of longer words.
        assert_eq!(
            normalize_voting_place(Some("PARQUE CENTROAMERICA")),
            "PARQUEAMERICA"
        );
    }

    #[test]
    fn suffix_removal_can_expose_a_new_abbreviation() {
        // Expansion runs before suffix stripping, so a second pass sees `I E `.
        let once = normalize_voting_place(Some("A I SEDE E SAN JOSE"));
        assert_eq!(once, "A I E SAN JOSE");
        assert_eq!(
            normalize_voting_place(Some(&once)),
            "A INSTITUCION SAN JOSE"
        );
    }

    #[test]
    fn trailing_abbreviation_is_left_alone() {
        assert_eq!(normalize_voting_place(Some("SAN JOSE COL")), "SAN JOSE COL");
    }

    #[rstest]
    #[case("col. san jose")]
    #[case("I.E. Santa Librada - Sede Primaria")]
    #[case("Lic   La Merced_Bachillerato")]
    #[case("")]
    #[case("ESC. NORMAL SUPERIOR")]
    fn voting_place_normalization_is_idempotent(#[case] raw: &str) {
        let once = normalize_voting_place(Some(raw));
        assert_eq!(normalize_voting_place(Some(&once)), once);
    }

    #[test]
    fn missing_voting_place_is_empty() {
        assert_eq!(normalize_voting_place(None), "");
    }
}
