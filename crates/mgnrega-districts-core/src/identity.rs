// SPDX-License-Identifier: Apache-2.0

use crate::record::Record;

const PLACEHOLDER_STATE: &str = "s";
const PLACEHOLDER_DISTRICT: &str = "d";
const PLACEHOLDER_FIN_YEAR: &str = "fy";
const PLACEHOLDER_MONTH: &str = "m";

/// Derived id of a record with every identity field missing.
pub const ALL_PLACEHOLDER_ID: &str = "s_d_fy_m";

/// Canonical derived id: the four identity fields joined with `_`, with a
/// per-position placeholder standing in for any field that is missing or
/// falsy (zero for the codes, empty for the labels). Positional
/// placeholders keep ids structurally comparable; omitting a segment would
/// make `12_` and `1_2` ambiguous.
#[must_use]
pub fn derived_id(record: &Record) -> String {
    format!(
        "{}_{}_{}_{}",
        code_segment(record.state_code, PLACEHOLDER_STATE),
        code_segment(record.district_code, PLACEHOLDER_DISTRICT),
        label_segment(record.fin_year.as_deref(), PLACEHOLDER_FIN_YEAR),
        label_segment(record.month.as_deref(), PLACEHOLDER_MONTH),
    )
}

/// Id the record should be stored under: an explicit non-empty `id` wins
/// over the derived one, preserving externally assigned ids from prior
/// imports.
#[must_use]
pub fn effective_id(record: &Record) -> String {
    match record.explicit_id() {
        Some(explicit) => explicit.to_string(),
        None => derived_id(record),
    }
}

fn code_segment(value: Option<i64>, placeholder: &'static str) -> String {
    match value {
        Some(code) if code != 0 => code.to_string(),
        _ => placeholder.to_string(),
    }
}

fn label_segment<'a>(value: Option<&'a str>, placeholder: &'static str) -> &'a str {
    match value {
        Some(label) if !label.is_empty() => label,
        _ => placeholder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(
        state_code: Option<i64>,
        district_code: Option<i64>,
        fin_year: Option<&str>,
        month: Option<&str>,
    ) -> Record {
        Record {
            state_code,
            district_code,
            fin_year: fin_year.map(str::to_string),
            month: month.map(str::to_string),
            ..Record::default()
        }
    }

    #[test]
    fn full_tuple() {
        let r = record(Some(9), Some(12), Some("2023-2024"), Some("April"));
        assert_eq!(derived_id(&r), "9_12_2023-2024_April");
    }

    #[test]
    fn empty_record_is_all_placeholders() {
        assert_eq!(derived_id(&Record::default()), ALL_PLACEHOLDER_ID);
    }

    #[test]
    fn each_position_has_its_own_placeholder() {
        assert_eq!(
            derived_id(&record(None, Some(12), Some("2023-2024"), Some("April"))),
            "s_12_2023-2024_April"
        );
        assert_eq!(
            derived_id(&record(Some(9), None, Some("2023-2024"), Some("April"))),
            "9_d_2023-2024_April"
        );
        assert_eq!(
            derived_id(&record(Some(9), Some(12), None, Some("April"))),
            "9_12_fy_April"
        );
        assert_eq!(
            derived_id(&record(Some(9), Some(12), Some("2023-2024"), None)),
            "9_12_2023-2024_m"
        );
    }

    #[test]
    fn zero_codes_and_empty_labels_count_as_missing() {
        let r = record(Some(0), Some(12), Some(""), Some("April"));
        assert_eq!(derived_id(&r), "s_12_fy_April");
    }

    #[test]
    fn explicit_id_wins() {
        let mut r = record(Some(9), Some(12), Some("2023-2024"), Some("April"));
        r.id = Some("legacy-import-41".to_string());
        assert_eq!(effective_id(&r), "legacy-import-41");
    }

    #[test]
    fn empty_explicit_id_falls_back_to_derived() {
        let mut r = record(Some(9), Some(12), Some("2023-2024"), Some("April"));
        r.id = Some(String::new());
        assert_eq!(effective_id(&r), "9_12_2023-2024_April");
    }

    proptest! {
        #[test]
        fn identity_depends_only_on_the_four_fields(
            state in proptest::option::of(1i64..40),
            district in proptest::option::of(1i64..800),
            fy in proptest::option::of("[0-9]{4}-[0-9]{4}"),
            month in proptest::option::of("[A-Z][a-z]{2,8}"),
            noise_key in "[a-z_]{1,12}",
            noise_value in 0u64..1_000_000,
        ) {
            let mut a = record(state, district, fy.as_deref(), month.as_deref());
            let mut b = a.clone();
            b.extra.insert(noise_key, json!(noise_value));
            b.state_name = Some("Uttar Pradesh".to_string());
            prop_assert_eq!(derived_id(&a), derived_id(&b));
            // and it is total: never panics, always four segments
            a.extra.clear();
            prop_assert!(derived_id(&a).split('_').count() >= 4);
        }
    }
}
