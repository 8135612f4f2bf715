//! Pure helpers exposed to form rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

const MS_PER_DAY: i64 = 1000 * 60 * 60 * 24;

/// Concatenate first and last name, trimming the ends.
pub fn full_name(first: &str, last: &str) -> String {
    format!("{first} {last}").trim().to_string()
}

/// Number of whole days between two dates, ignoring direction.
///
/// Returns 0 when either date cannot be parsed.
pub fn days_between(end: &str, start: &str) -> i64 {
    match (parse_date(start), parse_date(end)) {
        (Some(start), Some(end)) => days_between_instants(end, start),
        _ => 0,
    }
}

pub fn days_between_instants(end: DateTime<Utc>, start: DateTime<Utc>) -> i64 {
    let diff_ms = (end - start).num_milliseconds().abs();
    diff_ms / MS_PER_DAY
}

/// Parse the date formats rules hand us: plain dates, RFC 3339 timestamps and
/// zone-less timestamps (read as UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Hide the first five digits of a mobile number.
///
/// The result keeps the leading space the form templates expect.
pub fn mask_mobile_number(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let rest: String = value.chars().skip(5).collect();
    format!(" *****{rest}")
}

/// Replace every array value with its comma-joined string form.
///
/// Applied to exported form data before submission so multi-select fields
/// travel as a single string.
pub fn join_array_fields(data: &mut Map<String, Value>) {
    for value in data.values_mut() {
        if let Value::Array(items) = value {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            *value = Value::String(joined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_name() {
        assert_eq!(full_name("Ada", "Lovelace"), "Ada Lovelace");
        assert_eq!(full_name("", "Lovelace"), "Lovelace");
        assert_eq!(full_name("Ada", ""), "Ada");
    }

    #[test]
    fn test_days_between_ignores_order() {
        assert_eq!(days_between("2024-03-01", "2024-02-01"), 29);
        assert_eq!(days_between("2024-02-01", "2024-03-01"), 29);
    }

    #[test]
    fn test_days_between_floors_partial_days() {
        assert_eq!(
            days_between("2024-01-02T23:59:00Z", "2024-01-01T00:00:00Z"),
            1
        );
    }

    #[test]
    fn test_days_between_invalid_is_zero() {
        assert_eq!(days_between("tomorrow", "2024-01-01"), 0);
        assert_eq!(days_between("2024-01-01", ""), 0);
    }

    #[test]
    fn test_mask_mobile_number() {
        assert_eq!(mask_mobile_number("9876543210"), " *****43210");
        assert_eq!(mask_mobile_number("123"), " *****");
        assert_eq!(mask_mobile_number(""), "");
    }

    #[test]
    fn test_join_array_fields() {
        let mut data = json!({
            "colors": ["red", "green"],
            "count": [1, 2, 3],
            "name": "x"
        })
        .as_object()
        .cloned()
        .unwrap();
        join_array_fields(&mut data);
        assert_eq!(data["colors"], json!("red,green"));
        assert_eq!(data["count"], json!("1,2,3"));
        assert_eq!(data["name"], json!("x"));
    }
}
