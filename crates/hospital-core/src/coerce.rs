//! Explicit text-to-value coercion for source fields.
//!
//! Every numeric or date column goes through one of these helpers so a bad
//! value surfaces as a [`RowParseError`] naming the field, never as a raw
//! decoder error.

use chrono::NaiveDate;

use crate::error::RowParseError;

/// Date format used by every date column in the sources.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn integer(field: &str, value: &str) -> Result<i64, RowParseError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| RowParseError::new(field, value, "an integer"))
}

pub fn float(field: &str, value: &str) -> Result<f64, RowParseError> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|_| RowParseError::new(field, value, "a number"))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(RowParseError::new(field, value, "a finite number"))
    }
}

/// Validate an ISO date and return it in canonical form.
pub fn date(field: &str, value: &str) -> Result<String, RowParseError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map(|d| d.format(DATE_FORMAT).to_string())
        .map_err(|_| RowParseError::new(field, value, "a date (YYYY-MM-DD)"))
}

pub fn optional_integer(field: &str, value: &str) -> Result<Option<i64>, RowParseError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        integer(field, value).map(Some)
    }
}

pub fn optional_float(field: &str, value: &str) -> Result<Option<f64>, RowParseError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        float(field, value).map(Some)
    }
}

pub fn optional_date(field: &str, value: &str) -> Result<Option<String>, RowParseError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        date(field, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_trims_whitespace() {
        assert_eq!(integer("hospital_id", " 42 ").unwrap(), 42);
    }

    #[test]
    fn test_integer_rejects_text() {
        let err = integer("room_number", "12B").unwrap_err();
        assert_eq!(err.field, "room_number");
        assert_eq!(err.value, "12B");
        assert_eq!(err.expected, "an integer");
    }

    #[test]
    fn test_float_accepts_integral_text() {
        assert_eq!(float("salary", "250000").unwrap(), 250000.0);
        assert_eq!(float("salary", "1234.56").unwrap(), 1234.56);
    }

    #[test]
    fn test_float_rejects_non_numeric_and_nan() {
        assert!(float("salary", "a lot").is_err());
        assert!(float("salary", "NaN").is_err());
        assert!(float("salary", "").is_err());
    }

    #[test]
    fn test_date_validation() {
        assert_eq!(date("patient_dob", "1980-02-29").unwrap(), "1980-02-29");
        assert!(date("patient_dob", "1981-02-29").is_err());
        assert!(date("patient_dob", "03/04/1990").is_err());
    }

    #[test]
    fn test_optional_helpers_treat_blank_as_none() {
        assert_eq!(optional_integer("payer_id", "").unwrap(), None);
        assert_eq!(optional_float("billing_amount", "  ").unwrap(), None);
        assert_eq!(optional_date("discharge_date", "").unwrap(), None);
        assert_eq!(optional_integer("payer_id", "7").unwrap(), Some(7));
        assert!(optional_float("billing_amount", "n/a").is_err());
    }
}
