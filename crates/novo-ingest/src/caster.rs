//! Last-stage typing of raw text records
//!
//! Casting never fails at the row level: a value that cannot be coerced to its
//! declared type becomes null. The declared schema decides the output shape,
//! so undeclared raw columns are dropped and missing ones come out null.

use chrono::NaiveDate;
use novo_common::types::{
    ColumnSpec, ColumnType, DatasetDescriptor, RawRecord, TypedRecord, TypedValue,
};

const THOUSANDS_SEPARATOR: char = ',';

/// Casts raw records against one dataset's declared schema
#[derive(Debug, Clone)]
pub struct SchemaCaster {
    schema: Vec<ColumnSpec>,
    date_format: String,
}

impl SchemaCaster {
    pub fn new(descriptor: &DatasetDescriptor) -> Self {
        Self {
            schema: descriptor.columns().to_vec(),
            date_format: descriptor.date_format().to_string(),
        }
    }

    pub fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    pub fn cast(&self, record: &RawRecord) -> TypedRecord {
        cast(record, &self.schema, &self.date_format)
    }
}

/// Type `record` positionally against `schema`
pub fn cast(record: &RawRecord, schema: &[ColumnSpec], date_format: &str) -> TypedRecord {
    let values = schema
        .iter()
        .map(|column| {
            record
                .get(&column.name)
                .and_then(|raw| cast_value(raw, column.column_type, date_format))
        })
        .collect();
    TypedRecord::new(values)
}

/// Coerce a single raw value, returning `None` when it does not fit `column_type`
pub fn cast_value(raw: &str, column_type: ColumnType, date_format: &str) -> Option<TypedValue> {
    match column_type {
        ColumnType::Date => parse_date(raw, date_format).map(TypedValue::Date),
        ColumnType::Integer => parse_integer(raw).map(TypedValue::Integer),
        ColumnType::Float => parse_float(raw).map(TypedValue::Float),
        ColumnType::String => Some(TypedValue::String(raw.to_string())),
    }
}

fn parse_date(raw: &str, date_format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), date_format).ok()
}

fn strip_separators(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != THOUSANDS_SEPARATOR).collect()
}

fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned = strip_separators(raw);
    if let Ok(value) = cleaned.parse::<i64>() {
        return Some(value);
    }

    // "12.0" is still a whole number; "12.5" is not.
    let value = cleaned.parse::<f64>().ok()?;
    if value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
    {
        Some(value as i64)
    } else {
        None
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    strip_separators(raw)
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use novo_common::types::DEFAULT_DATE_FORMAT;

    fn schema() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("date", ColumnType::Date),
            ColumnSpec::new("cases", ColumnType::Integer),
            ColumnSpec::new("rate", ColumnType::Float),
            ColumnSpec::new("Province/State", ColumnType::String),
        ]
    }

    #[test]
    fn test_integer_with_thousands_separator() {
        assert_eq!(parse_integer("1,234"), Some(1234));
        assert_eq!(parse_integer(" 1,234,567 "), Some(1_234_567));
        assert_eq!(parse_integer("-42"), Some(-42));
    }

    #[test]
    fn test_unparsable_integer_is_null() {
        assert_eq!(parse_integer("not-a-number"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("12.5"), None);
        assert_eq!(parse_integer("1e400"), None);
    }

    #[test]
    fn test_integral_decimal_is_accepted() {
        assert_eq!(parse_integer("12.0"), Some(12));
        assert_eq!(parse_integer("1,000.00"), Some(1000));
    }

    #[test]
    fn test_integer_does_not_lose_precision() {
        assert_eq!(parse_integer("9007199254740993"), Some(9_007_199_254_740_993));
    }

    #[test]
    fn test_float_parsing() {
        assert_eq!(parse_float("3.5"), Some(3.5));
        assert_eq!(parse_float("1,234.5"), Some(1234.5));
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("inf"), None);
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn test_date_parsing_uses_format() {
        assert_eq!(
            parse_date("2020-03-01", DEFAULT_DATE_FORMAT),
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
        assert_eq!(
            parse_date("03/01/2020", "%m/%d/%Y"),
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
        assert_eq!(parse_date("2020-02-30", DEFAULT_DATE_FORMAT), None);
        assert_eq!(parse_date("yesterday", DEFAULT_DATE_FORMAT), None);
    }

    #[test]
    fn test_string_passes_through_unchanged() {
        assert_eq!(
            cast_value("  padded ", ColumnType::String, DEFAULT_DATE_FORMAT),
            Some(TypedValue::String("  padded ".to_string()))
        );
        assert_eq!(
            cast_value("", ColumnType::String, DEFAULT_DATE_FORMAT),
            Some(TypedValue::String(String::new()))
        );
    }

    #[test]
    fn test_cast_follows_schema_shape() {
        let record = RawRecord::new()
            .with("date", Some("2020-01-22"))
            .with("cases", Some("1,234"))
            .with("rate", Some("oops"))
            .with("undeclared", Some("dropped"));

        let typed = cast(&record, &schema(), DEFAULT_DATE_FORMAT);

        assert_eq!(typed.values().len(), 4);
        assert_eq!(
            typed.value(0),
            Some(&TypedValue::Date(NaiveDate::from_ymd_opt(2020, 1, 22).unwrap()))
        );
        assert_eq!(typed.value(1), Some(&TypedValue::Integer(1234)));
        assert_eq!(typed.value(2), None);
        assert_eq!(typed.value(3), None);
    }

    #[test]
    fn test_null_raw_values_stay_null() {
        let record = RawRecord::new()
            .with("date", None)
            .with("cases", None)
            .with("Province/State", None);
        let typed = cast(&record, &schema(), DEFAULT_DATE_FORMAT);
        assert!(typed.values().iter().all(Option::is_none));
    }

    #[test]
    fn test_schema_caster_uses_descriptor_date_format() {
        let descriptor = DatasetDescriptor::new(
            "cases",
            vec!["date".to_string()],
            vec![ColumnSpec::new("date", ColumnType::Date)],
        )
        .unwrap()
        .with_date_format("%d.%m.%Y")
        .unwrap();

        let caster = SchemaCaster::new(&descriptor);
        let typed = caster.cast(&RawRecord::new().with("date", Some("05.04.2021")));
        assert_eq!(
            typed.get(caster.schema(), "date"),
            Some(&TypedValue::Date(NaiveDate::from_ymd_opt(2021, 4, 5).unwrap()))
        );
    }
}
