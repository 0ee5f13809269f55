use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Offset, SubsecRound, Utc};
use super::{Mapper, wrong_domain_value};
use crate::core::{DomainValue, MappingError, Result, Value, ValueType};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Store timestamps keep microseconds.
pub(crate) fn to_store_instant(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(6)
}

fn expect_instant(value: &Value) -> Result<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Ok(None),
        Value::Timestamp(ts) => Ok(Some(*ts)),
        other => Err(other.mismatch(ValueType::Timestamp)),
    }
}

fn expect_text(value: &Value) -> Result<Option<&str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(other.mismatch(ValueType::String)),
    }
}

fn parse_error(kind: &str, text: &str, err: chrono::ParseError) -> MappingError {
    MappingError::Conversion(format!("'{}' is not a valid {}: {}", text, kind, err))
}

/// `DateTime<FixedOffset>` as a store timestamp.
///
/// The offset is not stored; values read back carry the UTC offset and denote
/// the same instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct OffsetDateTimeMapper;

impl Mapper for OffsetDateTimeMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::OffsetDateTime(dt) => {
                Ok(Value::Timestamp(to_store_instant(dt.with_timezone(&Utc))))
            }
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        Ok(match expect_instant(value)? {
            Some(ts) => DomainValue::OffsetDateTime(ts.with_timezone(&Utc.fix())),
            None => DomainValue::Null,
        })
    }
}

/// `DateTime<Utc>` as a store timestamp.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZonedDateTimeMapper;

impl Mapper for ZonedDateTimeMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::ZonedDateTime(dt) => Ok(Value::Timestamp(to_store_instant(dt))),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        Ok(match expect_instant(value)? {
            Some(ts) => DomainValue::ZonedDateTime(ts),
            None => DomainValue::Null,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDateMapper;

impl Mapper for LocalDateMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::LocalDate(d) => Ok(Value::String(d.format(DATE_FORMAT).to_string())),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match expect_text(value)? {
            Some(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(DomainValue::LocalDate)
                .map_err(|e| parse_error("date", text, e)),
            None => Ok(DomainValue::Null),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDateTimeMapper;

impl Mapper for LocalDateTimeMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::LocalDateTime(dt) => {
                Ok(Value::String(dt.format(DATE_TIME_FORMAT).to_string()))
            }
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match expect_text(value)? {
            Some(text) => NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
                .map(DomainValue::LocalDateTime)
                .map_err(|e| parse_error("date-time", text, e)),
            None => Ok(DomainValue::Null),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTimeMapper;

impl Mapper for LocalTimeMapper {
    fn to_store(&self, value: DomainValue) -> Result<Value> {
        match value {
            DomainValue::Null => Ok(Value::Null),
            DomainValue::LocalTime(t) => Ok(Value::String(t.format(TIME_FORMAT).to_string())),
            other => Err(wrong_domain_value(self.name(), &other)),
        }
    }

    fn to_domain(&self, value: &Value) -> Result<DomainValue> {
        match expect_text(value)? {
            Some(text) => NaiveTime::parse_from_str(text, TIME_FORMAT)
                .map(DomainValue::LocalTime)
                .map_err(|e| parse_error("time", text, e)),
            None => Ok(DomainValue::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_offset_date_time_keeps_instant() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let original = offset.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();

        let stored = OffsetDateTimeMapper.to_store(DomainValue::OffsetDateTime(original)).unwrap();
        let Value::Timestamp(ts) = stored else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());

        match OffsetDateTimeMapper.to_domain(&Value::Timestamp(ts)).unwrap() {
            DomainValue::OffsetDateTime(back) => assert_eq!(back, original),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncates_to_microseconds() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let stored = ZonedDateTimeMapper.to_store(DomainValue::ZonedDateTime(precise)).unwrap();
        assert_eq!(
            stored.as_timestamp().map(|ts| ts.timestamp_subsec_nanos()),
            Some(123_456_000)
        );
    }

    #[test]
    fn test_non_temporal_store_value_is_rejected() {
        let err = ZonedDateTimeMapper.to_domain(&Value::Long(5)).unwrap_err();
        assert!(matches!(err, MappingError::Conversion(_)));
        assert!(OffsetDateTimeMapper.to_domain(&Value::String("2024-01-01".into())).is_err());
    }

    #[test]
    fn test_local_values_are_iso_text() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(
            LocalDateMapper.to_store(DomainValue::LocalDate(date)).unwrap(),
            Value::String("2023-12-31".into())
        );

        let dt = date.and_hms_micro_opt(23, 59, 58, 250_000).unwrap();
        let stored = LocalDateTimeMapper.to_store(DomainValue::LocalDateTime(dt)).unwrap();
        assert_eq!(stored, Value::String("2023-12-31T23:59:58.250".into()));
        match LocalDateTimeMapper.to_domain(&stored).unwrap() {
            DomainValue::LocalDateTime(back) => assert_eq!(back, dt),
            other => panic!("unexpected {:?}", other),
        }

        let time = NaiveTime::from_hms_opt(7, 5, 0).unwrap();
        let stored = LocalTimeMapper.to_store(DomainValue::LocalTime(time)).unwrap();
        assert_eq!(stored, Value::String("07:05:00".into()));
        assert!(LocalTimeMapper.to_domain(&Value::String("25:00:00".into())).is_err());
    }
}
