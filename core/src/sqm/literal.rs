use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;

use crate::domain::BasicType;

/// Value of a literal node.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(Arc<str>),
    Character(char),
    Boolean(bool),
    Integer(i32),
    Long(i64),
    BigInteger(BigInt),
    Float(f32),
    Double(f64),
    BigDecimal(BigDecimal),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    OffsetDateTime(DateTime<FixedOffset>),
    ZonedDateTime {
        date_time: NaiveDateTime,
        zone: Arc<str>,
    },
    SqlDate(NaiveDate),
    SqlTime(NaiveTime),
    SqlTimestamp(NaiveDateTime),
    /// A JDBC timestamp escape carrying an offset.
    Calendar(DateTime<FixedOffset>),
}

impl LiteralValue {
    pub fn basic_type(&self) -> BasicType {
        match self {
            LiteralValue::String(_) => BasicType::String,
            LiteralValue::Character(_) => BasicType::Character,
            LiteralValue::Boolean(_) => BasicType::Boolean,
            LiteralValue::Integer(_) => BasicType::Integer,
            LiteralValue::Long(_) => BasicType::Long,
            LiteralValue::BigInteger(_) => BasicType::BigInteger,
            LiteralValue::Float(_) => BasicType::Float,
            LiteralValue::Double(_) => BasicType::Double,
            LiteralValue::BigDecimal(_) => BasicType::BigDecimal,
            LiteralValue::Binary(_) => BasicType::Binary,
            LiteralValue::Date(_) => BasicType::LocalDate,
            LiteralValue::Time(_) => BasicType::LocalTime,
            LiteralValue::DateTime(_) => BasicType::LocalDateTime,
            LiteralValue::OffsetDateTime(_) => BasicType::OffsetDateTime,
            LiteralValue::ZonedDateTime { .. } => BasicType::ZonedDateTime,
            LiteralValue::SqlDate(_) => BasicType::SqlDate,
            LiteralValue::SqlTime(_) => BasicType::SqlTime,
            LiteralValue::SqlTimestamp(_) => BasicType::SqlTimestamp,
            LiteralValue::Calendar(_) => BasicType::Calendar,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            LiteralValue::Character(c) => write!(f, "'{}'", c),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Integer(n) => write!(f, "{}", n),
            LiteralValue::Long(n) => write!(f, "{}L", n),
            LiteralValue::BigInteger(n) => write!(f, "{}BI", n),
            LiteralValue::Float(n) => write!(f, "{}F", n),
            LiteralValue::Double(n) => write!(f, "{}D", n),
            LiteralValue::BigDecimal(n) => write!(f, "{}BD", n),
            LiteralValue::Binary(bytes) => write!(f, "X'{}'", hex::encode_upper(bytes)),
            LiteralValue::Date(d) | LiteralValue::SqlDate(d) => write!(f, "{{{}}}", d),
            LiteralValue::Time(t) | LiteralValue::SqlTime(t) => write!(f, "{{{}}}", t),
            LiteralValue::DateTime(dt) | LiteralValue::SqlTimestamp(dt) => {
                write!(f, "{{{}}}", dt.format("%Y-%m-%d %H:%M:%S%.f"))
            }
            LiteralValue::OffsetDateTime(dt) | LiteralValue::Calendar(dt) => {
                write!(f, "{{{}}}", dt.format("%Y-%m-%d %H:%M:%S%.f %:z"))
            }
            LiteralValue::ZonedDateTime { date_time, zone } => {
                write!(f, "{{{} {}}}", date_time.format("%Y-%m-%d %H:%M:%S%.f"), zone)
            }
        }
    }
}
