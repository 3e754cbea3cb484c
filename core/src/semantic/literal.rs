//! Literal conversion.
//!
//! Turns terminal text into typed [`LiteralValue`]s. Every failure is a
//! [`HqlError::NumericFormat`] naming the offending text and target type.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use num_bigint::BigInt;
use regex::Regex;

use crate::domain::BasicType;
use crate::error::{HqlError, HqlResult};
use crate::hql::TokenKind;
use crate::hql::tree::JdbcEscapeKind;
use crate::sqm::LiteralValue;

lazy_static! {
    static ref REGION_ID: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9~/._+\-]+$").expect("valid zone id pattern");
    static ref OFFSET: Regex =
        Regex::new(r"^([+-])(\d{1,2})(?::?(\d{2}))?$").expect("valid offset pattern");
}

/// Strips a case-insensitive suffix.
fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    let split = text.len().saturating_sub(suffix.len());
    match text.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(suffix) => &text[..split],
        _ => text,
    }
}

pub fn string_literal(text: &str) -> LiteralValue {
    LiteralValue::String(Arc::from(text))
}

/// Dispatches on the lexical kind of a numeric terminal.
pub fn numeric_literal(kind: TokenKind, text: &str) -> HqlResult<LiteralValue> {
    match kind {
        TokenKind::IntegerLiteral => integer_literal(text),
        TokenKind::LongLiteral => long_literal(text),
        TokenKind::BigIntegerLiteral => big_integer_literal(text),
        TokenKind::HexLiteral => hex_literal(text),
        TokenKind::FloatLiteral => float_literal(text),
        TokenKind::DoubleLiteral => double_literal(text),
        TokenKind::BigDecimalLiteral => big_decimal_literal(text),
        other => Err(HqlError::Parsing(format!(
            "Unexpected terminal node [{}] of kind {:?}",
            text, other
        ))),
    }
}

pub fn integer_literal(text: &str) -> HqlResult<LiteralValue> {
    text.parse::<i32>()
        .map(LiteralValue::Integer)
        .map_err(|_| HqlError::numeric_format(text, BasicType::Integer))
}

pub fn long_literal(text: &str) -> HqlResult<LiteralValue> {
    strip_suffix_ignore_case(text, "l")
        .parse::<i64>()
        .map(LiteralValue::Long)
        .map_err(|_| HqlError::numeric_format(text, BasicType::Long))
}

pub fn big_integer_literal(text: &str) -> HqlResult<LiteralValue> {
    strip_suffix_ignore_case(text, "bi")
        .parse::<BigInt>()
        .map(LiteralValue::BigInteger)
        .map_err(|_| HqlError::numeric_format(text, BasicType::BigInteger))
}

/// Hex literals use unsigned parsing: `0xFFFFFFFF` is `-1`, and an `L`
/// suffix widens to 64 bits.
pub fn hex_literal(text: &str) -> HqlResult<LiteralValue> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let long_digits = strip_suffix_ignore_case(digits, "l");
    if long_digits.len() != digits.len() {
        u64::from_str_radix(long_digits, 16)
            .map(|value| LiteralValue::Long(value as i64))
            .map_err(|_| HqlError::numeric_format(text, BasicType::Long))
    } else {
        u32::from_str_radix(digits, 16)
            .map(|value| LiteralValue::Integer(value as i32))
            .map_err(|_| HqlError::numeric_format(text, BasicType::Integer))
    }
}

pub fn float_literal(text: &str) -> HqlResult<LiteralValue> {
    strip_suffix_ignore_case(text, "f")
        .parse::<f32>()
        .map(LiteralValue::Float)
        .map_err(|_| HqlError::numeric_format(text, BasicType::Float))
}

pub fn double_literal(text: &str) -> HqlResult<LiteralValue> {
    strip_suffix_ignore_case(text, "d")
        .parse::<f64>()
        .map(LiteralValue::Double)
        .map_err(|_| HqlError::numeric_format(text, BasicType::Double))
}

pub fn big_decimal_literal(text: &str) -> HqlResult<LiteralValue> {
    let digits = strip_suffix_ignore_case(text, "bd");
    BigDecimal::from_str(digits)
        .map(LiteralValue::BigDecimal)
        .map_err(|_| HqlError::numeric_format(text, BasicType::BigDecimal))
}

/// `X'0A1B'`, given the hex digits between the quotes.
pub fn binary_literal(hex_digits: &str) -> HqlResult<LiteralValue> {
    hex::decode(hex_digits)
        .map(LiteralValue::Binary)
        .map_err(|_| HqlError::numeric_format(hex_digits, BasicType::Binary))
}

/// `{0x0A, 0x1B}`; every token must be exactly one byte.
pub fn binary_bytes_literal<'a>(
    tokens: impl IntoIterator<Item = &'a str>,
) -> HqlResult<LiteralValue> {
    let mut digits = String::new();
    for token in tokens {
        if token.len() != 4 {
            return Err(HqlError::numeric_format(
                format!("not a byte: {}", token),
                BasicType::Binary,
            ));
        }
        digits.push_str(&token[2..]);
    }
    binary_literal(&digits)
}

// Temporal

pub fn local_date(text: &str) -> HqlResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| HqlError::numeric_format(text, BasicType::LocalDate))
}

/// `hh:mm`, `hh:mm:ss` or `hh:mm:ss.fff`.
pub fn local_time(text: &str) -> HqlResult<NaiveTime> {
    let text = text.trim();
    let format = if text.matches(':').count() == 1 {
        "%H:%M"
    } else {
        "%H:%M:%S%.f"
    };
    NaiveTime::parse_from_str(text, format)
        .map_err(|_| HqlError::numeric_format(text, BasicType::LocalTime))
}

/// A parsed zone suffix.
#[derive(Debug, Clone, PartialEq)]
pub enum Zone {
    Offset(FixedOffset),
    Region(Arc<str>),
}

/// Short zone ids accepted in place of full region names.
fn short_zone_id(id: &str) -> Option<&'static str> {
    Some(match id {
        "ACT" => "Australia/Darwin",
        "AET" => "Australia/Sydney",
        "AGT" => "America/Argentina/Buenos_Aires",
        "ART" => "Africa/Cairo",
        "AST" => "America/Anchorage",
        "BET" => "America/Sao_Paulo",
        "BST" => "Asia/Dhaka",
        "CAT" => "Africa/Harare",
        "CNT" => "America/St_Johns",
        "CST" => "America/Chicago",
        "CTT" => "Asia/Shanghai",
        "EAT" => "Africa/Addis_Ababa",
        "ECT" => "Europe/Paris",
        "IET" => "America/Indiana/Indianapolis",
        "IST" => "Asia/Kolkata",
        "JST" => "Asia/Tokyo",
        "MIT" => "Pacific/Apia",
        "NET" => "Asia/Yerevan",
        "NST" => "Pacific/Auckland",
        "PLT" => "Asia/Karachi",
        "PNT" => "America/Phoenix",
        "PRT" => "America/Puerto_Rico",
        "PST" => "America/Los_Angeles",
        "SST" => "Pacific/Guadalcanal",
        "VST" => "Asia/Ho_Chi_Minh",
        "EST" => "-05:00",
        "MST" => "-07:00",
        "HST" => "-10:00",
        _ => return None,
    })
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let captures = OFFSET.captures(text)?;
    let sign = if &captures[1] == "-" { -1 } else { 1 };
    let hours: i32 = captures[2].parse().ok()?;
    let minutes: i32 = captures
        .get(3)
        .map_or(Some(0), |m| m.as_str().parse().ok())?;
    if hours > 18 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

pub fn zone(text: &str) -> HqlResult<Zone> {
    let text = text.trim();
    if let Some(offset) = parse_offset(text) {
        return Ok(Zone::Offset(offset));
    }
    let resolved = short_zone_id(text).unwrap_or(text);
    if let Some(offset) = parse_offset(resolved) {
        return Ok(Zone::Offset(offset));
    }
    if resolved == "Z" || REGION_ID.is_match(resolved) {
        return Ok(Zone::Region(Arc::from(resolved)));
    }
    Err(HqlError::numeric_format(text, BasicType::ZonedDateTime))
}

/// `{date}`, `{time}` or `{date time [zone|offset]}`.
pub fn temporal_literal(
    date: Option<&str>,
    time: Option<&str>,
    zone_text: Option<&str>,
) -> HqlResult<LiteralValue> {
    match (date, time) {
        (Some(date), None) => Ok(LiteralValue::Date(local_date(date)?)),
        (None, Some(time)) => Ok(LiteralValue::Time(local_time(time)?)),
        (Some(date), Some(time)) => {
            let date_time = NaiveDateTime::new(local_date(date)?, local_time(time)?);
            match zone_text.map(zone).transpose()? {
                None => Ok(LiteralValue::DateTime(date_time)),
                Some(Zone::Offset(offset)) => date_time
                    .and_local_timezone(offset)
                    .single()
                    .map(LiteralValue::OffsetDateTime)
                    .ok_or_else(|| {
                        HqlError::numeric_format(date_time.to_string(), BasicType::OffsetDateTime)
                    }),
                Some(Zone::Region(zone)) => Ok(LiteralValue::ZonedDateTime { date_time, zone }),
            }
        }
        (None, None) => Err(HqlError::Parsing(
            "Temporal literal without date or time".to_string(),
        )),
    }
}

/// `{d '..'}`, `{t '..'}` and `{ts '..'}`, producing the legacy JDBC types.
pub fn jdbc_escape_literal(kind: JdbcEscapeKind, text: &str) -> HqlResult<LiteralValue> {
    match kind {
        JdbcEscapeKind::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(LiteralValue::SqlDate)
            .map_err(|_| HqlError::numeric_format(text, BasicType::SqlDate)),
        JdbcEscapeKind::Time => local_time(text)
            .map(LiteralValue::SqlTime)
            .map_err(|_| HqlError::numeric_format(text, BasicType::SqlTime)),
        JdbcEscapeKind::Timestamp => sql_timestamp(text),
    }
}

/// A timestamp escape with an offset becomes a `Calendar`, otherwise a
/// plain SQL timestamp.
fn sql_timestamp(text: &str) -> HqlResult<LiteralValue> {
    let normalized = text.trim().replacen('T', " ", 1);
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %:z"] {
        if let Ok(value) = DateTime::parse_from_str(&normalized, format) {
            return Ok(LiteralValue::Calendar(value));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(LiteralValue::SqlTimestamp(value));
        }
    }
    Err(HqlError::numeric_format(text, BasicType::SqlTimestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer_overflow_is_reported_with_target() {
        assert_eq!(integer_literal("2147483647").unwrap(), LiteralValue::Integer(i32::MAX));
        let err = integer_literal("2147483648").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericFormat);
        assert_eq!(
            err.to_string(),
            "Unable to convert literal [2147483648] to Integer"
        );
    }

    #[test]
    fn test_suffixes_are_stripped() {
        assert_eq!(long_literal("10L").unwrap(), LiteralValue::Long(10));
        assert_eq!(long_literal("10l").unwrap(), LiteralValue::Long(10));
        assert_eq!(
            big_integer_literal("170141183460469231731687303715884105727BI").unwrap(),
            LiteralValue::BigInteger(BigInt::from(i128::MAX))
        );
        assert_eq!(float_literal("1.5F").unwrap(), LiteralValue::Float(1.5));
        assert_eq!(float_literal("1.5").unwrap(), LiteralValue::Float(1.5));
        assert_eq!(double_literal("2.5d").unwrap(), LiteralValue::Double(2.5));
        assert_eq!(
            big_decimal_literal("1.10BD").unwrap(),
            LiteralValue::BigDecimal(BigDecimal::new(BigInt::from(110), 2))
        );
        assert_eq!(
            big_decimal_literal("1e3bd").unwrap(),
            LiteralValue::BigDecimal(BigDecimal::from(1000))
        );
    }

    #[test]
    fn test_big_literals_keep_every_digit() {
        let digits = "1234567890123456789012345678901234567890";
        match big_integer_literal(&format!("{}BI", digits)).unwrap() {
            LiteralValue::BigInteger(value) => assert_eq!(value.to_string(), digits),
            other => panic!("Expected big integer, got {:?}", other),
        }
        assert_eq!(
            big_integer_literal("-98765432109876543210987654321098765432109876543210bi").unwrap(),
            LiteralValue::BigInteger(
                BigInt::from_str("-98765432109876543210987654321098765432109876543210").unwrap()
            )
        );

        match big_decimal_literal("1.2345678901234567890123456789012345BD").unwrap() {
            LiteralValue::BigDecimal(value) => {
                let (unscaled, scale) = value.as_bigint_and_exponent();
                assert_eq!(unscaled.to_string(), "12345678901234567890123456789012345");
                assert_eq!(scale, 34);
            }
            other => panic!("Expected big decimal, got {:?}", other),
        }
        assert!(big_decimal_literal("123456789012345678901234567890BD").is_ok());

        let err = big_integer_literal("12x3BI").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericFormat);
    }

    #[test]
    fn test_hex_uses_unsigned_semantics() {
        assert_eq!(hex_literal("0xFF").unwrap(), LiteralValue::Integer(255));
        assert_eq!(hex_literal("0xFFFFFFFF").unwrap(), LiteralValue::Integer(-1));
        assert_eq!(hex_literal("0xFFFFFFFFL").unwrap(), LiteralValue::Long(0xFFFF_FFFF));
        assert_eq!(
            hex_literal("0x1FFFFFFFF").unwrap_err(),
            HqlError::numeric_format("0x1FFFFFFFF", BasicType::Integer)
        );
        // Without `L` a hex literal is never widened to Long.
        assert_eq!(
            hex_literal("0x100000000").unwrap_err(),
            HqlError::numeric_format("0x100000000", BasicType::Integer)
        );
        assert_eq!(hex_literal("0x100000000L").unwrap(), LiteralValue::Long(1 << 32));
    }

    #[test]
    fn test_rendered_values_parse_back() {
        let values = [
            LiteralValue::Integer(-42),
            LiteralValue::Long(9_000_000_000),
            LiteralValue::BigInteger(-(BigInt::from(1) << 100u32)),
            LiteralValue::Double(0.125),
            LiteralValue::BigDecimal(BigDecimal::new(BigInt::from(-31415), 4)),
        ];
        let kinds = [
            TokenKind::IntegerLiteral,
            TokenKind::LongLiteral,
            TokenKind::BigIntegerLiteral,
            TokenKind::DoubleLiteral,
            TokenKind::BigDecimalLiteral,
        ];
        for (value, kind) in values.iter().zip(kinds) {
            assert_eq!(&numeric_literal(kind, &value.to_string()).unwrap(), value);
        }
    }

    #[test]
    fn test_binary_forms() {
        assert_eq!(
            binary_literal("0AFF").unwrap(),
            LiteralValue::Binary(vec![0x0A, 0xFF])
        );
        assert_eq!(
            binary_bytes_literal(["0x0A", "0xff"]).unwrap(),
            LiteralValue::Binary(vec![0x0A, 0xFF])
        );
        let err = binary_bytes_literal(["0x0A", "0x123"]).unwrap_err();
        assert!(err.to_string().contains("not a byte: 0x123"));
        assert_eq!(binary_literal("ABC").unwrap_err().kind(), ErrorKind::NumericFormat);
    }

    #[test]
    fn test_temporal_variants() {
        assert_eq!(
            temporal_literal(Some("2020-01-31"), None, None).unwrap(),
            LiteralValue::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap())
        );
        assert_eq!(
            temporal_literal(None, Some("12:30"), None).unwrap(),
            LiteralValue::Time(NaiveTime::from_hms_opt(12, 30, 0).unwrap())
        );
        assert!(matches!(
            temporal_literal(Some("2020-01-31"), Some("12:30:15"), None).unwrap(),
            LiteralValue::DateTime(_)
        ));
        match temporal_literal(Some("2020-01-31"), Some("12:30:15"), Some("+02:00")).unwrap() {
            LiteralValue::OffsetDateTime(value) => {
                assert_eq!(value.offset().local_minus_utc(), 7200)
            }
            other => panic!("Expected offset date-time, got {:?}", other),
        }
        match temporal_literal(Some("2020-01-31"), Some("12:30:15"), Some("PST")).unwrap() {
            LiteralValue::ZonedDateTime { zone, .. } => {
                assert_eq!(&*zone, "America/Los_Angeles")
            }
            other => panic!("Expected zoned date-time, got {:?}", other),
        }
        assert!(matches!(
            temporal_literal(Some("2020-01-31"), Some("12:30"), Some("EST")).unwrap(),
            LiteralValue::OffsetDateTime(_)
        ));
        assert_eq!(
            temporal_literal(Some("2020-02-30"), None, None).unwrap_err().kind(),
            ErrorKind::NumericFormat
        );
    }

    #[test]
    fn test_jdbc_escapes() {
        assert!(matches!(
            jdbc_escape_literal(JdbcEscapeKind::Date, "2020-01-31").unwrap(),
            LiteralValue::SqlDate(_)
        ));
        assert!(matches!(
            jdbc_escape_literal(JdbcEscapeKind::Time, "10:15:00").unwrap(),
            LiteralValue::SqlTime(_)
        ));
        assert!(matches!(
            jdbc_escape_literal(JdbcEscapeKind::Timestamp, "2020-01-31 10:15:00").unwrap(),
            LiteralValue::SqlTimestamp(_)
        ));
        assert!(matches!(
            jdbc_escape_literal(JdbcEscapeKind::Timestamp, "2020-01-31 10:15:00+01:00").unwrap(),
            LiteralValue::Calendar(_)
        ));
    }
}
