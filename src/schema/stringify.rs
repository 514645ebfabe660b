// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Conversion of logical values to their canonical display form, used when
//! statistics and diagnostics are rendered. The formats are byte-exact and
//! must not drift: tooling compares them across implementations.

use chrono::{DateTime, NaiveDate};
use num_bigint::{BigInt, Sign};

use crate::basic::{ConvertedType, LogicalType, TimeUnit};
use crate::schema::types::ColumnDescriptor;

/// Rendered for byte values that do not match their annotation, e.g. an
/// INTERVAL of the wrong length.
const INVALID: &str = "<INVALID>";

/// A per-column stringifier, selected once from the column's annotations.
///
/// Dispatch is fully typed: the variant chosen for a column only ever
/// receives the physical type that column stores, so there is no
/// "unsupported" path at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stringifier {
    /// Numbers via their natural display, binary as `0x` + uppercase hex.
    Default,
    /// Unsigned decimal rendering of the integer physical types.
    Unsigned,
    /// Binary rendered as UTF-8 text.
    Utf8,
    /// Days since the epoch as `YYYY-MM-DD`.
    Date,
    TimeMillis,
    TimeMicros,
    TimeNanos,
    TimestampMillis,
    TimestampMicros,
    TimestampNanos,
    /// 12-byte month/day/millisecond interval.
    Interval,
    /// Fixed-point decimal with exactly `scale` fractional digits.
    Decimal {
        scale: i32,
    },
}

impl Stringifier {
    /// Selects the stringifier for a column from its logical annotation.
    pub fn for_column(descr: &ColumnDescriptor) -> Self {
        if let Some(logical) = descr.logical_type() {
            return match logical {
                LogicalType::String | LogicalType::Enum | LogicalType::Json => Self::Utf8,
                LogicalType::Date => Self::Date,
                LogicalType::Time { unit, .. } => match unit {
                    TimeUnit::MILLIS => Self::TimeMillis,
                    TimeUnit::MICROS => Self::TimeMicros,
                    TimeUnit::NANOS => Self::TimeNanos,
                },
                LogicalType::Timestamp { unit, .. } => match unit {
                    TimeUnit::MILLIS => Self::TimestampMillis,
                    TimeUnit::MICROS => Self::TimestampMicros,
                    TimeUnit::NANOS => Self::TimestampNanos,
                },
                LogicalType::Integer {
                    is_signed: false, ..
                } => Self::Unsigned,
                LogicalType::Decimal { scale, .. } => Self::Decimal { scale: *scale },
                _ => Self::Default,
            };
        }
        match descr.converted_type() {
            Some(ConvertedType::UTF8 | ConvertedType::ENUM | ConvertedType::JSON) => Self::Utf8,
            Some(ConvertedType::DATE) => Self::Date,
            Some(ConvertedType::TIME_MILLIS) => Self::TimeMillis,
            Some(ConvertedType::TIME_MICROS) => Self::TimeMicros,
            Some(ConvertedType::TIMESTAMP_MILLIS) => Self::TimestampMillis,
            Some(ConvertedType::TIMESTAMP_MICROS) => Self::TimestampMicros,
            Some(
                ConvertedType::UINT_8
                | ConvertedType::UINT_16
                | ConvertedType::UINT_32
                | ConvertedType::UINT_64,
            ) => Self::Unsigned,
            Some(ConvertedType::DECIMAL) => Self::Decimal {
                scale: descr.type_scale(),
            },
            Some(ConvertedType::INTERVAL) => Self::Interval,
            _ => Self::Default,
        }
    }

    pub fn stringify_bool(&self, value: bool) -> String {
        value.to_string()
    }

    pub fn stringify_i32(&self, value: i32) -> String {
        match self {
            Self::Unsigned => (value as u32).to_string(),
            Self::Date => date_string(value),
            Self::TimeMillis => time_string(value as i64, 1_000, 3),
            Self::Decimal { scale } => decimal_string(BigInt::from(value), *scale),
            _ => value.to_string(),
        }
    }

    pub fn stringify_i64(&self, value: i64) -> String {
        match self {
            Self::Unsigned => (value as u64).to_string(),
            Self::TimeMicros => time_string(value, 1_000_000, 6),
            Self::TimeNanos => time_string(value, 1_000_000_000, 9),
            Self::TimestampMillis => timestamp_string(value, 1_000, 3),
            Self::TimestampMicros => timestamp_string(value, 1_000_000, 6),
            Self::TimestampNanos => timestamp_string(value, 1_000_000_000, 9),
            Self::Decimal { scale } => decimal_string(BigInt::from(value), *scale),
            _ => value.to_string(),
        }
    }

    pub fn stringify_f32(&self, value: f32) -> String {
        format!("{value:?}")
    }

    pub fn stringify_f64(&self, value: f64) -> String {
        format!("{value:?}")
    }

    pub fn stringify_bytes(&self, value: &[u8]) -> String {
        match self {
            Self::Utf8 => match std::str::from_utf8(value) {
                Ok(s) => s.to_owned(),
                Err(_) => INVALID.to_owned(),
            },
            Self::Interval => interval_string(value),
            Self::Decimal { scale } => {
                if value.is_empty() {
                    INVALID.to_owned()
                } else {
                    decimal_string(BigInt::from_signed_bytes_be(value), *scale)
                }
            }
            _ => {
                let mut out = String::with_capacity(2 + 2 * value.len());
                out.push_str("0x");
                for b in value {
                    out.push_str(&format!("{b:02X}"));
                }
                out
            }
        }
    }
}

/// `YYYY-MM-DD` in the proleptic Gregorian calendar from days since
/// 1970-01-01.
fn date_string(days: i32) -> String {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    match epoch.checked_add_signed(chrono::Duration::days(days as i64)) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => INVALID.to_owned(),
    }
}

/// `[-]HH:MM:SS.f…` where the hour field grows without bound; the sign
/// applies to the value as a whole.
fn time_string(value: i64, per_second: i64, frac_width: usize) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let per_second = per_second as u64;
    let frac = abs % per_second;
    let secs = abs / per_second;
    format!(
        "{sign}{:02}:{:02}:{:02}.{frac:0frac_width$}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
    )
}

/// `YYYY-MM-DDThh:mm:ss.f…` in UTC from a value in units since the epoch.
fn timestamp_string(value: i64, per_second: i64, frac_width: usize) -> String {
    let secs = value.div_euclid(per_second);
    let frac = value.rem_euclid(per_second);
    let nanos = (frac * (1_000_000_000 / per_second)) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(ts) => format!(
            "{}.{frac:0frac_width$}",
            ts.format("%Y-%m-%dT%H:%M:%S"),
        ),
        None => INVALID.to_owned(),
    }
}

/// `interval(<months> months, <days> days, <millis> millis)` from a 12-byte
/// little-endian triple of unsigned 32-bit counts.
fn interval_string(bytes: &[u8]) -> String {
    if bytes.len() != 12 {
        return INVALID.to_owned();
    }
    let months = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let days = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let millis = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    format!("interval({months} months, {days} days, {millis} millis)")
}

/// Signed base-10 with exactly `scale` fractional digits; no trimming.
fn decimal_string(unscaled: BigInt, scale: i32) -> String {
    if scale <= 0 {
        return unscaled.to_string();
    }
    let scale = scale as usize;
    let negative = unscaled.sign() == Sign::Minus;
    let mut digits = unscaled.magnitude().to_string();
    if digits.len() <= scale {
        let mut padded = "0".repeat(scale - digits.len() + 1);
        padded.push_str(&digits);
        digits = padded;
    }
    let point = digits.len() - scale;
    format!(
        "{}{}.{}",
        if negative { "-" } else { "" },
        &digits[..point],
        &digits[point..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_interval() {
        let s = Stringifier::Interval;
        assert_eq!(
            s.stringify_bytes(&[0; 12]),
            "interval(0 months, 0 days, 0 millis)"
        );
        assert_eq!(
            s.stringify_bytes(&[3, 0, 0, 0, 6, 0, 0, 0, 9, 0, 0, 0]),
            "interval(3 months, 6 days, 9 millis)"
        );
        assert_eq!(
            s.stringify_bytes(&[
                0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFF, 0xFD, 0xFF, 0xFF, 0xFF
            ]),
            "interval(4294967295 months, 4294967294 days, 4294967293 millis)"
        );
        assert_eq!(s.stringify_bytes(&[]), "<INVALID>");
        assert_eq!(s.stringify_bytes(&[1; 11]), "<INVALID>");
        assert_eq!(s.stringify_bytes(&[1; 13]), "<INVALID>");
    }

    #[test]
    fn test_date() {
        let s = Stringifier::Date;
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let days_of = |y, m, d| {
            (NaiveDate::from_ymd_opt(y, m, d).unwrap() - epoch).num_days() as i32
        };
        assert_eq!(s.stringify_i32(0), "1970-01-01");
        assert_eq!(s.stringify_i32(days_of(2017, 12, 14)), "2017-12-14");
        // pre-Gregorian dates use the proleptic Gregorian calendar
        assert_eq!(s.stringify_i32(days_of(1492, 8, 3)), "1492-08-03");
    }

    #[test]
    fn test_time() {
        assert_eq!(Stringifier::TimeMillis.stringify_i32(0), "00:00:00.000");
        assert_eq!(Stringifier::TimeMicros.stringify_i64(0), "00:00:00.000000");
        assert_eq!(Stringifier::TimeNanos.stringify_i64(0), "00:00:00.000000000");

        let millis = ((12 * 60 + 34) * 60 + 56) * 1000 + 789;
        assert_eq!(
            Stringifier::TimeMillis.stringify_i32(millis),
            "12:34:56.789"
        );
        assert_eq!(
            Stringifier::TimeMillis.stringify_i32(-millis),
            "-12:34:56.789"
        );

        let micros = ((12_345i64 * 60 + 12) * 60 + 34) * 1_000_000 + 56_789;
        assert_eq!(
            Stringifier::TimeMicros.stringify_i64(micros),
            "12345:12:34.056789"
        );
        assert_eq!(
            Stringifier::TimeMicros.stringify_i64(-micros),
            "-12345:12:34.056789"
        );

        let hours_over_a_day = ((123i64 * 60 + 12) * 60 + 34) * 1000 + 567;
        assert_eq!(
            Stringifier::TimeMillis.stringify_i32(hours_over_a_day as i32),
            "123:12:34.567"
        );

        let nanos = ((12i64 * 60 + 34) * 60 + 56) * 1_000_000_000 + 789_012_987;
        assert_eq!(
            Stringifier::TimeNanos.stringify_i64(nanos),
            "12:34:56.789012987"
        );
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(
            Stringifier::TimestampMillis.stringify_i64(0),
            "1970-01-01T00:00:00.000"
        );
        assert_eq!(
            Stringifier::TimestampMicros.stringify_i64(0),
            "1970-01-01T00:00:00.000000"
        );
        assert_eq!(
            Stringifier::TimestampNanos.stringify_i64(0),
            "1970-01-01T00:00:00.000000000"
        );
        // 2017-12-15T10:09:54.120 UTC
        assert_eq!(
            Stringifier::TimestampMillis.stringify_i64(1_513_332_594_120),
            "2017-12-15T10:09:54.120"
        );
        // one microsecond before a pre-epoch second boundary
        assert_eq!(
            Stringifier::TimestampMicros.stringify_i64(-1),
            "1969-12-31T23:59:59.999999"
        );
    }

    #[test]
    fn test_decimal() {
        let s = Stringifier::Decimal { scale: 4 };
        assert_eq!(s.stringify_i32(0), "0.0000");
        assert_eq!(s.stringify_i32(1_234_567_890), "123456.7890");
        assert_eq!(s.stringify_i32(-987_654_321), "-98765.4321");
        assert_eq!(s.stringify_i64(1_234_567_890_123_456_789), "123456789012345.6789");
        assert_eq!(s.stringify_bytes(&[]), "<INVALID>");
        assert_eq!(s.stringify_bytes(&[0]), "0.0000");

        let big = BigInt::parse_bytes(b"98765432109876543210987654321098765432109876543210", 10)
            .unwrap();
        let (_, be) = big.to_bytes_be();
        assert_eq!(
            s.stringify_bytes(&be),
            "9876543210987654321098765432109876543210987654.3210"
        );
        let small = BigInt::parse_bytes(b"-12345678901234567890123456789012345678901234567890", 10)
            .unwrap();
        let be = small.to_signed_bytes_be();
        assert_eq!(
            s.stringify_bytes(&be),
            "-1234567890123456789012345678901234567890123456.7890"
        );
    }

    #[test]
    fn test_unsigned() {
        let s = Stringifier::Unsigned;
        assert_eq!(s.stringify_i32(-1), "4294967295");
        assert_eq!(s.stringify_i64(-1), "18446744073709551615");
        assert_eq!(s.stringify_i64(i64::MAX), "9223372036854775807");
    }

    #[test]
    fn test_default() {
        let s = Stringifier::Default;
        assert_eq!(s.stringify_bool(true), "true");
        assert_eq!(s.stringify_f64(0.0), "0.0");
        assert_eq!(s.stringify_f32(987.6543), "987.6543");
        assert_eq!(s.stringify_bytes(&[]), "0x");
        assert_eq!(
            s.stringify_bytes(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]),
            "0x0123456789ABCDEF"
        );
    }

    #[test]
    fn test_utf8() {
        let s = Stringifier::Utf8;
        assert_eq!(s.stringify_bytes(b""), "");
        assert_eq!(s.stringify_bytes("это тест".as_bytes()), "это тест");
    }
}
