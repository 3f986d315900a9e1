use serde::Serialize;
use thiserror::Error;

use crate::config::{GaugeKind, GaugeKindConfig};
use crate::trace::RejectReason;

/// Digit count of a standard odometer drum set.
pub const ODOMETER_DISPLAY_DIGITS: usize = 6;

/// A digit string turned into a bounded reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedValue {
    /// Digits after normalization, fraction included.
    pub digits: String,
    pub integer: u64,
    /// Tenths; `None` for integer-only kinds.
    pub fraction: Option<u8>,
    pub value: f64,
}

impl ParsedValue {
    fn new(digits: String, integer: u64, fraction: Option<u8>) -> Self {
        let value = integer as f64 + fraction.map_or(0.0, |f| f as f64 / 10.0);
        Self {
            digits,
            integer,
            fraction,
            value,
        }
    }

    /// Display form: `"<int>,<tenth>"` with a comma, or a bare integer.
    pub fn label(&self) -> String {
        match self.fraction {
            Some(f) => format!("{},{}", self.integer, f),
            None => self.integer.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty digit string")]
    Empty,
    #[error("non-digit character")]
    NonDigit,
    #[error("unsupported digit count {0}")]
    Length(usize),
    #[error("value out of plausible range")]
    OutOfRange,
}

impl ParseError {
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            ParseError::OutOfRange => RejectReason::RangeReject,
            _ => RejectReason::NormalizationReject,
        }
    }
}

/// Normalize `raw` to the kind's digit layout and validate the value.
///
/// `separator_seen` only matters for odometers: it records that a `.` or
/// `,` appeared next to the chosen digits or anywhere in the OCR text.
pub fn parse_digits(
    config: &GaugeKindConfig,
    raw: &str,
    separator_seen: bool,
) -> Result<ParsedValue, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NonDigit);
    }

    let parsed = match config.kind {
        GaugeKind::Horimetro => parse_hour_meter(config, raw)?,
        GaugeKind::Abastecimento => parse_fuel(config, raw)?,
        GaugeKind::Odometro => parse_odometer(config, raw, separator_seen)?,
    };

    if parsed.value < config.plausible_min || parsed.value > config.plausible_max {
        return Err(ParseError::OutOfRange);
    }
    Ok(parsed)
}

/// Four digits are a whole number of hours; five or more end in the tenth.
fn parse_hour_meter(config: &GaugeKindConfig, raw: &str) -> Result<ParsedValue, ParseError> {
    let len = raw.len();
    if len < config.min_digits || len > config.full_digits() {
        return Err(ParseError::Length(len));
    }
    if len == config.min_digits {
        return Ok(ParsedValue::new(raw.to_string(), parse_int(raw)?, Some(0)));
    }
    let (int_part, frac_part) = raw.split_at(len - 1);
    Ok(ParsedValue::new(
        raw.to_string(),
        parse_int(int_part)?,
        Some(parse_int(frac_part)? as u8),
    ))
}

/// Coerce to exactly `max_digits + 1` digits: left-pad short strings with
/// zeros, keep the trailing digits of long ones.
fn parse_fuel(config: &GaugeKindConfig, raw: &str) -> Result<ParsedValue, ParseError> {
    let len = raw.len();
    let target = config.full_digits();
    if len < config.min_digits {
        return Err(ParseError::Length(len));
    }
    let digits = if len < target {
        format!("{raw:0>target$}")
    } else {
        raw[len - target..].to_string()
    };
    let (int_part, frac_part) = digits.split_at(config.max_digits);
    let integer = parse_int(int_part)?;
    let fraction = parse_int(frac_part)? as u8;
    Ok(ParsedValue::new(digits, integer, Some(fraction)))
}

fn parse_odometer(
    config: &GaugeKindConfig,
    raw: &str,
    separator_seen: bool,
) -> Result<ParsedValue, ParseError> {
    let len = raw.len();
    let digits = if separator_seen && len >= ODOMETER_DISPLAY_DIGITS {
        // The trailing digit is a separated tenth an odometer reading drops.
        &raw[..len - 1]
    } else if !separator_seen && len == ODOMETER_DISPLAY_DIGITS && raw.ends_with('0') {
        // An implied ",0" drum captured as a sixth digit.
        &raw[..len - 1]
    } else {
        raw
    };
    if digits.is_empty() || digits.len() > config.max_digits {
        return Err(ParseError::Length(digits.len()));
    }
    Ok(ParsedValue::new(digits.to_string(), parse_int(digits)?, None))
}

fn parse_int(s: &str) -> Result<u64, ParseError> {
    s.parse::<u64>().map_err(|_| ParseError::Length(s.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour() -> GaugeKindConfig {
        GaugeKindConfig::horimetro()
    }

    fn fuel() -> GaugeKindConfig {
        GaugeKindConfig::abastecimento()
    }

    fn odo() -> GaugeKindConfig {
        GaugeKindConfig::odometro()
    }

    #[test]
    fn hour_meter_reads_last_digit_as_tenth() {
        let p = parse_digits(&hour(), "03647", false).unwrap();
        assert_eq!(p.integer, 364);
        assert_eq!(p.fraction, Some(7));
        assert!((p.value - 364.7).abs() < 1e-9);
        assert_eq!(p.label(), "364,7");
    }

    #[test]
    fn hour_meter_four_digits_are_whole_hours() {
        let p = parse_digits(&hour(), "0364", false).unwrap();
        assert_eq!(p.value, 364.0);
        assert_eq!(p.label(), "364,0");
    }

    #[test]
    fn hour_meter_rejects_bad_lengths() {
        assert_eq!(parse_digits(&hour(), "123", false), Err(ParseError::Length(3)));
        assert_eq!(parse_digits(&hour(), "12345678", false), Err(ParseError::Length(8)));
        assert_eq!(parse_digits(&hour(), "", false), Err(ParseError::Empty));
        assert_eq!(parse_digits(&hour(), "12a45", false), Err(ParseError::NonDigit));
    }

    #[test]
    fn errors_carry_readable_messages() {
        assert_eq!(ParseError::Length(8).to_string(), "unsupported digit count 8");
        assert_eq!(ParseError::NonDigit.to_string(), "non-digit character");
        assert_eq!(ParseError::OutOfRange.reject_reason(), RejectReason::RangeReject);
        assert_eq!(ParseError::Empty.reject_reason(), RejectReason::NormalizationReject);
        assert_eq!(RejectReason::RangeReject.to_string(), "value outside plausibility bounds");
    }

    #[test]
    fn hour_meter_upper_bound() {
        let mut cfg = hour();
        cfg.plausible_max = 5_000.0;
        assert_eq!(parse_digits(&cfg, "99990", false), Err(ParseError::OutOfRange));
        assert_eq!(
            ParseError::OutOfRange.reject_reason(),
            RejectReason::RangeReject
        );
    }

    #[test]
    fn fuel_pads_three_digits_and_truncates_long_strings() {
        let p = parse_digits(&fuel(), "452", false).unwrap();
        assert_eq!(p.digits, "0452");
        assert!((p.value - 45.2).abs() < 1e-9);
        assert_eq!(p.label(), "45,2");

        let p = parse_digits(&fuel(), "9904521", false).unwrap();
        assert_eq!(p.digits, "4521");
        assert!((p.value - 452.1).abs() < 1e-9);

        assert_eq!(parse_digits(&fuel(), "45", false), Err(ParseError::Length(2)));
    }

    #[test]
    fn fuel_value_stays_within_bounds() {
        let mut cfg = fuel();
        cfg.plausible_max = 500.0;
        assert_eq!(parse_digits(&cfg, "9999", false), Err(ParseError::OutOfRange));
        assert!(parse_digits(&fuel(), "9999", false).unwrap().value <= 1_200.0);
    }

    #[test]
    fn odometer_drops_separated_tenth() {
        let p = parse_digits(&odo(), "1234567", true).unwrap();
        assert_eq!(p.integer, 123_456);
        assert_eq!(p.label(), "123456");

        let p = parse_digits(&odo(), "12345", true).unwrap();
        assert_eq!(p.integer, 12_345);
    }

    #[test]
    fn odometer_drops_implied_zero_only_without_separator() {
        assert_eq!(parse_digits(&odo(), "123450", false).unwrap().integer, 12_345);
        assert_eq!(parse_digits(&odo(), "123456", false).unwrap().integer, 123_456);
        assert_eq!(parse_digits(&odo(), "1234560", false).unwrap().integer, 1_234_560);
    }

    #[test]
    fn odometer_rejects_oversized_integers() {
        assert_eq!(
            parse_digits(&odo(), "123456789", false),
            Err(ParseError::Length(9))
        );
        assert!(parse_digits(&odo(), "123456789", true).is_ok());
    }
}
