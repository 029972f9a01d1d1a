// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Conversions between decimal degrees and the fixed-width textual notations
//! used by solver station files and instrument logs.
//!
//! All functions are pure. Malformed input is rejected with
//! [`CompError::Format`] rather than truncated.

use crate::error::{CompError, Result};

/// Sign for a hemisphere letter: N/E positive, S/W negative.
fn hemisphere_sign(flag: char) -> Option<f64> {
    match flag {
        'N' | 'E' => Some(1.0),
        'S' | 'W' => Some(-1.0),
        _ => None,
    }
}

fn parse_field(input: &str, field: &str, what: &str) -> Result<f64> {
    if field.is_empty() {
        return Err(CompError::format(input, format!("missing {}", what)));
    }
    field
        .parse::<f64>()
        .map_err(|_| CompError::format(input, format!("invalid {} '{}'", what, field)))
}

/// Decode a degrees + decimal-minutes string such as `"8059.59"`.
///
/// The two digits in front of the decimal point are minutes, everything
/// before them is degrees. `hemisphere` is one of N, S, E, W; S and W give a
/// negative result.
pub fn decimal_degrees_from_ddmm(value: &str, hemisphere: char) -> Result<f64> {
    let s = value.trim();
    if !s.is_ascii() {
        return Err(CompError::format(value, "non-ASCII characters"));
    }
    let sign = hemisphere_sign(hemisphere).ok_or_else(|| {
        CompError::format(value, format!("unknown hemisphere flag '{}'", hemisphere))
    })?;
    let dot = s
        .find('.')
        .ok_or_else(|| CompError::format(value, "no decimal point"))?;
    if dot < 2 {
        return Err(CompError::format(
            value,
            "expected two minute digits before the decimal point",
        ));
    }

    let deg = parse_field(value, &s[..dot - 2], "degrees")?;
    let min = parse_field(value, &s[dot - 2..], "minutes")?;

    Ok(sign * (deg + min / 60.0))
}

/// Encode decimal degrees as `DDMMSS.S`, optionally followed by a hemisphere
/// letter.
///
/// With `hint` `Some('N')` the letter is N or S, with `Some('E')` it is E or
/// W, chosen from the sign of `degrees`. With `None` the sign is dropped.
/// The value is rounded to the nearest tenth of an arc-second before it is
/// split, so the seconds field never reads `60.0`.
pub fn ddmmss_from_decimal_degrees(degrees: f64, hint: Option<char>) -> Result<String> {
    let positive = degrees >= 0.0;
    let letter = match hint {
        None => None,
        Some('N') => Some(if positive { 'N' } else { 'S' }),
        Some('E') => Some(if positive { 'E' } else { 'W' }),
        Some(other) => {
            return Err(CompError::InvalidArgument(format!(
                "unknown direction specifier '{}' (expected N or E)",
                other
            )))
        }
    };
    if !degrees.is_finite() {
        return Err(CompError::InvalidArgument(format!(
            "cannot encode non-finite angle {}",
            degrees
        )));
    }

    let tenths = (degrees.abs() * 36_000.0).round() as u64;
    let deg = tenths / 36_000;
    let min = (tenths % 36_000) / 600;
    let sec_tenths = tenths % 600;

    let mut out = format!(
        "{:02}{:02}{:02}.{}",
        deg,
        min,
        sec_tenths / 10,
        sec_tenths % 10
    );
    if let Some(l) = letter {
        out.push(l);
    }
    Ok(out)
}

/// Decode a `DDMMSS.S[H]` string produced by [`ddmmss_from_decimal_degrees`].
///
/// Spaces are zero placeholders, so blank-padded station-file fields such as
/// `" 90200.0N"` decode as `"090200.0N"`.
pub fn decimal_degrees_from_ddmmss(value: &str) -> Result<f64> {
    let filled = value.trim_end().replace(' ', "0");
    if !filled.is_ascii() {
        return Err(CompError::format(value, "non-ASCII characters"));
    }

    let (body, sign) = match filled.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            let sign = hemisphere_sign(c).ok_or_else(|| {
                CompError::format(value, format!("unknown hemisphere letter '{}'", c))
            })?;
            (&filled[..filled.len() - 1], sign)
        }
        _ => (filled.as_str(), 1.0),
    };

    let dot = body
        .find('.')
        .ok_or_else(|| CompError::format(value, "no decimal point"))?;
    if dot < 4 {
        return Err(CompError::format(value, "expected DDMMSS.S"));
    }

    let deg = parse_field(value, &body[..dot - 4], "degrees")?;
    let min = parse_field(value, &body[dot - 4..dot - 2], "minutes")?;
    let sec = parse_field(value, &body[dot - 2..], "seconds")?;

    Ok(sign * (deg + min / 60.0 + sec / 3600.0))
}

/// Encode the absolute value of `degrees` as `DDMMmmm`: degrees, whole
/// minutes and three truncated decimal-minute digits, without separators.
/// Hypocenter-style station files carry the hemisphere in a separate column.
pub fn ddmm_mmm_from_decimal_degrees(degrees: f64) -> String {
    let s = degrees.abs();
    let deg = s.floor();
    let mint = (s - deg) * 60.0;
    let min = mint.floor();
    let mind = ((mint - min) * 1000.0).floor();

    format!("{:02}{:02}{:03}", deg as u32, min as u32, mind as u32)
}

/// Decode instrument-log notation with a degree sign, e.g. `"78°16.290'N"`
/// or `"014°40.090'E"`.
pub fn decimal_degrees_from_degree_sign(value: &str) -> Result<f64> {
    let s = value.trim();
    let (sign, rest) = split_trailing_hemisphere(value, s)?;
    let rest = rest.trim_end_matches(['\'', '’']);

    let (deg, min) = rest
        .split_once(['°', 'º'])
        .ok_or_else(|| CompError::format(value, "no degree sign"))?;
    let deg = parse_field(value, deg.trim(), "degrees")?;
    let min = parse_field(value, min.trim(), "minutes")?;
    if !(0.0..60.0).contains(&min) {
        return Err(CompError::format(value, "minutes out of range"));
    }

    Ok(sign * (deg + min / 60.0))
}

/// Decode notation with the hemisphere letter between degrees and minutes,
/// e.g. `"82N32.322"`.
pub fn decimal_degrees_from_hemisphere_infix(value: &str) -> Result<f64> {
    let s = value.trim();
    let (idx, flag) = s
        .char_indices()
        .find(|(_, c)| hemisphere_sign(*c).is_some())
        .ok_or_else(|| CompError::format(value, "no direction specifier"))?;
    // Checked by the find above.
    let sign = hemisphere_sign(flag).unwrap_or(1.0);

    let deg = s[..idx]
        .parse::<u32>()
        .map_err(|_| CompError::format(value, format!("invalid degrees '{}'", &s[..idx])))?;
    let min = parse_field(value, &s[idx + flag.len_utf8()..], "minutes")?;
    if !(0.0..60.0).contains(&min) {
        return Err(CompError::format(value, "minutes out of range"));
    }

    Ok(sign * (deg as f64 + min / 60.0))
}

fn split_trailing_hemisphere<'a>(value: &str, s: &'a str) -> Result<(f64, &'a str)> {
    let last = s
        .chars()
        .last()
        .ok_or_else(|| CompError::format(value, "empty coordinate"))?;
    let sign = hemisphere_sign(last)
        .ok_or_else(|| CompError::format(value, "no hemisphere letter"))?;
    Ok((sign, &s[..s.len() - last.len_utf8()]))
}
