use crate::error::{BytesError, BytesResult};

const BINARY_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Formats a byte count with binary units and the given number of decimals.
///
/// ```
/// use appicon_utils::bytes::format_bytes;
///
/// assert_eq!(format_bytes(8192, 1), "8.0 KiB");
/// assert_eq!(format_bytes(512, 0), "512 B");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BINARY_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.precision$} {}", BINARY_UNITS[unit])
}

/// Parses a size such as `16MiB`, `512 KB` or `4096` into a byte count.
///
/// Suffixes ending in `iB` are powers of 1024, plain `B` suffixes are powers
/// of 1000. Matching is case-insensitive.
///
/// # Errors
///
/// * [`BytesError::ParseFailed`] if the number or the unit cannot be read.
pub fn parse_bytes(input: &str) -> BytesResult<u64> {
    let trimmed = input.trim();
    let fail = |reason: &str| {
        BytesError::ParseFailed {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    };

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(fail("missing number"));
    }

    let unit = unit.trim().to_ascii_uppercase();
    if unit.is_empty() {
        return number.parse::<u64>().map_err(|_| fail("not an integer"));
    }

    let (prefix, base) = if let Some(prefix) = unit.strip_suffix("IB") {
        (prefix, 1024_f64)
    } else if let Some(prefix) = unit.strip_suffix('B') {
        (prefix, 1000_f64)
    } else {
        return Err(fail("unit must end in B or iB"));
    };

    let exponent = match prefix {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        "E" => 6,
        _ => return Err(fail("unknown unit prefix")),
    };

    let value: f64 = number.parse().map_err(|_| fail("not a number"))?;
    Ok((value * base.powi(exponent)).round() as u64)
}
