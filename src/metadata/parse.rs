//! Value coercion helpers for metadata assignment.

use chrono::Timelike;

use crate::errors::MetaDataError;

/// Coerce a string to an integer.
///
/// Instrument software occasionally stores integer fields as booleans or as
/// floats ("2.0"); both are accepted. Fractional values are rounded.
pub fn fint(value: &str) -> Result<i64, MetaDataError> {
    let v = value.trim().to_ascii_lowercase();
    match v.as_str() {
        "false" => Ok(0),
        "true" => Ok(1),
        "" => Err(MetaDataError::InvalidValue {
            key: String::new(),
            reason: "empty string".to_string(),
        }),
        other => other
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .map_err(|_| MetaDataError::InvalidValue {
                key: String::new(),
                reason: format!("'{other}' is not an integer"),
            }),
    }
}

/// Normalize a time-of-day string to `HH:MM:SS[.f]`.
///
/// Handles 12-hour AM/PM forms, strips property-file escape characters,
/// zero-pads single-digit fields, and trims trailing zeros from the
/// sub-second part:
///
/// ```
/// use afmcurve::metadata::parse_time;
///
/// assert_eq!(parse_time("6:1:2 PM").unwrap(), "18:01:02");
/// assert_eq!(parse_time("6:1:2.0010 PM").unwrap(), "18:01:02.001");
/// ```
pub fn parse_time(value: &str) -> Result<String, MetaDataError> {
    let bad = |reason: String| MetaDataError::InvalidValue {
        key: "time".to_string(),
        reason,
    };
    // Property files may carry escaped separators ("17\:02\:33").
    let cleaned: String = value.chars().filter(|c| *c != '\\').collect();
    let cleaned = cleaned.trim();

    let upper = cleaned.to_ascii_uppercase();
    let (clock, meridiem) = if upper.ends_with("PM") {
        (cleaned[..cleaned.len() - 2].trim_end(), Some("PM"))
    } else if upper.ends_with("AM") {
        (cleaned[..cleaned.len() - 2].trim_end(), Some("AM"))
    } else {
        (cleaned, None)
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(bad(format!("expected HH:MM:SS, got '{value}'")));
    }
    let hour: u32 = parts[0]
        .trim()
        .parse()
        .map_err(|_| bad(format!("bad hour in '{value}'")))?;
    let minute: u32 = parts[1]
        .trim()
        .parse()
        .map_err(|_| bad(format!("bad minute in '{value}'")))?;
    let (sec_str, frac) = match parts[2].trim().split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (parts[2].trim(), None),
    };
    let second: u32 = sec_str
        .parse()
        .map_err(|_| bad(format!("bad second in '{value}'")))?;

    let hour = match meridiem {
        Some("PM") if hour != 12 => hour + 12,
        Some("AM") if hour == 12 => 0,
        _ => hour,
    };

    // Validate the normalized clock reading.
    let time = chrono::NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| bad(format!("'{value}' is not a valid time of day")))?;

    let mut out = format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    );
    if let Some(frac) = frac {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad(format!("bad sub-second digits in '{value}'")));
        }
        let trimmed = frac.trim_end_matches('0');
        if !trimmed.is_empty() {
            out.push('.');
            out.push_str(trimmed);
        }
    }
    Ok(out)
}
