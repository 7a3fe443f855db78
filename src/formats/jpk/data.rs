//! Binary channel decoding.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::errors::FormatError;

use super::conversion;
use super::properties::PropertyStore;

/// Known archive member basenames per column, across instrument firmware
/// versions.
const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("force", &["vDeflection"]),
    (
        "height (measured)",
        &["strainGaugeHeight", "capacitiveSensorHeight", "measuredHeight"],
    ),
    ("height (piezo)", &["height", "head-height"]),
];

/// Default calibration slot per column.
const COLUMN_SLOTS: &[(&str, &str)] = &[
    ("force", "force"),
    ("height (measured)", "nominal"),
    ("height (piezo)", "calibrated"),
];

/// Expected physical unit per column.
const COLUMN_UNITS: &[(&str, &str)] = &[
    ("force", "N"),
    ("height (measured)", "m"),
    ("height (piezo)", "m"),
];

/// Channel aliases for a column, if it is backed by channel data.
pub fn column_aliases(column: &str) -> Option<&'static [&'static str]> {
    COLUMN_ALIASES
        .iter()
        .find(|(c, _)| *c == column)
        .map(|(_, a)| *a)
}

/// Default slot used to resolve a column's conversion chain.
pub fn default_slot(column: &str) -> &'static str {
    COLUMN_SLOTS
        .iter()
        .find(|(c, _)| *c == column)
        .map(|(_, s)| *s)
        .unwrap_or("default")
}

/// Unit the resolved data must carry for a column.
pub fn expected_unit(column: &str) -> &'static str {
    COLUMN_UNITS
        .iter()
        .find(|(c, _)| *c == column)
        .map(|(_, u)| *u)
        .unwrap_or("")
}

/// Find the archive member holding a column's channel data.
///
/// `members` is the list of candidate `.dat` members of one segment.
/// Returns the matched channel name, its default slot, and the member path.
/// Matching compares the member basename (sans extension) against the
/// column's alias list; no match is a column-not-found error naming the
/// aliases tried.
pub fn find_column_dat<'a>(
    members: &'a [String],
    column: &str,
) -> Result<(&'static str, &'static str, &'a str), FormatError> {
    let aliases = column_aliases(column).ok_or_else(|| {
        FormatError::ColumnNotFound(format!("'{column}' is not a channel-backed column"))
    })?;
    for member in members {
        let basename = member
            .rsplit('/')
            .next()
            .unwrap_or(member)
            .split('.')
            .next()
            .unwrap_or("");
        for alias in aliases {
            if *alias == basename {
                return Ok((alias, default_slot(column), member));
            }
        }
    }
    Err(FormatError::ColumnNotFound(format!(
        "no data member found for any of {aliases:?}"
    )))
}

/// Decode a fixed-width big-endian integer array.
///
/// Supported encoder declarations: signed/unsigned short, signed/unsigned
/// integer, signed long. Anything else is a not-implemented error.
pub fn decode_raw(bytes: &[u8], encoder: &str) -> Result<Vec<f64>, FormatError> {
    let width = match encoder {
        "signedshort" | "unsignedshort" => 2,
        "signedinteger" | "unsignedinteger" => 4,
        "signedlong" => 8,
        other => {
            return Err(FormatError::NotImplemented(format!(
                "data encoder '{other}' not supported"
            )))
        }
    };
    if bytes.len() % width != 0 {
        return Err(FormatError::DataFileBroken(format!(
            "channel data length {} is not a multiple of {width}",
            bytes.len()
        )));
    }
    let count = bytes.len() / width;
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let value = match encoder {
            "signedshort" => cursor.read_i16::<BigEndian>()? as f64,
            "unsignedshort" => cursor.read_u16::<BigEndian>()? as f64,
            "signedinteger" => cursor.read_i32::<BigEndian>()? as f64,
            "unsignedinteger" => cursor.read_u32::<BigEndian>()? as f64,
            "signedlong" => cursor.read_i64::<BigEndian>()? as f64,
            _ => unreachable!("validated above"),
        };
        out.push(value);
    }
    Ok(out)
}

/// Decode and scale one channel member to physical units.
///
/// The raw integers are first scaled by the encoder's multiplier/offset
/// (two historical key spellings are tried), then pushed through the
/// conversion chain for `slot`. Returns the data, its unit, and the channel
/// label.
pub fn load_channel(
    bytes: &[u8],
    channel: &str,
    store: &PropertyStore,
    slot: &str,
) -> Result<(Vec<f64>, String, String), FormatError> {
    let enc_data = format!("channel.{channel}.data.encoder.type");
    let enc_plain = format!("channel.{channel}.encoder.type");
    let encoder = store.get_first_text(&[enc_data.as_str(), enc_plain.as_str()])?;

    let mult_data = format!("channel.{channel}.data.encoder.scaling.multiplier");
    let mult_plain = format!("channel.{channel}.encoder.scaling.multiplier");
    let multiplier = store.get_first_f64(&[mult_data.as_str(), mult_plain.as_str()])?;

    let off_data = format!("channel.{channel}.data.encoder.scaling.offset");
    let off_plain = format!("channel.{channel}.encoder.scaling.offset");
    let offset = store.get_first_f64(&[off_data.as_str(), off_plain.as_str()])?;

    let mut data = decode_raw(bytes, &encoder)?;
    for v in &mut data {
        *v = *v * multiplier + offset;
    }

    let transform = conversion::resolve(store, channel, slot)?;
    transform.apply(&mut data);
    Ok((data, transform.unit, transform.label))
}
