//! Java-properties parsing and the shared-header indirection scheme.
//!
//! JPK archives describe every curve with Java-properties text members.
//! Curve- and segment-level headers may reference de-duplicated blocks in
//! `shared-data/header.properties` through indirection tags: a key of the
//! form `<prefix>.<mediator>.*` whose value is an index into the shared
//! block `<mediator>.<index>.*`. Substitution copies the matched suffixes
//! under `<prefix>.`; a missing shared match is deliberately left alone, so
//! incomplete files surface later as missing-metadata errors instead of
//! failing at parse time.

use std::collections::BTreeMap;

use crate::errors::FormatError;

/// A parsed property value: the original string, or its float coercion when
/// the string parses as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Non-numeric property text.
    Str(String),
    /// Numeric property value.
    Float(f64),
}

impl PropValue {
    /// Textual rendering of the value.
    pub fn as_text(&self) -> String {
        match self {
            PropValue::Str(s) => s.clone(),
            PropValue::Float(v) => format!("{v}"),
        }
    }

    /// Numeric value, if the property was numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Float(v) => Some(*v),
            PropValue::Str(_) => None,
        }
    }
}

/// Flat mapping from dotted property keys to coerced values.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    map: BTreeMap<String, PropValue>,
}

impl PropertyStore {
    /// Build a store from raw string properties, coercing numeric values.
    pub fn from_raw(raw: BTreeMap<String, String>) -> Self {
        let map = raw
            .into_iter()
            .map(|(k, v)| {
                let value = match v.trim().parse::<f64>() {
                    Ok(f) => PropValue::Float(f),
                    Err(_) => PropValue::Str(v),
                };
                (k, value)
            })
            .collect();
        PropertyStore { map }
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Raw access to a property.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.map.get(key)
    }

    /// The first present property among `candidates`.
    pub fn get_first<'a>(&self, candidates: &'a [&'a str]) -> Option<&PropValue> {
        candidates.iter().find_map(|key| self.map.get(*key))
    }

    /// Numeric property, failing with a format-metadata error when absent
    /// or non-numeric.
    pub fn get_f64(&self, key: &str) -> Result<f64, FormatError> {
        match self.map.get(key) {
            Some(PropValue::Float(v)) => Ok(*v),
            Some(PropValue::Str(s)) => Err(FormatError::FormatMetadata(format!(
                "property '{key}' is not numeric: '{s}'"
            ))),
            None => Err(FormatError::missing_property(key)),
        }
    }

    /// Textual property, failing with a format-metadata error when absent.
    pub fn get_text(&self, key: &str) -> Result<String, FormatError> {
        self.map
            .get(key)
            .map(PropValue::as_text)
            .ok_or_else(|| FormatError::missing_property(key))
    }

    /// First present textual property among `candidates`.
    pub fn get_first_text(&self, candidates: &[&str]) -> Result<String, FormatError> {
        self.get_first(candidates)
            .map(PropValue::as_text)
            .ok_or_else(|| FormatError::missing_property(candidates[0]))
    }

    /// First present numeric property among `candidates`.
    pub fn get_first_f64(&self, candidates: &[&str]) -> Result<f64, FormatError> {
        for key in candidates {
            if self.contains(key) {
                return self.get_f64(key);
            }
        }
        Err(FormatError::missing_property(candidates[0]))
    }
}

/// Parse a Java-properties text blob into raw key/value strings.
///
/// Supports `=`/`:`/whitespace separators, `\`-escapes (including
/// `\uXXXX`), continuation lines, and `#`/`!` comments. Malformed escape
/// sequences are a data-file error.
pub fn parse_properties(bytes: &[u8]) -> Result<BTreeMap<String, String>, FormatError> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = BTreeMap::new();

    let mut logical = String::new();
    let mut continuing = false;
    for raw_line in text.lines() {
        let line = raw_line.trim_start();
        if !continuing {
            logical.clear();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
        }
        if ends_with_odd_backslashes(line) {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }
        logical.push_str(line);
        continuing = false;
        let (key, value) = split_key_value(&logical)?;
        if key.is_empty() {
            return Err(FormatError::DataFileBroken(format!(
                "property line without a key: '{logical}'"
            )));
        }
        out.insert(key, value);
    }
    Ok(out)
}

fn ends_with_odd_backslashes(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split one logical property line into unescaped key and value.
fn split_key_value(line: &str) -> Result<(String, String), FormatError> {
    let chars: Vec<char> = line.chars().collect();
    let mut split = None;
    let mut explicit = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '=' | ':' => {
                split = Some(i);
                explicit = true;
                break;
            }
            c if c.is_whitespace() => {
                split = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let (key_part, mut rest) = match split {
        Some(pos) => (&line[..char_index(line, pos)], &line[char_index(line, pos)..]),
        None => (line, ""),
    };
    if !rest.is_empty() {
        if explicit {
            rest = &rest[rest.chars().next().map(char::len_utf8).unwrap_or(0)..];
        }
        rest = rest.trim_start();
        // a whitespace-separated key may still carry an explicit separator
        if !explicit && (rest.starts_with('=') || rest.starts_with(':')) {
            rest = rest[1..].trim_start();
        }
    }
    Ok((unescape(key_part)?, unescape(rest)?))
}

/// Byte offset of the `n`-th character in `s`.
fn char_index(s: &str, n: usize) -> usize {
    s.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn unescape(s: &str) -> Result<String, FormatError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return Err(FormatError::DataFileBroken(format!(
                        "truncated \\u escape in '{s}'"
                    )));
                }
                let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                    FormatError::DataFileBroken(format!("bad \\u escape '\\u{hex}'"))
                })?;
                let decoded = char::from_u32(code).ok_or_else(|| {
                    FormatError::DataFileBroken(format!("bad \\u escape '\\u{hex}'"))
                })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {
                return Err(FormatError::DataFileBroken(format!(
                    "dangling escape in '{s}'"
                )))
            }
        }
    }
    Ok(out)
}

/// Substitute indirection tags in `props` from the shared property block.
///
/// For every key matching `<prefix>.<mediator>.*`, the key's value is
/// interpreted as an index into `shared` under `<mediator>.<index>.*` and
/// all matched suffixes are copied to `<prefix>.<suffix>`. No substitution
/// happens when the shared block has no match.
pub fn substitute_indirection(
    props: &mut BTreeMap<String, String>,
    shared: &BTreeMap<String, String>,
) {
    let tags: Vec<String> = props
        .keys()
        .filter(|k| k.contains(".*"))
        .cloned()
        .collect();
    for tag in tags {
        let Some(index) = props.get(&tag).map(|v| v.trim().to_string()) else {
            continue;
        };
        let parts: Vec<&str> = tag.split('.').collect();
        if parts.len() < 2 {
            continue;
        }
        let mediator = parts[parts.len() - 2];
        let prefix = if parts.len() >= 3 {
            parts[..parts.len() - 2].join(".")
        } else {
            parts[0].to_string()
        };
        // trailing dot so index "1" does not match "10"
        let start = format!("{mediator}.{index}.");
        for (shared_key, shared_value) in shared.range(start.clone()..) {
            if !shared_key.starts_with(&start) {
                break;
            }
            let suffix: String = shared_key
                .split('.')
                .skip(2)
                .collect::<Vec<_>>()
                .join(".");
            props.insert(format!("{prefix}.{suffix}"), shared_value.clone());
        }
    }
}

/// Merge the archive-level general header, filling gaps only.
pub fn merge_general(props: &mut BTreeMap<String, String>, general: &BTreeMap<String, String>) {
    for (key, value) in general {
        props.entry(key.clone()).or_insert_with(|| value.clone());
    }
}
