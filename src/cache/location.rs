//! Mapping between `(category, key)` pairs and record file names.
//!
//! Records live at `<category>_<key>.json` in the storage root. Both parts
//! are percent-escaped so the mapping is injective and reversible:
//!
//! - the category escapes `_`, so the first `_` in a stem is always the
//!   separator and scans can recover the category without the caller's key;
//! - the key keeps `_` literal (`efforts_123_456.json` stays readable) but
//!   escapes path separators, `%`, and anything outside a safe ASCII set;
//! - a leading `.` is escaped in both, so no record is hidden or named `..`;
//! - uppercase letters are escaped in both, so names stay distinct on
//!   case-insensitive filesystems. Escapes always use uppercase hex and
//!   literal letters are always lowercase, so no two names differ only by case.

use std::fmt;

use crate::error::{CacheError, Result};

/// Separator between the encoded category and the encoded key.
pub const SEPARATOR: char = '_';

/// Extension carried by every record file. Temp files never use it.
pub const EXTENSION: &str = ".json";

/// Logical address of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordLocation {
    pub category: String,
    pub key: String,
}

impl RecordLocation {
    pub fn new(category: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
        }
    }

    /// Deterministic file name for this location.
    pub fn file_name(&self) -> String {
        file_name(&self.category, &self.key)
    }

    /// Recover a location from a file name produced by [`file_name`].
    ///
    /// Only canonical names are accepted: a file whose name would not be
    /// produced by encoding its own decoded parts is not a record.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || CacheError::InvalidLocation(name.to_string());

        let stem = name.strip_suffix(EXTENSION).ok_or_else(invalid)?;
        let (raw_category, raw_key) = stem.split_once(SEPARATOR).ok_or_else(invalid)?;
        let category = decode(raw_category).ok_or_else(invalid)?;
        let key = decode(raw_key).ok_or_else(invalid)?;

        let location = Self { category, key };
        if location.file_name() != name {
            return Err(invalid());
        }
        Ok(location)
    }
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.key)
    }
}

/// File name for `(category, key)`: `"{category}_{key}.json"`, escaped.
pub fn file_name(category: &str, key: &str) -> String {
    format!(
        "{}{}{}{}",
        encode(category, false),
        SEPARATOR,
        encode(key, true),
        EXTENSION
    )
}

/// Category encoded in a record file name, or `None` if it is not one.
pub fn category_of(name: &str) -> Option<String> {
    RecordLocation::parse(name).ok().map(|loc| loc.category)
}

fn is_safe(byte: u8, allow_separator: bool) -> bool {
    byte.is_ascii_lowercase()
        || byte.is_ascii_digit()
        || byte == b'-'
        || byte == b'.'
        || (allow_separator && byte == SEPARATOR as u8)
}

fn encode(raw: &str, allow_separator: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let leading_dot = i == 0 && byte == b'.';
        if is_safe(byte, allow_separator) && !leading_dot {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
