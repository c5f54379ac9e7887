//! Key to file name mapping
//!
//! Keys are escaped byte-wise: `[A-Za-z0-9_-]` pass through unchanged and
//! every other byte of the UTF-8 key becomes `%XX` (uppercase hex). The
//! mapping is injective, never yields a path separator or a leading dot,
//! and is reversed when enumerating the store.

use crate::core::error::{CacheError, Result};

/// Longest file name accepted by common filesystems
pub const MAX_FILE_NAME_LEN: usize = 255;

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

/// Escape a key into a file name component
pub fn escape(key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }

    let mut escaped = String::with_capacity(key.len());
    for &byte in key.as_bytes() {
        if is_plain(byte) {
            escaped.push(byte as char);
        } else {
            escaped.push('%');
            escaped.push_str(&hex::encode_upper([byte]));
        }
    }
    Ok(escaped)
}

/// Recover a key from an escaped file name component.
///
/// Returns `None` for anything [`escape`] could not have produced.
pub fn unescape(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'%' {
            let digits = bytes.get(i + 1..i + 3)?;
            if !digits
                .iter()
                .all(|d| d.is_ascii_digit() || (b'A'..=b'F').contains(d))
            {
                return None;
            }
            let decoded = hex::decode(digits).ok()?[0];
            // plain bytes are never escaped
            if is_plain(decoded) {
                return None;
            }
            out.push(decoded);
            i += 3;
        } else if is_plain(byte) {
            out.push(byte);
            i += 1;
        } else {
            return None;
        }
    }

    if out.is_empty() {
        return None;
    }
    String::from_utf8(out).ok()
}

/// Full file name for a key: escaped key followed by the store suffix
pub fn file_name(key: &str, suffix: &str) -> Result<String> {
    let name = format!("{}{}", escape(key)?, suffix);
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(CacheError::InvalidKey(format!(
            "escaped file name is {} bytes, limit is {}",
            name.len(),
            MAX_FILE_NAME_LEN
        )));
    }
    Ok(name)
}

/// Recover the key from a full file name, if it carries the suffix
pub fn key_from_file_name(name: &str, suffix: &str) -> Option<String> {
    name.strip_suffix(suffix).and_then(unescape)
}
