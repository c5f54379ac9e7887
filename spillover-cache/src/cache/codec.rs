//! On-disk entry framing
//!
//! Frame layout (big-endian):
//! - magic `SPLC` (4 bytes)
//! - version (u8)
//! - payload length (u64)
//! - CRC32 of payload (u32)
//! - payload: bincode encoding of the [`Entry`]

use crate::core::error::{CacheError, Result};
use crate::core::types::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"SPLC";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 4 + 1 + 8 + 4;

/// Reasons a stored frame can fail to decode
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: {0} bytes")]
    Truncated(usize),

    #[error("bad magic")]
    BadMagic,

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("payload length mismatch: header says {expected}, found {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("payload decode failed: {0}")]
    Payload(String),
}

/// Encode an entry into a complete frame
pub fn encode<V: Serialize>(entry: &Entry<V>) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(entry, bincode::config::standard())
        .map_err(|e| CacheError::Serialization(e.to_string()))?;
    let checksum = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.push(VERSION);
    frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    frame.extend_from_slice(&checksum.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a complete frame back into an entry
pub fn decode<V: DeserializeOwned>(frame: &[u8]) -> std::result::Result<Entry<V>, FrameError> {
    if frame.len() < HEADER_LEN {
        return Err(FrameError::Truncated(frame.len()));
    }
    let (header, payload) = frame.split_at(HEADER_LEN);

    if &header[0..4] != MAGIC {
        return Err(FrameError::BadMagic);
    }
    if header[4] != VERSION {
        return Err(FrameError::UnsupportedVersion(header[4]));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[5..13]);
    let expected_len = u64::from_be_bytes(len_bytes);
    if expected_len != payload.len() as u64 {
        return Err(FrameError::LengthMismatch {
            expected: expected_len,
            actual: payload.len() as u64,
        });
    }

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&header[13..17]);
    let expected_crc = u32::from_be_bytes(crc_bytes);
    let actual_crc = crc32fast::hash(payload);
    if expected_crc != actual_crc {
        return Err(FrameError::ChecksumMismatch {
            expected: expected_crc,
            actual: actual_crc,
        });
    }

    let (entry, consumed): (Entry<V>, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| FrameError::Payload(e.to_string()))?;
    if consumed != payload.len() {
        return Err(FrameError::Payload(format!(
            "{} trailing bytes",
            payload.len() - consumed
        )));
    }

    Ok(entry)
}
