/// Key layout for the fjall `records` partition: `record:{archive_name}` -> JobRecord (JSON)
use crate::job::is_safe_component;

use super::error::{LedgerError, Result};

const RECORD_PREFIX: &str = "record:";

/// Encode a record key, rejecting names that could never be archive files
pub fn encode_record_key(archive_name: &str) -> Result<Vec<u8>> {
    if !is_safe_component(archive_name) {
        return Err(LedgerError::InvalidKey(archive_name.to_string()));
    }
    Ok(format!("{RECORD_PREFIX}{archive_name}").into_bytes())
}

/// Decode `record:{archive_name}` back to the archive name
pub fn decode_record_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix(RECORD_PREFIX).map(String::from)
}

/// File name used by the file-backed store: `.{archive_name}.dat`
pub fn record_file_name(archive_name: &str) -> Result<String> {
    if !is_safe_component(archive_name) {
        return Err(LedgerError::InvalidKey(archive_name.to_string()));
    }
    Ok(format!(".{archive_name}.dat"))
}

/// Inverse of [`record_file_name`]
pub fn archive_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix('.')?
        .strip_suffix(".dat")
        .filter(|name| !name.is_empty())
}
