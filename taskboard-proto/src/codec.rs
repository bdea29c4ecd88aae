//! JSON encoding of the persisted filter blob.
//!
//! The filter store only sees strings; this module owns the mapping between
//! [`TaskFiltersState`] and that opaque blob.

use crate::filters::TaskFiltersState;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encodes filter settings into the blob stored under the filters key.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the state cannot be serialized.
pub fn encode_filters(filters: &TaskFiltersState) -> Result<String, CodecError> {
    Ok(serde_json::to_string(filters)?)
}

/// Decodes a stored filter blob. Missing attributes take their defaults.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the blob is not valid JSON or
/// holds values outside the known enums.
pub fn decode_filters(blob: &str) -> Result<TaskFiltersState, CodecError> {
    Ok(serde_json::from_str(blob)?)
}
