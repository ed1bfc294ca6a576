use serde::{Deserialize, Serialize};

pub mod digest;

/// Chunk size used for every streamed read and write.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Query parameter carrying the stored file name.
pub const FILE_NAME_PARAM: &str = "fileName";

/// `errorCode` reported in every error envelope.
pub const ERROR_CODE: i32 = -1;

/// `returnCode` reported by a successful upload.
pub const RETURN_CODE_OK: i32 = 0;

pub const MSG_FILE_NAME_REQUIRED: &str = "file name required";
pub const MSG_FILE_NOT_FOUND: &str = "file does not exist";
pub const MSG_INVALID_FILE_NAME: &str = "invalid file name";

/// Error payload returned for rejected transfers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// Always `-1`.
    pub error_code: i32,
    /// Human-readable reason.
    pub error_message: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_code: ERROR_CODE,
            error_message: message.into(),
        }
    }
}

/// Payload returned when the request verb is neither GET nor POST.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UnsupportedVerbEnvelope {
    /// `Unexpected HTTP request verb: <METHOD>`.
    pub error: String,
}

impl UnsupportedVerbEnvelope {
    pub fn for_method(method: &str) -> Self {
        Self {
            error: format!("Unexpected HTTP request verb: {method}"),
        }
    }
}

/// Receipt returned after an upload has been persisted.
///
/// `file_size` and `file_hash` are computed from the stored file, not from the
/// request stream, so they describe exactly what a later download returns.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// `0` on success.
    pub return_code: i32,
    /// Stored size in bytes.
    pub file_size: u64,
    /// Lowercase hex MD5 of the stored bytes.
    pub file_hash: String,
    /// Name the file was stored under.
    pub file_name: String,
}
