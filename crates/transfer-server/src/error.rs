//! Transfer failures and their HTTP rendering.
//!
//! Validation failures keep the 200 status the clients of this server expect
//! and carry the reason in a JSON envelope. Only I/O failures on the server
//! side switch to a 500.

use std::fmt;
use std::io;

use actix_web::HttpResponse;
use actix_web::http::Method;
use transfer_types::{
    ErrorEnvelope, MSG_FILE_NAME_REQUIRED, MSG_FILE_NOT_FOUND, MSG_INVALID_FILE_NAME,
    UnsupportedVerbEnvelope,
};

#[derive(Debug)]
pub(crate) enum TransferError {
    MissingFileName,
    InvalidFileName,
    NotFound,
    UnsupportedVerb(Method),
    Interrupted { bytes: u64, source: io::Error },
    Io(io::Error),
}

impl TransferError {
    /// Convert a transfer error into an HTTP response.
    pub(crate) fn into_response(self) -> HttpResponse {
        match self {
            TransferError::MissingFileName => {
                HttpResponse::Ok().json(ErrorEnvelope::new(MSG_FILE_NAME_REQUIRED))
            }
            TransferError::InvalidFileName => {
                HttpResponse::Ok().json(ErrorEnvelope::new(MSG_INVALID_FILE_NAME))
            }
            TransferError::NotFound => {
                HttpResponse::Ok().json(ErrorEnvelope::new(MSG_FILE_NOT_FOUND))
            }
            TransferError::UnsupportedVerb(method) => {
                HttpResponse::Ok().json(UnsupportedVerbEnvelope::for_method(method.as_str()))
            }
            TransferError::Interrupted { bytes, .. } => HttpResponse::InternalServerError()
                .json(ErrorEnvelope::new(format!(
                    "upload interrupted after {bytes} bytes"
                ))),
            TransferError::Io(err) => {
                HttpResponse::InternalServerError().json(ErrorEnvelope::new(err.to_string()))
            }
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::MissingFileName => f.write_str(MSG_FILE_NAME_REQUIRED),
            TransferError::InvalidFileName => f.write_str(MSG_INVALID_FILE_NAME),
            TransferError::NotFound => f.write_str(MSG_FILE_NOT_FOUND),
            TransferError::UnsupportedVerb(method) => {
                write!(f, "unexpected HTTP request verb: {method}")
            }
            TransferError::Interrupted { bytes, source } => {
                write!(f, "transfer interrupted after {bytes} bytes: {source}")
            }
            TransferError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        TransferError::Io(err)
    }
}
