//! Error types for the connection core.
//!
//! Protocol errors caused by the peer ([`ParseError`]) are distinct from
//! local faults ([`FramingViolation`], transport and dispatcher faults). All of
//! them end the connection; none are retried.

use std::io;

use thiserror::Error;

use crate::http::response::StatusCode;

/// A request the peer sent could not be framed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The header block delimiter has not arrived yet.
    #[error("incomplete request head")]
    Incomplete,

    #[error("malformed request line")]
    InvalidRequestLine,

    #[error("invalid method token")]
    InvalidMethod,

    #[error("invalid request target")]
    InvalidTarget,

    #[error("malformed HTTP version")]
    InvalidVersion,

    #[error("unsupported HTTP version {0}")]
    UnsupportedVersion(String),

    #[error("malformed header line")]
    InvalidHeader,

    #[error("invalid content-length")]
    InvalidContentLength,

    #[error("transfer-encoding is not supported")]
    UnsupportedTransferEncoding,

    /// No header delimiter within the configured bound.
    #[error("request head exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("declared body of {declared} bytes exceeds limit of {limit}")]
    BodyTooLarge { declared: u64, limit: u64 },
}

impl ParseError {
    /// Status used for the best-effort error response.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::HeadersTooLarge { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            ParseError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ParseError::UnsupportedTransferEncoding => StatusCode::NOT_IMPLEMENTED,
            ParseError::UnsupportedVersion(_) => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// The local side tried to send a response that breaks HTTP/1.1 framing.
///
/// This is a programming error in the dispatcher or caller, never the peer's
/// fault, and is never corrected silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingViolation {
    #[error("response body of {actual} bytes does not match content-length {declared}")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("body write of {attempted} bytes overruns content-length {declared}")]
    BodyOverrun { declared: u64, attempted: u64 },

    #[error("content-length header {0:?} is not a number")]
    InvalidContentLength(String),

    #[error("interim status {0} cannot be sent")]
    UnsupportedStatus(u16),

    #[error("status {0} must not carry a body")]
    BodyNotAllowed(u16),

    #[error("transfer-encoding {0:?} is not supported")]
    UnsupportedTransferEncoding(String),

    #[error("header {0:?} contains a forbidden character")]
    InvalidHeader(String),

    #[error("no request is awaiting a response")]
    NoPendingRequest,

    #[error("a response is already in progress")]
    ResponseInProgress,

    #[error("no response is in progress")]
    NoResponseInProgress,

    #[error("connection is closed for writing")]
    Closed,
}

/// Failure returned by a request dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher failed without a response; the core answers `500`.
    #[error("dispatcher fault: {0}")]
    Fault(#[from] anyhow::Error),

    /// The dispatcher failed but supplied the response to send.
    #[error("dispatcher error response ({})", .0.status)]
    Respond(crate::http::response::Response),
}

/// Local fault that ended a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("framing violation: {0}")]
    Framing(#[from] FramingViolation),

    #[error("transport fault: {0}")]
    Transport(#[from] io::Error),

    #[error("peer closed mid-message")]
    Truncated,

    #[error("dispatcher fault: {0}")]
    Dispatcher(String),
}
