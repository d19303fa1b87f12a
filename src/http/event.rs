//! Events produced by the connection state machine.
//!
//! For one message the order is always: one [`WireEvent::RequestHeader`],
//! zero or more [`WireEvent::BodyChunk`], one [`WireEvent::MessageEnd`]. The
//! next message's `RequestHeader` can only follow that `MessageEnd`.

use bytes::Bytes;

use crate::error::ParseError;
use crate::http::request::{Method, Version};

/// Parsed request line and header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: Vec<(String, String)>,
    /// Body length framed by `Content-Length`, 0 when absent.
    pub content_length: u64,
}

impl RequestHead {
    pub fn header(&self, key: &str) -> Option<&str> {
        crate::http::request::header_value(&self.headers, key)
    }

    pub fn keep_alive(&self) -> bool {
        crate::http::request::keep_alive(self.version, &self.headers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    RequestHeader(RequestHead),
    BodyChunk(Bytes),
    MessageEnd,
    /// The peer closed its writing side.
    PeerClosed,
    /// Nothing more can be produced until more bytes arrive.
    NeedMoreData,
    ParseError(ParseError),
}
