//! Hearth - HTTP/1.1 connection core
//!
//! Frames requests off a byte stream, hands them to a dispatcher and writes
//! the responses back in order, with keep-alive and an idle close timer.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod server;
