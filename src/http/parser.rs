use crate::error::ParseError;
use crate::http::event::RequestHead;
use crate::http::request::{Method, Version, is_token};

/// Bounds applied while framing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest request line plus header block, delimiter included.
    pub max_header_bytes: usize,
    /// Largest `Content-Length` accepted.
    pub max_body_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Parses the request line and header block at the start of `buf`.
///
/// On success returns the head and the number of bytes it occupied,
/// including the blank line. Body bytes are left to the caller.
pub fn parse_request_head(buf: &[u8], limits: &Limits) -> Result<(RequestHead, usize), ParseError> {
    let headers_end = match find_headers_end(buf, 0) {
        Some(end) => end,
        None if buf.len() > limits.max_header_bytes => {
            return Err(ParseError::HeadersTooLarge {
                limit: limits.max_header_bytes,
            });
        }
        None => return Err(ParseError::Incomplete),
    };
    let consumed = headers_end + 4;
    if consumed > limits.max_header_bytes {
        return Err(ParseError::HeadersTooLarge {
            limit: limits.max_header_bytes,
        });
    }

    let head = std::str::from_utf8(&buf[..headers_end]).map_err(|_| ParseError::InvalidRequestLine)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = Vec::new();
    for line in lines {
        headers.push(parse_header_line(line)?);
    }

    if headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Transfer-Encoding")) {
        return Err(ParseError::UnsupportedTransferEncoding);
    }

    let content_length = content_length(&headers)?.unwrap_or(0);
    if content_length > limits.max_body_bytes {
        return Err(ParseError::BodyTooLarge {
            declared: content_length,
            limit: limits.max_body_bytes,
        });
    }

    let head = RequestHead {
        method,
        target,
        version,
        headers,
        content_length,
    };
    Ok((head, consumed))
}

/// Position of the first `\r\n\r\n` at or after `from`.
pub fn find_headers_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + from)
}

fn parse_request_line(line: &str) -> Result<(Method, String, Version), ParseError> {
    let mut parts = line.splitn(3, ' ');
    let method_str = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let target = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let version = parts.next().ok_or(ParseError::InvalidRequestLine)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    if target.is_empty() || target.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(ParseError::InvalidTarget);
    }

    Ok((method, target.to_string(), parse_version(version)?))
}

fn parse_version(s: &str) -> Result<Version, ParseError> {
    match s {
        "HTTP/1.1" => Ok(Version::Http11),
        "HTTP/1.0" => Ok(Version::Http10),
        _ => {
            let digits = s.strip_prefix("HTTP/").map(str::as_bytes);
            match digits {
                Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit() => {
                    Err(ParseError::UnsupportedVersion(s.to_string()))
                }
                _ => Err(ParseError::InvalidVersion),
            }
        }
    }
}

fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    // obs-fold continuation lines are rejected outright
    if line.starts_with([' ', '\t']) {
        return Err(ParseError::InvalidHeader);
    }

    let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
    // whitespace before the colon is not trimmed: it is a smuggling vector
    if !is_token(name) {
        return Err(ParseError::InvalidHeader);
    }

    let value = value.trim_matches([' ', '\t']);
    if value.bytes().any(|b| (b < b' ' && b != b'\t') || b == 0x7f) {
        return Err(ParseError::InvalidHeader);
    }

    Ok((name.to_string(), value.to_string()))
}

/// Every `Content-Length` line must be plain digits and all must agree.
fn content_length(headers: &[(String, String)]) -> Result<Option<u64>, ParseError> {
    let mut declared = None;
    for (_, value) in headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
    {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidContentLength);
        }
        let length: u64 = value.parse().map_err(|_| ParseError::InvalidContentLength)?;
        match declared {
            Some(previous) if previous != length => return Err(ParseError::InvalidContentLength),
            _ => declared = Some(length),
        }
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_request_head(req, &Limits::default()).unwrap();

        assert_eq!(parsed.target, "/");
        assert_eq!(parsed.header("host"), Some("example.com"));
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn find_headers_end_resumes_from_offset() {
        let buf = b"a\r\n\r\nb\r\n\r\n";
        assert_eq!(find_headers_end(buf, 0), Some(1));
        assert_eq!(find_headers_end(buf, 2), Some(6));
        assert_eq!(find_headers_end(buf, 20), None);
    }

    #[test]
    fn version_classification() {
        assert_eq!(parse_version("HTTP/1.0"), Ok(Version::Http10));
        assert_eq!(
            parse_version("HTTP/2.0"),
            Err(ParseError::UnsupportedVersion("HTTP/2.0".into()))
        );
        assert_eq!(parse_version("HTTP/1.1x"), Err(ParseError::InvalidVersion));
        assert_eq!(parse_version("http/1.1"), Err(ParseError::InvalidVersion));
    }
}
