//! Stream-side HTTP codec: framing detection and request parsing.

use std::collections::HashMap;

use memchr::memmem;

use super::message::{HttpRequest, HttpResponse};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Byte offset just past the end-of-headers marker, if present.
fn header_end(buf: &[u8]) -> Option<usize> {
    memmem::find(buf, HEADER_TERMINATOR).map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Declared Content-Length of the message headers, if any.
///
/// `Some(Err(()))` means the header is present but not a number.
fn content_length(head: &str) -> Option<Result<usize, ()>> {
    for line in head.split("\r\n").skip(1) {
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("Content-Length")
        {
            return Some(value.trim().parse::<usize>().map_err(|_| ()));
        }
    }
    None
}

/// True when the buffer holds at least one full message: terminated headers
/// and, if a Content-Length header is present, the declared body.
pub fn is_complete(buf: &[u8]) -> bool {
    let Some(body_start) = header_end(buf) else {
        return false;
    };
    let Ok(head) = std::str::from_utf8(&buf[..body_start - HEADER_TERMINATOR.len()]) else {
        // Not valid header text; complete enough to be rejected by parse().
        return true;
    };
    match content_length(head) {
        Some(Ok(length)) => buf.len() >= body_start + length,
        Some(Err(())) => true,
        None => true,
    }
}

/// Parse one request from the front of the buffer.
///
/// Returns the request and the number of bytes consumed, or `None` on
/// malformed syntax. Without a Content-Length header the body is the buffer
/// remainder; with one, exactly that many bytes are consumed, leaving any
/// pipelined follow-up request in place.
pub fn parse(buf: &[u8]) -> Option<(HttpRequest, usize)> {
    let body_start = header_end(buf)?;
    let head = std::str::from_utf8(&buf[..body_start - HEADER_TERMINATOR.len()]).ok()?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split(' ');
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    let version = parts.next()?.to_string();
    if method.is_empty() || path.is_empty() || !version.starts_with("HTTP/") {
        return None;
    }

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let (body_bytes, consumed) = match content_length(head) {
        Some(Ok(length)) => {
            if buf.len() < body_start + length {
                return None;
            }
            (&buf[body_start..body_start + length], body_start + length)
        }
        Some(Err(())) => return None,
        None => (&buf[body_start..], buf.len()),
    };
    let body = std::str::from_utf8(body_bytes).ok()?.to_string();

    Some((
        HttpRequest {
            method,
            path,
            version,
            headers,
            path_params: HashMap::new(),
            body,
        },
        consumed,
    ))
}

/// Parse a serialized response; the inverse of the serializer.
pub fn parse_response(buf: &[u8]) -> Option<HttpResponse> {
    let body_start = header_end(buf)?;
    let head = std::str::from_utf8(&buf[..body_start - HEADER_TERMINATOR.len()]).ok()?;

    let mut lines = head.split("\r\n");
    let status_line = lines.next()?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let status_code: u16 = parts.next()?.parse().ok()?;
    let status_text = parts.next().unwrap_or("").to_string();

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let body_bytes = match content_length(head) {
        Some(Ok(length)) => buf.get(body_start..body_start + length)?,
        Some(Err(())) => return None,
        None => &buf[body_start..],
    };
    let body = std::str::from_utf8(body_bytes).ok()?.to_string();

    Some(HttpResponse {
        status_code,
        status_text,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_headers_and_body() {
        let raw = b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (request, consumed) = parse(raw).unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/submit");
        assert_eq!(request.version, "HTTP/1.1");
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.body, "hello");
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn incomplete_without_terminator() {
        assert!(!is_complete(b"GET / HTTP/1.1\r\nHost: x\r\n"));
        assert!(is_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"));
    }

    #[test]
    fn incomplete_until_declared_body_arrives() {
        let partial = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
        assert!(!is_complete(partial));

        let full = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhelloworld";
        assert!(is_complete(full));
    }

    #[test]
    fn content_length_leaves_pipelined_request_in_buffer() {
        let raw = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /b HTTP/1.1\r\n\r\n";
        let (request, consumed) = parse(raw).unwrap();
        assert_eq!(request.body, "abc");

        let (second, _) = parse(&raw[consumed..]).unwrap();
        assert_eq!(second.method, "GET");
        assert_eq!(second.path, "/b");
    }

    #[test]
    fn without_content_length_body_is_remainder() {
        let raw = b"PUT /x HTTP/1.1\r\nHost: x\r\n\r\ntrailing bytes";
        let (request, consumed) = parse(raw).unwrap();
        assert_eq!(request.body, "trailing bytes");
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn malformed_syntax_is_rejected() {
        assert!(parse(b"GARBAGE\r\n\r\n").is_none());
        assert!(parse(b"GET /\r\n\r\n").is_none());
        assert!(parse(b"GET / NOTHTTP\r\n\r\n").is_none());
        assert!(parse(b"GET / HTTP/1.1\r\nbad header line\r\n\r\n").is_none());
        assert!(parse(b"GET / HTTP/1.1\r\nContent-Length: ten\r\n\r\n").is_none());
    }

    #[test]
    fn response_round_trip() {
        use crate::http::serializer::serialize;

        let response = HttpResponse::json("{\"ok\":true}").header("X-Trace", "abc");
        let parsed = parse_response(&serialize(&response)).unwrap();

        assert_eq!(parsed.status_code, 200);
        assert_eq!(parsed.status_text, "OK");
        assert_eq!(parsed.body, response.body);
        assert_eq!(parsed.header_value("x-trace"), Some("abc"));
        assert_eq!(
            parsed.header_value("content-length"),
            Some("11"),
            "serializer injects the length"
        );
    }
}
