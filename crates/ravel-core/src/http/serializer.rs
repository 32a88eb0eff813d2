//! Serialize responses to wire bytes.

use std::fmt::Write;

use super::message::HttpResponse;

/// Emit status line, headers, blank line, body.
///
/// `Content-Length` is inserted when the body is non-empty and the caller
/// did not set one; without it keep-alive clients cannot frame the reply.
pub fn serialize(response: &HttpResponse) -> Vec<u8> {
    let mut out = String::with_capacity(64 + response.body.len());

    let _ = write!(
        out,
        "HTTP/1.1 {} {}\r\n",
        response.status_code, response.status_text
    );
    for (name, value) in &response.headers {
        let _ = write!(out, "{}: {}\r\n", name, value);
    }
    if !response.body.is_empty() && response.header_value("Content-Length").is_none() {
        let _ = write!(out, "Content-Length: {}\r\n", response.body.len());
    }
    out.push_str("\r\n");
    out.push_str(&response.body);

    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_status_line_and_auto_length() {
        let bytes = serialize(&HttpResponse::ok("Welcome!"));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 8\r\n"));
        assert!(text.ends_with("\r\n\r\nWelcome!"));
    }

    #[test]
    fn empty_body_gets_no_length_header() {
        let text = String::from_utf8(serialize(&HttpResponse::new(204, "No Content"))).unwrap();
        assert_eq!(text, "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn explicit_length_is_not_duplicated() {
        let response = HttpResponse::ok("abc").header("Content-Length", "3");
        let text = String::from_utf8(serialize(&response)).unwrap();
        assert_eq!(text.matches("Content-Length").count(), 1);
    }
}
