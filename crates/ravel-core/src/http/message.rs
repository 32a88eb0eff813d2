use std::collections::HashMap;

/// A parsed HTTP request.
///
/// Immutable from the router onward, except `path_params`, which the
/// matching route fills in before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub path_params: HashMap<String, String>,
    pub body: String,
}

impl HttpRequest {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// A captured path parameter, e.g. `id` for pattern `/users/:id`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }
}

/// An HTTP response under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status_code: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            ..Default::default()
        }
    }

    /// 200 with a plain body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// 200 with a JSON body and content type.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn not_found() -> Self {
        let mut response = Self::new(404, "Not Found");
        response.body = "404 Not Found".to_string();
        response
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        let mut response = Self::new(400, "Bad Request");
        response.body = body.into();
        response
    }

    pub fn unauthorized(body: impl Into<String>) -> Self {
        let mut response = Self::new(401, "Unauthorized");
        response.body = body.into();
        response
    }

    pub fn internal_error(body: impl Into<String>) -> Self {
        let mut response = Self::new(500, "Internal Server Error");
        response.body = body.into();
        response
    }

    /// Append a header (builder style).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest {
            method: "GET".to_string(),
            path: "/".to_string(),
            version: "HTTP/1.1".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            path_params: HashMap::new(),
            body: String::new(),
        };
        assert_eq!(request.header("content-type"), Some("text/plain"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(request.header("Accept"), None);
    }

    #[test]
    fn constructors_set_status() {
        assert_eq!(HttpResponse::ok("hi").status_code, 200);
        assert_eq!(HttpResponse::not_found().status_code, 404);
        assert_eq!(HttpResponse::unauthorized("").status_code, 401);
        assert_eq!(
            HttpResponse::json("{}").header_value("content-type"),
            Some("application/json")
        );
    }
}
