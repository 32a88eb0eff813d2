//! Request-transforming stages chained before the router.

use std::sync::Arc;

use tracing::info;

use crate::error::RavelError;
use crate::exec::Sender;

use super::message::HttpRequest;

/// A middleware maps a request to a sender of a (possibly rewritten)
/// request, or fails down the error channel to short-circuit the chain.
pub type Middleware = Arc<dyn Fn(HttpRequest) -> Sender<HttpRequest> + Send + Sync>;

/// Log method and path, pass the request through unchanged.
pub fn logging_middleware() -> Middleware {
    Arc::new(|request| {
        info!(method = %request.method, path = %request.path, "request");
        Sender::just(request)
    })
}

/// Require `Authorization: Bearer <token>`; reject with `Unauthorized`
/// otherwise, which the pipeline maps to a 401.
pub fn auth_middleware(token: impl Into<String>) -> Middleware {
    let expected = format!("Bearer {}", token.into());
    Arc::new(move |request| match request.header("Authorization") {
        Some(value) if value == expected => Sender::just(request),
        _ => Sender::fail(RavelError::Unauthorized),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request_with(headers: Vec<(String, String)>) -> HttpRequest {
        HttpRequest {
            method: "GET".to_string(),
            path: "/".to_string(),
            version: "HTTP/1.1".to_string(),
            headers,
            path_params: HashMap::new(),
            body: String::new(),
        }
    }

    #[test]
    fn auth_accepts_matching_token() {
        let middleware = auth_middleware("T");
        let request = request_with(vec![(
            "Authorization".to_string(),
            "Bearer T".to_string(),
        )]);
        let passed = middleware(request).sync_wait().unwrap().unwrap();
        assert_eq!(passed.path, "/");
    }

    #[test]
    fn auth_rejects_missing_or_wrong_token() {
        let middleware = auth_middleware("T");

        let bare = middleware(request_with(Vec::new())).sync_wait();
        assert!(matches!(bare, Err(RavelError::Unauthorized)));

        let wrong = middleware(request_with(vec![(
            "Authorization".to_string(),
            "Bearer X".to_string(),
        )]))
        .sync_wait();
        assert!(matches!(wrong, Err(RavelError::Unauthorized)));
    }

    #[test]
    fn logging_passes_through() {
        let middleware = logging_middleware();
        let passed = middleware(request_with(Vec::new())).sync_wait().unwrap().unwrap();
        assert_eq!(passed.method, "GET");
    }
}
