//! Method + path-pattern routing with parameter capture.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::context::Context;
use crate::exec::Sender;

use super::message::{HttpRequest, HttpResponse};

type BoxedHandler = Arc<dyn Fn(HttpRequest, Arc<Context>) -> Sender<HttpResponse> + Send + Sync>;

/// One (method, compiled pattern, handler) rule.
pub struct HttpRoute {
    method: String,
    pattern: Regex,
    param_names: Vec<String>,
    handler: BoxedHandler,
}

impl HttpRoute {
    fn new(method: String, pattern: &str, handler: BoxedHandler) -> Self {
        let (regex, param_names) = compile_pattern(pattern);
        Self {
            method,
            pattern: regex,
            param_names,
            handler,
        }
    }

    /// Method equality (or `*` wildcard) plus full-path pattern match.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        (self.method == "*" || self.method.eq_ignore_ascii_case(method))
            && self.pattern.is_match(path)
    }

    /// Named captures for a path this route matches.
    pub fn extract_params(&self, path: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Some(captures) = self.pattern.captures(path) {
            for (i, name) in self.param_names.iter().enumerate() {
                if let Some(value) = captures.get(i + 1) {
                    params.insert(name.clone(), value.as_str().to_string());
                }
            }
        }
        params
    }

    fn invoke(&self, request: HttpRequest, context: Arc<Context>) -> Sender<HttpResponse> {
        (self.handler)(request, context)
    }
}

/// `:name` segments become `([^/]+)` captures, `*` matches any suffix,
/// every other character is taken literally.
fn compile_pattern(pattern: &str) -> (Regex, Vec<String>) {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    let mut names = Vec::new();

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '/' {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                regex.push_str("([^/]+)");
                names.push(name);
            }
            '*' => regex.push_str(".*"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    // Escaped literals + fixed fragments only, so this cannot fail.
    let compiled = Regex::new(&regex).expect("generated route pattern is valid");
    (compiled, names)
}

/// Ordered route table with a shared read-only resource context.
///
/// First route in registration order that matches wins. No match yields a
/// ready 404 (a success-path response, not an error).
#[derive(Default)]
pub struct HttpRouter {
    routes: Vec<HttpRoute>,
    context: Arc<Context>,
}

impl HttpRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared resource visible to every handler.
    ///
    /// Only valid while the router is still being built.
    pub fn add_resource<T: Any + Send + Sync>(&mut self, name: &str, resource: Arc<T>) {
        match Arc::get_mut(&mut self.context) {
            Some(context) => context.set(name, resource),
            None => warn!(name, "add_resource after router is shared; ignoring"),
        }
    }

    /// Register a synchronous handler; it is lifted into a ready sender.
    pub fn add_route<F>(&mut self, method: &str, pattern: &str, handler: F)
    where
        F: Fn(&HttpRequest, &Context) -> HttpResponse + Send + Sync + 'static,
    {
        let lifted: BoxedHandler =
            Arc::new(move |request, context| Sender::just(handler(&request, &context)));
        self.routes
            .push(HttpRoute::new(method.to_string(), pattern, lifted));
    }

    /// Register an asynchronous handler returning its own sender.
    pub fn add_route_async<F>(&mut self, method: &str, pattern: &str, handler: F)
    where
        F: Fn(HttpRequest, Arc<Context>) -> Sender<HttpResponse> + Send + Sync + 'static,
    {
        self.routes
            .push(HttpRoute::new(method.to_string(), pattern, Arc::new(handler)));
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&HttpRequest, &Context) -> HttpResponse + Send + Sync + 'static,
    {
        self.add_route("GET", pattern, handler);
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&HttpRequest, &Context) -> HttpResponse + Send + Sync + 'static,
    {
        self.add_route("POST", pattern, handler);
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&HttpRequest, &Context) -> HttpResponse + Send + Sync + 'static,
    {
        self.add_route("PUT", pattern, handler);
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&HttpRequest, &Context) -> HttpResponse + Send + Sync + 'static,
    {
        self.add_route("DELETE", pattern, handler);
    }

    pub fn get_async<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(HttpRequest, Arc<Context>) -> Sender<HttpResponse> + Send + Sync + 'static,
    {
        self.add_route_async("GET", pattern, handler);
    }

    /// Dispatch a request to the first matching route.
    pub fn route(&self, mut request: HttpRequest) -> Sender<HttpResponse> {
        for route in &self.routes {
            if route.matches(&request.method, &request.path) {
                request.path_params = route.extract_params(&request.path);
                return route.invoke(request, Arc::clone(&self.context));
            }
        }
        debug!(method = %request.method, path = %request.path, "no route matched");
        Sender::just(HttpResponse::not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, path: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            path_params: HashMap::new(),
            body: String::new(),
        }
    }

    fn dispatch(router: &HttpRouter, method: &str, path: &str) -> HttpResponse {
        router
            .route(request(method, path))
            .sync_wait()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn static_routes_match_exactly() {
        let mut router = HttpRouter::new();
        router.get("/hello/world", |_, _| HttpResponse::ok("hi"));

        assert_eq!(dispatch(&router, "GET", "/hello/world").status_code, 200);
        assert_eq!(dispatch(&router, "GET", "/hello").status_code, 404);
        assert_eq!(dispatch(&router, "POST", "/hello/world").status_code, 404);
    }

    #[test]
    fn params_are_captured_in_order() {
        let mut router = HttpRouter::new();
        router.get("/users/:id/posts/:post_id", |req, _| {
            HttpResponse::ok(format!(
                "{}-{}",
                req.param("id").unwrap(),
                req.param("post_id").unwrap()
            ))
        });

        let response = dispatch(&router, "GET", "/users/42/posts/abc");
        assert_eq!(response.body, "42-abc");
    }

    #[test]
    fn param_map_has_exactly_the_declared_keys() {
        let route = HttpRoute::new(
            "GET".to_string(),
            "/a/:x/b/:y",
            Arc::new(|_, _| Sender::just(HttpResponse::default())),
        );
        assert!(route.matches("GET", "/a/1/b/2"));
        let params = route.extract_params("/a/1/b/2");
        assert_eq!(params.len(), 2);
        assert_eq!(params["x"], "1");
        assert_eq!(params["y"], "2");
    }

    #[test]
    fn wildcard_matches_any_suffix() {
        let mut router = HttpRouter::new();
        router.get("/assets/*", |req, _| HttpResponse::ok(req.path.clone()));

        assert_eq!(dispatch(&router, "GET", "/assets/js/app.js").body, "/assets/js/app.js");
        assert_eq!(dispatch(&router, "GET", "/other").status_code, 404);
    }

    #[test]
    fn wildcard_method_matches_all() {
        let mut router = HttpRouter::new();
        router.add_route("*", "/any", |_, _| HttpResponse::ok("y"));

        assert_eq!(dispatch(&router, "GET", "/any").status_code, 200);
        assert_eq!(dispatch(&router, "DELETE", "/any").status_code, 200);
    }

    #[test]
    fn regex_meta_characters_are_literal() {
        let mut router = HttpRouter::new();
        router.get("/file.txt", |_, _| HttpResponse::ok("y"));

        assert_eq!(dispatch(&router, "GET", "/file.txt").status_code, 200);
        assert_eq!(dispatch(&router, "GET", "/fileStxt").status_code, 404);
    }

    #[test]
    fn first_registered_route_wins() {
        let mut router = HttpRouter::new();
        router.get("/users/:id", |_, _| HttpResponse::ok("param"));
        router.get("/users/me", |_, _| HttpResponse::ok("literal"));

        assert_eq!(dispatch(&router, "GET", "/users/me").body, "param");
    }

    #[test]
    fn resources_reach_handlers() {
        let mut router = HttpRouter::new();
        router.add_resource("motd", Arc::new("be kind".to_string()));
        router.get("/motd", |_, ctx| {
            HttpResponse::ok(ctx.get::<String>("motd").unwrap().as_str())
        });

        assert_eq!(dispatch(&router, "GET", "/motd").body, "be kind");
    }

    #[test]
    fn async_handlers_pass_through() {
        let mut router = HttpRouter::new();
        router.get_async("/slow", |_, _| {
            Sender::just(7).then(|n| HttpResponse::ok(format!("n={n}")))
        });

        assert_eq!(dispatch(&router, "GET", "/slow").body, "n=7");
    }
}
