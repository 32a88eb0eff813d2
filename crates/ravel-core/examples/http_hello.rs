//! HTTP server with routes, path params, and middleware on 127.0.0.1:8080.
//!
//! Every route sits behind the auth middleware:
//!
//! ```bash
//! cargo run --example http_hello
//! curl http://127.0.0.1:8080/                                        # 401
//! curl -H 'Authorization: Bearer secret' http://127.0.0.1:8080/
//! curl -H 'Authorization: Bearer secret' http://127.0.0.1:8080/users/42
//! ```

use std::sync::Arc;

use ravel_core::prelude::*;

fn main() -> RavelResult<()> {
    init_logging();

    let mut router = HttpRouter::new();
    router.add_resource("service_name", Arc::new("ravel demo".to_string()));

    router.get("/", |_, _| HttpResponse::ok("Welcome!"));
    router.get("/users/:id", |req, _| {
        HttpResponse::json(format!("{{\"id\":\"{}\"}}", req.param("id").unwrap_or("")))
    });
    router.get("/about", |_, ctx| {
        let name = ctx
            .get::<String>("service_name")
            .map(|n| n.as_str().to_string())
            .unwrap_or_default();
        HttpResponse::ok(name)
    });
    router.get("/admin", |_, _| HttpResponse::ok("admin area"));

    let factory = HttpPipelineBuilder::new(router)
        .with_middleware(logging_middleware())
        .with_middleware(auth_middleware("secret"))
        .build();

    let server = TcpServer::new("127.0.0.1:8080".parse()?, factory);

    Application::new().add_plugin(server).run()
}
