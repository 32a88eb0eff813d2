//! HTTP/1.1 codec, router, middleware, and stream pipeline.

pub mod message;
pub mod middleware;
pub mod parser;
pub mod pipeline;
pub mod router;
pub mod serializer;

pub use message::{HttpRequest, HttpResponse};
pub use middleware::{Middleware, auth_middleware, logging_middleware};
pub use pipeline::{HttpPipeline, HttpPipelineBuilder};
pub use router::{HttpRoute, HttpRouter};
