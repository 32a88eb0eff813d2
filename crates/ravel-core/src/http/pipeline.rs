//! The HTTP stream pipeline: accumulate bytes, frame requests, run them
//! through the middleware chain and router, serialize replies.

use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::RavelError;
use crate::exec::Sender;
use crate::pipeline::{PipelineFactory, PipelineOutput, TcpPipeline};

use super::message::{HttpRequest, HttpResponse};
use super::middleware::Middleware;
use super::parser;
use super::router::HttpRouter;
use super::serializer;

/// Per-connection HTTP pipeline. Holds the private parse buffer, so every
/// connection gets its own instance from the builder's factory.
pub struct HttpPipeline {
    router: Arc<HttpRouter>,
    middlewares: Arc<Vec<Middleware>>,
    buffer: Vec<u8>,
}

impl HttpPipeline {
    fn new(router: Arc<HttpRouter>, middlewares: Arc<Vec<Middleware>>) -> Self {
        Self {
            router,
            middlewares,
            buffer: Vec::new(),
        }
    }

    /// Pull every complete request off the front of the buffer. A malformed
    /// head poisons the connection: the buffer is dropped and the caller
    /// appends a 400 and closes.
    fn drain_requests(&mut self) -> (Vec<HttpRequest>, bool) {
        let mut requests = Vec::new();
        while parser::is_complete(&self.buffer) {
            match parser::parse(&self.buffer) {
                Some((request, consumed)) => {
                    self.buffer.drain(..consumed);
                    requests.push(request);
                }
                None => {
                    debug!("malformed request head; poisoning connection");
                    self.buffer.clear();
                    return (requests, true);
                }
            }
        }
        (requests, false)
    }
}

impl TcpPipeline for HttpPipeline {
    fn call(&mut self, data: &[u8], _context: &Arc<Context>) -> Sender<PipelineOutput> {
        self.buffer.extend_from_slice(data);

        let (requests, malformed) = self.drain_requests();
        if requests.is_empty() && !malformed {
            return Sender::just(PipelineOutput::pending());
        }

        // Responses are produced strictly in request order: each request is
        // a let_value hop appending its bytes to the accumulator.
        let mut sender = Sender::just(Vec::<u8>::new());
        for request in requests {
            let router = Arc::clone(&self.router);
            let middlewares = Arc::clone(&self.middlewares);
            sender = sender.let_value(move |mut acc| {
                process_one(request, router, middlewares).then(move |bytes| {
                    acc.extend_from_slice(&bytes);
                    acc
                })
            });
        }

        sender.then(move |mut acc| {
            if malformed {
                let rejection = HttpResponse::bad_request("failed to parse request");
                acc.extend_from_slice(&serializer::serialize(&rejection));
                PipelineOutput::final_reply(acc)
            } else {
                PipelineOutput::reply(acc)
            }
        })
    }
}

/// Middlewares left to right, then the router, then serialization; any
/// error anywhere recovers into a protocol-appropriate response.
fn process_one(
    request: HttpRequest,
    router: Arc<HttpRouter>,
    middlewares: Arc<Vec<Middleware>>,
) -> Sender<Vec<u8>> {
    let mut sender = Sender::just(request);
    for middleware in middlewares.iter() {
        let stage = Arc::clone(middleware);
        sender = sender.let_value(move |request| stage(request));
    }

    sender
        .let_value(move |request| router.route(request))
        .then(|response| serializer::serialize(&response))
        .upon_error(|err| serializer::serialize(&error_response(&err)))
}

fn error_response(err: &RavelError) -> HttpResponse {
    match err {
        RavelError::Unauthorized => HttpResponse::unauthorized("unauthorized"),
        RavelError::ParseMalformed => HttpResponse::bad_request("bad request"),
        other => HttpResponse::internal_error(other.to_string()),
    }
}

/// Accumulates a router and middlewares; `build()` returns a factory
/// stamping out fresh per-connection pipelines.
pub struct HttpPipelineBuilder {
    router: Arc<HttpRouter>,
    middlewares: Vec<Middleware>,
}

impl HttpPipelineBuilder {
    pub fn new(router: HttpRouter) -> Self {
        Self {
            router: Arc::new(router),
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware; stages run in the order they were added.
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn build(self) -> PipelineFactory {
        let router = self.router;
        let middlewares = Arc::new(self.middlewares);
        Box::new(move || {
            Box::new(HttpPipeline::new(
                Arc::clone(&router),
                Arc::clone(&middlewares),
            ))
        })
    }
}
