//! ravel-core: an asynchronous network service engine for Linux.
//!
//! Three subsystems compose into protocol-agnostic TCP and UDP services:
//!
//! * an execution substrate: a worker pool, a [`Sender`] dataflow graph,
//!   and [`Strand`] lanes that serialize per-session state without locks;
//! * an io_uring-backed [`IoEngine`] with accept/recv/send and datagram
//!   primitives plus bulk cancellation;
//! * composable protocol pipelines: HTTP parsing and serialization, a
//!   pattern router, middleware chains, and per-connection sessions with
//!   keep-alive request streaming.
//!
//! ```no_run
//! use ravel_core::prelude::*;
//!
//! fn main() -> RavelResult<()> {
//!     init_logging();
//!
//!     let mut router = HttpRouter::new();
//!     router.get("/", |_, _| HttpResponse::ok("Welcome!"));
//!
//!     let factory = HttpPipelineBuilder::new(router)
//!         .with_middleware(logging_middleware())
//!         .build();
//!
//!     let server = TcpServer::new("127.0.0.1:8080".parse()?, factory);
//!     Application::new().add_plugin(server).run()
//! }
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod http;
pub mod io;
pub mod logging;
pub mod net;
pub mod pipeline;
pub mod tcp;
pub mod udp;

// Re-exports for users
pub use app::{Application, Plugin, ShutdownSignal, StopHandle};
pub use config::Config;
pub use context::Context;
pub use error::{RavelError, RavelResult};
pub use exec::{Completion, PoolScheduler, Scheduler, Sender, Strand, WorkerPool, schedule};
pub use http::{
    HttpPipelineBuilder, HttpRequest, HttpResponse, HttpRouter, auth_middleware,
    logging_middleware,
};
pub use io::IoEngine;
pub use logging::{init_logging, init_logging_with_level};
pub use net::{Address, AddressV4, AddressV6, Endpoint};
pub use pipeline::{PipelineFactory, PipelineOutput, RawPipeline, TcpPipeline};
pub use tcp::{TcpServer, TcpSession};
pub use udp::{UdpPacket, UdpRouter, UdpServer};

/// Everything most services need, in one import.
pub mod prelude {
    pub use crate::app::{Application, Plugin, StopHandle};
    pub use crate::config::Config;
    pub use crate::context::Context;
    pub use crate::error::{RavelError, RavelResult};
    pub use crate::exec::{Sender, Strand, WorkerPool, schedule};
    pub use crate::http::{
        HttpPipelineBuilder, HttpRequest, HttpResponse, HttpRouter, auth_middleware,
        logging_middleware,
    };
    pub use crate::logging::{init_logging, init_logging_with_level};
    pub use crate::net::Endpoint;
    pub use crate::pipeline::RawPipeline;
    pub use crate::tcp::TcpServer;
    pub use crate::udp::{UdpRouter, UdpServer};
}
