//! The per-connection pipeline contract shared by every stream protocol.

use std::sync::Arc;

use crate::context::Context;
use crate::exec::Sender;

/// What a pipeline invocation tells the session to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Bytes to write back, if any.
    pub data: Option<Vec<u8>>,
    /// Whether the connection stays open afterwards.
    pub keep_open: bool,
}

impl PipelineOutput {
    /// Nothing to send yet; keep reading.
    pub fn pending() -> Self {
        Self {
            data: None,
            keep_open: true,
        }
    }

    /// Send bytes, keep the connection alive.
    pub fn reply(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            keep_open: true,
        }
    }

    /// Send bytes, then close.
    pub fn final_reply(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            keep_open: false,
        }
    }
}

/// A per-connection protocol pipeline: bytes in, sender of output back.
///
/// Stream pipelines carry private parse state (hence `&mut self`); a fresh
/// instance is built for every connection by a [`PipelineFactory`].
pub trait TcpPipeline: Send {
    fn call(&mut self, data: &[u8], context: &Arc<Context>) -> Sender<PipelineOutput>;
}

/// Produces one pipeline instance per accepted connection.
pub type PipelineFactory = Box<dyn Fn() -> Box<dyn TcpPipeline> + Send + Sync>;

/// Protocol-less pipeline: every read chunk is handed to a user function
/// and its return is written straight back.
pub struct RawPipeline<F> {
    handler: F,
}

impl<F> RawPipeline<F>
where
    F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<G> RawPipeline<G>
where
    G: Fn(&[u8]) -> Vec<u8> + Clone + Send + Sync + 'static,
{
    /// A factory stamping out raw pipelines around a shared handler.
    pub fn factory(handler: G) -> PipelineFactory {
        Box::new(move || Box::new(RawPipeline::new(handler.clone())))
    }
}

impl<F> TcpPipeline for RawPipeline<F>
where
    F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
{
    fn call(&mut self, data: &[u8], _context: &Arc<Context>) -> Sender<PipelineOutput> {
        let reply = (self.handler)(data);
        if reply.is_empty() {
            Sender::just(PipelineOutput::pending())
        } else {
            Sender::just(PipelineOutput::reply(reply))
        }
    }
}
