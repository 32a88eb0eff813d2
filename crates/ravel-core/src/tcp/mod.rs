//! TCP server and per-connection sessions.

pub mod server;
pub mod session;

pub use server::TcpServer;
pub use session::TcpSession;
