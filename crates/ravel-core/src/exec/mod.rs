//! Execution substrate: worker pool, sender graph, strands.

pub mod pool;
pub mod sender;
pub mod strand;

pub use pool::{PoolScheduler, Scheduler, Task, WorkerPool};
pub use sender::{Completion, Sender, schedule};
pub use strand::Strand;
