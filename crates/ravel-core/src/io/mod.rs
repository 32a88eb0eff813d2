//! Kernel-polling I/O engine.

pub mod engine;

pub use engine::IoEngine;
