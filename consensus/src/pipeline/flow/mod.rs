//! Processing flow for block pipeline
//!
//! This module provides the worker pool blocks are submitted to and the
//! per-block validation flow used for stage tracking and rejection logs.

pub mod process_queue;
pub mod validation_flow;

pub use process_queue::{ProcessQueue, WorkerExit};
pub use validation_flow::{ValidationFlow, ValidationStage};
