//! Difficulty adjustment module for consensus
//!
//! This module provides blue windows over the DAG and the difficulty and
//! DAA score calculations based on them.

pub mod manager;
pub mod window;

pub use manager::DifficultyManager;
pub use window::{BlockWindow, WindowManager};
