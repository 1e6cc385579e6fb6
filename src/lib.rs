//! Audiogram visualization engine: signal sampling, the per-tick session
//! state machine, and the preview and export commands built on it.

pub mod audio;
pub mod cli;
pub mod config;
pub mod encode;
pub mod engine;
pub mod export;
pub mod preview;
pub mod render;
pub mod scheduler;
pub mod setup;
