//! Core cornertail library: text pipeline, process supervision, config.
//!
//! - `pipeline`: ANSI stripping, word-wrap and the bounded output buffer
//! - `decode`: boundary-aware lossy UTF-8 decoding of pipe reads
//! - `supervisor`: launches the shell command and streams its output
//! - `config`: overlay placement and timing settings
//! - `logging`: tracing subscriber setup
//! - `interrupt`: signal handling for graceful shutdown

pub mod config;
pub mod decode;
pub mod interrupt;
pub mod logging;
pub mod pipeline;
pub mod supervisor;
