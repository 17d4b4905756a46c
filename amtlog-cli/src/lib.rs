//! amtlog CLI library.
//!
//! Command handlers and output types, exposed for integration testing.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
