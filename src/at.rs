//! AT response line matching
//!
//! Splits received lines into prefix-matched commands with comma-separated
//! arguments, and routes unsolicited result codes to their handlers.

pub mod args;
pub mod matcher;
pub mod urc;
