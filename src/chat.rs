//! Chat script engine
//!
//! A chat script is an ordered list of request/expected-response steps run
//! against the line-oriented transport. The [`runner`] executes one script
//! at a time; [`scripts`] defines the HL78xx command sequences.

pub mod runner;
pub mod script;
pub mod scripts;
