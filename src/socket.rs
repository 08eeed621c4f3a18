//! Socket offload
//!
//! TCP/UDP sessions ride the modem's internal IP stack through vendor AT
//! commands. Control traffic stays on the line-chat discipline; the binary
//! payload of a receive transfer is delimited by `CONNECT` / EOF-pattern /
//! `OK` markers and parsed by the [`framer`].

pub mod framer;
pub mod offload;
