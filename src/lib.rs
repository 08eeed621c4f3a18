//! HL78xx Cellular Modem Driver
//!
//! This library provides a transport-agnostic driver for the Sierra Wireless
//! HL78xx family of LTE-M/NB-IoT modems. It powers the modem up and down
//! through GPIO sequencing, negotiates firmware initialization over textual
//! AT commands, tracks network registration, and exposes a socket-offload
//! layer on top of a byte-oriented UART transport.
//!
//! # Architecture
//!
//! The driver is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CONTROL SURFACE                           │
//! │  Identity/Signal Queries │ Socket Offload │ Suspend/Resume   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    PROTOCOL ENGINE                           │
//! │  Chat Scripts │ Response Matcher │ URC Dispatch │ Framer     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    LIFECYCLE CORE                            │
//! │  Modem State Machine │ Event Queue │ Registration Tracking   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    TRANSPORT / HAL                           │
//! │  embedded-io UART │ embedded-hal GPIO │ embassy timers       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Functional core, imperative shell**: the state machines (lifecycle,
//!   chat, framing) are pure synchronous logic, host-testable without
//!   hardware; the async [`driver`] shell performs all I/O.
//! - **Type-driven design**: states, events, and script outcomes are closed
//!   enums dispatched exhaustively.
//! - **No unsafe code**: fixed-capacity `heapless` buffers throughout.
//! - **Explicit error handling**: all fallible operations return `Result`.
//!
//! The modem UART, control pins, and executor are supplied by the integrator
//! through `embedded-io-async` / `embedded-hal` traits; no chip-specific
//! code lives in this crate.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

/// AT response line matching
///
/// Prefix-based command/response matching, argument extraction, and the
/// unsolicited-result-code dispatch table.
pub mod at;

/// Chat script engine
///
/// Ordered request/expected-response sequences with per-step timeouts and
/// script-wide abort patterns.
pub mod chat;

/// System configuration and constants
pub mod config;

/// Async driver shell
///
/// The imperative shell: UART pump, timer arming, GPIO sequencing, and the
/// public control API.
pub mod driver;

/// Event queue and dispatcher
pub mod event;

/// Modem control pins
pub mod gpio;

/// Modem lifecycle core
///
/// The state machine and the per-instance record it mutates: identity,
/// registration status, APN and band configuration.
pub mod modem;

/// Socket offload
///
/// TCP/UDP sessions mapped onto vendor AT commands, and the binary payload
/// framer for socket receive transfers.
pub mod socket;

/// UART line transport
pub mod transport;

/// Shared types used across modules
pub mod types;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::chat::script::{ChatScript, ChatStep, ScriptResult};
    pub use crate::driver::{ModemControl, ModemRunner, ModemShared};
    pub use crate::event::EventBus;
    pub use crate::gpio::{ModemPins, PinRole};
    pub use crate::modem::core::{ApnSource, ModemConfig, ModemCore};
    pub use crate::transport::ModemUart;
    pub use crate::types::{
        ModemError, ModemEvent, ModemState, PhoneFunctionality, RatMode, RegistrationState,
        SignalQuality,
    };

    // Common traits
    pub use embedded_hal::digital::OutputPin;
    pub use embedded_io_async::{Read, Write};

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};
}
