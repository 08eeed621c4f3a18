//! Driver configuration and constants
//!
//! This module defines compile-time constants for the HL78xx driver.
//! Wire-protocol literals, buffer capacities, and timing parameters are
//! centralized here.

/// Line delimiter used by the modem's command interface.
pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// Escape sequence leaving transparent (binary) data mode.
pub const DATA_MODE_ESCAPE: &[u8] = b"+++";

/// Literal opening a binary socket payload.
pub const CONNECT_MARKER: &[u8] = b"CONNECT";

/// End-of-data pattern closing a binary socket payload.
///
/// This is the modem's factory default; it can be changed with `AT+KPATTERN`
/// but this driver keeps the default.
pub const EOF_PATTERN: &[u8] = b"--EOF--Pattern--";

/// Maximum length of a single received response line.
pub const LINE_BUFFER_SIZE: usize = 128;

/// Receive accumulation window for line splitting (two full lines).
pub const RX_ACCUM_SIZE: usize = LINE_BUFFER_SIZE * 2;

/// Capacity of the pending-event ring buffer.
pub const EVENT_QUEUE_SIZE: usize = 16;

/// Maximum arguments split out of one response line.
pub const MAX_RESPONSE_ARGS: usize = 12;

/// Capacity of the state machine's action queue.
pub const ACTION_QUEUE_SIZE: usize = 8;

/// Accumulation buffer capacity of the socket payload framer.
pub const FRAMER_BUFFER_SIZE: usize = 256;

/// Socket receive payload ring capacity.
pub const RX_RING_SIZE: usize = 1024;

/// Largest payload chunk accepted for a single socket send.
pub const SOCKET_CHUNK_SIZE: usize = 512;

/// Maximum concurrently tracked socket sessions.
pub const MAX_SOCKETS: usize = 6;

/// Maximum length of a composed AT request.
pub const MAX_REQUEST_LEN: usize = 128;

/// Consecutive init-script failures tolerated before the driver parks in
/// `Idle` and waits for an external reset or power action.
pub const MAX_SCRIPT_AT_CMD_RETRY: u8 = 3;

/// Bytes in the band-configuration bitmap.
pub const BAND_BITMAP_LEN: usize = 32;

/// Capacity of the trimmed band-bitmap hex string (two digits per byte).
pub const BAND_HEX_STR_LEN: usize = BAND_BITMAP_LEN * 2;

/// Identity field capacities
pub mod identity {
    //! Fixed capacities for modem identity strings.

    /// IMEI digits (15) plus slack for a check digit.
    pub const IMEI_SIZE: usize = 16;

    /// Model identifier, e.g. `HL7800`.
    pub const MODEL_SIZE: usize = 16;

    /// IMSI digits (up to 15).
    pub const IMSI_SIZE: usize = 16;

    /// ICCID digits (up to 20, plus slack).
    pub const ICCID_SIZE: usize = 22;

    /// Manufacturer string.
    pub const MANUFACTURER_SIZE: usize = 16;

    /// Firmware revision string.
    pub const REVISION_SIZE: usize = 32;

    /// Network operator name.
    pub const OPERATOR_SIZE: usize = 32;

    /// Access point name.
    pub const APN_SIZE: usize = 64;
}

/// Timing parameters
pub mod timing {
    //! GPIO pulse widths, boot/shutdown settle times, and poll periods.

    use embassy_time::Duration;

    /// Reset pin assertion time.
    pub const RESET_PULSE: Duration = Duration::from_millis(50);

    /// Power-on pin assertion time.
    pub const POWER_ON_PULSE: Duration = Duration::from_millis(1500);

    /// Power pin assertion time for a power-off request.
    pub const POWER_OFF_PULSE: Duration = Duration::from_secs(3);

    /// Boot time from power applied to AT-command readiness.
    pub const STARTUP: Duration = Duration::from_secs(10);

    /// Graceful shutdown settle time.
    pub const SHUTDOWN: Duration = Duration::from_secs(10);

    /// Settle time for a restart triggered by an airplane-mode RAT/band
    /// change (shutdown plus startup).
    pub const AIRPLANE_RESTART: Duration = Duration::from_secs(20);

    /// Interface status poll period while the carrier is up.
    pub const IFACE_POLL: Duration = Duration::from_secs(2);

    /// Socket drain poll period when no sockets remain open.
    pub const SOCKET_POLL_IDLE: Duration = Duration::from_millis(100);

    /// Socket drain poll period while sockets remain open.
    pub const SOCKET_POLL_BUSY: Duration = Duration::from_secs(5);

    /// Registration re-query period while waiting for the network.
    pub const REGISTRATION_POLL: Duration = Duration::from_secs(30);

    /// Default per-step chat response timeout.
    pub const DEFAULT_RESPONSE: Duration = Duration::from_secs(5);

    /// Timeout for commands the modem answers slowly (context activation,
    /// detach).
    pub const SLOW_RESPONSE: Duration = Duration::from_secs(30);

    /// Overall budget for one script run.
    pub const SCRIPT_BUDGET: Duration = Duration::from_secs(60);

    /// Timeout for one socket data transfer.
    pub const SOCKET_TRANSFER: Duration = Duration::from_secs(30);

    /// Upper bound a suspend caller waits for the driver to reach idle.
    pub const SUSPEND_WAIT: Duration = Duration::from_secs(30);
}
