//! Socket receive framer
//!
//! During a socket receive the modem interleaves one contiguous binary
//! payload into the same byte stream that otherwise carries AT reply lines:
//! a `CONNECT` line opens binary mode, the EOF pattern closes the payload,
//! and a trailing `OK` line confirms the transfer. The line-chat layer
//! cannot scan arbitrary binary content for its own delimiter, so while a
//! transfer is in flight the chat layer is detached and this framer
//! consumes the stream instead; the two are never attached simultaneously.

use heapless::{Deque, Vec};

use crate::config::{CONNECT_MARKER, EOF_PATTERN, FRAMER_BUFFER_SIZE, LINE_DELIMITER, RX_RING_SIZE};

const CME_ERROR_PREFIX: &[u8] = b"+CME ERROR:";

/// Framing state for one receive transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramerState {
    /// Waiting for the `CONNECT` marker.
    #[default]
    Idle,
    /// Inside the binary payload.
    ConnectMatched,
    /// Payload and trailing `OK` both observed.
    EofOkMatched,
    /// The modem rejected the transfer with `+CME ERROR:`.
    ErrorMatched,
}

/// Transfer progress as seen by the waiting reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramerStatus {
    /// Still collecting.
    Pending,
    /// EOF and `OK` observed; payload is ready in the ring.
    Complete,
    /// The transfer failed; surface as a connection abort.
    Error,
}

/// Byte-by-byte framing parser feeding a bounded payload ring.
pub struct RxFramer {
    state: FramerState,
    buf: Vec<u8, FRAMER_BUFFER_SIZE>,
    payload: Deque<u8, RX_RING_SIZE>,
    expected_len: usize,
    requested: usize,
    collected_len: usize,
    eof_detected: bool,
    ok_detected: bool,
    data_received: bool,
    socket_data_error: bool,
    overruns: u32,
}

impl RxFramer {
    /// Create an idle framer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: FramerState::Idle,
            buf: Vec::new(),
            payload: Deque::new(),
            expected_len: 0,
            requested: 0,
            collected_len: 0,
            eof_detected: false,
            ok_detected: false,
            data_received: false,
            socket_data_error: false,
            overruns: 0,
        }
    }

    /// Reset for a new receive transaction of `requested` bytes.
    pub fn begin(&mut self, requested: usize) {
        self.state = FramerState::Idle;
        self.buf.clear();
        self.payload.clear();
        self.expected_len = requested;
        self.requested = requested;
        self.collected_len = 0;
        self.eof_detected = false;
        self.ok_detected = false;
        self.data_received = false;
        self.socket_data_error = false;
    }

    /// Feed one received byte.
    pub fn feed(&mut self, byte: u8) {
        if self.buf.push(byte).is_err() {
            // Overrun is non-fatal: drop the window and start over. The
            // caller observes a receive timeout and retries.
            self.overruns = self.overruns.wrapping_add(1);
            self.buf.clear();
            return;
        }

        if self.state == FramerState::ConnectMatched && self.expected_len > 0 {
            self.expected_len -= 1;
        }

        let len = self.buf.len();
        if len >= LINE_DELIMITER.len() && self.buf[len - LINE_DELIMITER.len()..] == *LINE_DELIMITER
        {
            self.on_line_end();
            return;
        }

        // A lone delimiter-start byte may be the beginning of a line end;
        // wait for more before judging.
        if self.buf.last() == Some(&LINE_DELIMITER[0]) {
            return;
        }

        match self.state {
            FramerState::Idle => {
                if self.buf.as_slice() == CONNECT_MARKER {
                    self.state = FramerState::ConnectMatched;
                } else if self.buf.starts_with(CME_ERROR_PREFIX) {
                    self.state = FramerState::ErrorMatched;
                    self.socket_data_error = true;
                    self.expected_len = 0;
                }
            }
            FramerState::ConnectMatched => {
                // The trailing confirmation line after the EOF pattern.
                if self.buf.as_slice() == b"OK" {
                    self.ok_detected = true;
                    if self.eof_detected {
                        self.state = FramerState::EofOkMatched;
                    }
                }
            }
            FramerState::EofOkMatched | FramerState::ErrorMatched => {}
        }
    }

    /// Feed a received chunk.
    pub fn feed_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.feed(byte);
        }
    }

    fn on_line_end(&mut self) {
        let delim_len = LINE_DELIMITER.len();
        let len = self.buf.len();

        // A bare delimiter is a blank line.
        if len == delim_len {
            self.buf.clear();
            return;
        }

        if self.state == FramerState::ConnectMatched {
            // The opening marker line itself is not payload.
            if len == CONNECT_MARKER.len() + delim_len
                && self.buf[..len - delim_len] == *CONNECT_MARKER
            {
                self.buf.clear();
                return;
            }

            // The EOF pattern sits immediately before the trailing
            // delimiter; everything before it is payload.
            if len >= EOF_PATTERN.len() + delim_len {
                let eof_start = len - delim_len - EOF_PATTERN.len();
                if self.buf[eof_start..len - delim_len] == *EOF_PATTERN {
                    if eof_start == 0 {
                        // EOF with no payload at all: the requested data
                        // never arrived.
                        self.socket_data_error = true;
                    }
                    for index in 0..eof_start {
                        if self.payload.push_back(self.buf[index]).is_err() {
                            self.socket_data_error = true;
                            break;
                        }
                    }
                    self.collected_len += eof_start;
                    self.eof_detected = true;
                    self.data_received = true;
                    self.buf.clear();
                    return;
                }
            }

            // Mid-payload binary data that happens to contain the
            // delimiter bytes; keep accumulating.
            return;
        }

        // A completed line outside a payload transfer carries nothing for
        // the framer.
        self.buf.clear();
    }

    /// Transfer progress.
    #[must_use]
    pub fn status(&self) -> FramerStatus {
        if self.socket_data_error || self.state == FramerState::ErrorMatched {
            FramerStatus::Error
        } else if self.eof_detected && self.ok_detected && self.data_received {
            FramerStatus::Complete
        } else {
            FramerStatus::Pending
        }
    }

    /// Move collected payload into `out`, returning the byte count.
    pub fn take(&mut self, out: &mut [u8]) -> usize {
        let mut count = 0;
        while count < out.len() {
            match self.payload.pop_front() {
                Some(byte) => {
                    out[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Current framing state.
    #[must_use]
    pub const fn state(&self) -> FramerState {
        self.state
    }

    /// Whether the EOF pattern has been observed.
    #[must_use]
    pub const fn eof_detected(&self) -> bool {
        self.eof_detected
    }

    /// Whether the trailing `OK` has been observed.
    #[must_use]
    pub const fn ok_detected(&self) -> bool {
        self.ok_detected
    }

    /// Whether payload bytes have been pushed to the ring.
    #[must_use]
    pub const fn data_received(&self) -> bool {
        self.data_received
    }

    /// Whether the transfer failed.
    #[must_use]
    pub const fn socket_data_error(&self) -> bool {
        self.socket_data_error
    }

    /// Payload bytes collected so far.
    #[must_use]
    pub const fn collected_len(&self) -> usize {
        self.collected_len
    }

    /// Remaining expected payload byte count.
    #[must_use]
    pub const fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Bytes requested for this transaction.
    #[must_use]
    pub const fn requested(&self) -> usize {
        self.requested
    }

    /// Payload bytes currently in the ring.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Accumulation-buffer overruns since creation.
    #[must_use]
    pub const fn overruns(&self) -> u32 {
        self.overruns
    }
}

impl Default for RxFramer {
    fn default() -> Self {
        Self::new()
    }
}
