//! UART line transport
//!
//! The modem UART is supplied by the integrator through
//! `embedded-io-async` plus the [`ModemUart`] lifecycle hooks. Received
//! bytes are accumulated in a [`LineBuffer`] and split on the full `\r\n`
//! delimiter while the chat layer owns the transport; during a socket data
//! transfer ownership is explicitly handed to the framer instead, and the
//! two are never attached at the same time.

use embedded_io_async::{Read, Write};
use heapless::Vec;

use crate::config::{LINE_BUFFER_SIZE, LINE_DELIMITER, RX_ACCUM_SIZE};
use crate::types::ModemError;

/// Byte transport to the modem.
///
/// `open`/`close` bracket the modem's powered window; `set_baudrate`
/// retunes the local UART after the modem accepted a new rate.
#[allow(async_fn_in_trait)]
pub trait ModemUart: Read + Write {
    /// Open the pipe. Opening an already-open pipe must succeed.
    async fn open(&mut self) -> Result<(), ModemError>;

    /// Close the pipe.
    async fn close(&mut self) -> Result<(), ModemError>;

    /// Reconfigure the local UART rate.
    async fn set_baudrate(&mut self, baud: u32) -> Result<(), ModemError> {
        let _ = baud;
        Ok(())
    }
}

/// Which layer currently consumes received bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportOwner {
    /// Nobody listens; bytes are dropped.
    #[default]
    Detached,
    /// The line-chat layer splits lines.
    Chat,
    /// The socket framer scans the raw stream.
    Framer,
}

/// Received-byte accumulator with `\r\n` line splitting.
pub struct LineBuffer {
    buffer: [u8; RX_ACCUM_SIZE],
    read_pos: usize,
    write_pos: usize,
}

impl LineBuffer {
    /// Create an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; RX_ACCUM_SIZE],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Append received bytes, returning how many fit.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let mut written = 0;
        for &byte in data {
            if self.write_pos < RX_ACCUM_SIZE {
                self.buffer[self.write_pos] = byte;
                self.write_pos += 1;
                written += 1;
            }
        }
        written
    }

    /// Extract the next complete, non-empty line (delimiter stripped).
    ///
    /// An overlong line that fills the whole accumulator without a
    /// delimiter is dropped; the modem never sends lines this long, so the
    /// bytes are treated as noise.
    pub fn next_line(&mut self) -> Option<Vec<u8, LINE_BUFFER_SIZE>> {
        loop {
            let window = &self.buffer[self.read_pos..self.write_pos];
            let end = window
                .windows(LINE_DELIMITER.len())
                .position(|w| w == LINE_DELIMITER);

            match end {
                Some(0) => {
                    // Blank line.
                    self.read_pos += LINE_DELIMITER.len();
                    self.compact();
                }
                Some(pos) => {
                    let mut line = Vec::new();
                    for &byte in &window[..pos.min(LINE_BUFFER_SIZE)] {
                        let _ = line.push(byte);
                    }
                    self.read_pos += pos + LINE_DELIMITER.len();
                    self.compact();
                    return Some(line);
                }
                None => {
                    if self.write_pos == RX_ACCUM_SIZE && self.read_pos == 0 {
                        self.clear();
                    }
                    return None;
                }
            }
        }
    }

    /// Bytes waiting in the accumulator.
    #[must_use]
    pub const fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    fn compact(&mut self) {
        if self.read_pos >= RX_ACCUM_SIZE / 2 {
            let remaining = self.write_pos - self.read_pos;
            self.buffer.copy_within(self.read_pos..self.write_pos, 0);
            self.read_pos = 0;
            self.write_pos = remaining;
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
