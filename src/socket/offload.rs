//! Socket session table and command builders
//!
//! Sessions are identified by the modem-assigned session id returned from
//! `AT+KTCPCFG` / `AT+KUDPCFG`. The table tracks connection state and the
//! pending-data accounting fed by `+KTCP_DATA:` / `+KUDP_DATA:` reports;
//! the builders render the vendor AT commands for each operation.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::config::{MAX_REQUEST_LEN, MAX_SOCKETS};
use crate::types::ModemError;

/// Transport protocol of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketProtocol {
    /// TCP over `AT+KTCP*`.
    Tcp,
    /// UDP over `AT+KUDP*`.
    Udp,
}

/// Connection state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Configured in the modem but not connected.
    Configured,
    /// Connected (TCP) or ready to exchange datagrams (UDP).
    Connected,
}

/// Remote endpoint host-name capacity.
pub const HOST_SIZE: usize = 48;

/// One offloaded socket session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketSession {
    /// Modem-assigned session id.
    pub id: u8,
    /// Transport protocol.
    pub protocol: SocketProtocol,
    /// Connection state.
    pub state: SessionState,
    /// Remote host, kept for UDP sends.
    pub host: String<HOST_SIZE>,
    /// Remote port.
    pub port: u16,
    /// Bytes the modem announced as pending.
    pub pending_bytes: u32,
    /// Data announcements not yet consumed by a receive.
    pub pending_packets: u8,
    /// Last `+KTCP_NOTIF` cause, if any.
    pub notif: Option<i32>,
}

/// Fixed-capacity session table owned by the instance record.
#[derive(Debug, Default)]
pub struct SocketTable {
    sessions: Vec<SocketSession, MAX_SOCKETS>,
}

impl SocketTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sessions: Vec::new(),
        }
    }

    /// Register a session the modem just configured.
    pub fn insert(
        &mut self,
        id: u8,
        protocol: SocketProtocol,
        host: &str,
        port: u16,
    ) -> Result<(), ModemError> {
        if self.by_id(i32::from(id)).is_some() {
            return Err(ModemError::InvalidArgument);
        }
        let mut session = SocketSession {
            id,
            protocol,
            state: SessionState::Configured,
            host: String::new(),
            port,
            pending_bytes: 0,
            pending_packets: 0,
            notif: None,
        };
        if session.host.push_str(host).is_err() {
            return Err(ModemError::InvalidArgument);
        }
        self.sessions
            .push(session)
            .map_err(|_| ModemError::NoFreeSocket)
    }

    /// Look a session up by modem id.
    #[must_use]
    pub fn by_id(&self, id: i32) -> Option<&SocketSession> {
        self.sessions.iter().find(|s| i32::from(s.id) == id)
    }

    /// Mutable session lookup.
    pub fn by_id_mut(&mut self, id: i32) -> Option<&mut SocketSession> {
        self.sessions.iter_mut().find(|s| i32::from(s.id) == id)
    }

    /// Remove a closed session.
    pub fn remove(&mut self, id: u8) {
        if let Some(index) = self.sessions.iter().position(|s| s.id == id) {
            let _ = self.sessions.swap_remove(index);
        }
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.sessions.len()
    }

    /// Record a data announcement. Returns `true` when it applied to a
    /// known session.
    pub fn data_announced(&mut self, id: i32, bytes: i32) -> bool {
        let Some(session) = self.by_id_mut(id) else {
            return false;
        };
        if bytes < 0 {
            return false;
        }
        session.pending_bytes = session.pending_bytes.saturating_add(bytes as u32);
        session.pending_packets = session.pending_packets.saturating_add(1);
        true
    }

    /// Consume pending accounting after a completed receive.
    pub fn consume_pending(&mut self, id: i32, bytes: usize) {
        if let Some(session) = self.by_id_mut(id) {
            session.pending_bytes = session.pending_bytes.saturating_sub(bytes as u32);
            session.pending_packets = session.pending_packets.saturating_sub(1);
        }
    }

    /// Record a session fault report.
    pub fn notify(&mut self, id: i32, cause: i32) {
        if let Some(session) = self.by_id_mut(id) {
            session.notif = Some(cause);
        }
    }

    /// Drop every session (modem power-down).
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

/// Render the session-configuration command.
pub fn config_command(
    protocol: SocketProtocol,
    host: &str,
    port: u16,
) -> Result<String<MAX_REQUEST_LEN>, ModemError> {
    let mut cmd: String<MAX_REQUEST_LEN> = String::new();
    let result = match protocol {
        SocketProtocol::Tcp => write!(cmd, "AT+KTCPCFG=1,0,\"{host}\",{port}"),
        SocketProtocol::Udp => write!(cmd, "AT+KUDPCFG=1,0"),
    };
    result.map_err(|_| ModemError::InvalidArgument)?;
    Ok(cmd)
}

/// Response prefix announcing the configured session id.
#[must_use]
pub const fn config_response_prefix(protocol: SocketProtocol) -> &'static [u8] {
    match protocol {
        SocketProtocol::Tcp => b"+KTCPCFG:",
        SocketProtocol::Udp => b"+KUDPCFG:",
    }
}

/// Render the TCP connect command. UDP sessions have no connect phase.
pub fn connect_command(session: &SocketSession) -> Result<String<MAX_REQUEST_LEN>, ModemError> {
    match session.protocol {
        SocketProtocol::Tcp => {
            let mut cmd: String<MAX_REQUEST_LEN> = String::new();
            write!(cmd, "AT+KTCPCNX={}", session.id).map_err(|_| ModemError::InvalidArgument)?;
            Ok(cmd)
        }
        SocketProtocol::Udp => Err(ModemError::InvalidArgument),
    }
}

/// Render the send command for `len` payload bytes.
pub fn send_command(
    session: &SocketSession,
    len: usize,
) -> Result<String<MAX_REQUEST_LEN>, ModemError> {
    let mut cmd: String<MAX_REQUEST_LEN> = String::new();
    let result = match session.protocol {
        SocketProtocol::Tcp => write!(cmd, "AT+KTCPSND={},{len}", session.id),
        SocketProtocol::Udp => write!(
            cmd,
            "AT+KUDPSND={},\"{}\",{},{len}",
            session.id, session.host, session.port
        ),
    };
    result.map_err(|_| ModemError::InvalidArgument)?;
    Ok(cmd)
}

/// Render the receive command for up to `len` bytes.
pub fn recv_command(
    session: &SocketSession,
    len: usize,
) -> Result<String<MAX_REQUEST_LEN>, ModemError> {
    let mut cmd: String<MAX_REQUEST_LEN> = String::new();
    let result = match session.protocol {
        SocketProtocol::Tcp => write!(cmd, "AT+KTCPRCV={},{len}", session.id),
        SocketProtocol::Udp => write!(cmd, "AT+KUDPRCV={},{len}", session.id),
    };
    result.map_err(|_| ModemError::InvalidArgument)?;
    Ok(cmd)
}

/// Render the close command.
pub fn close_command(session: &SocketSession) -> Result<String<MAX_REQUEST_LEN>, ModemError> {
    let mut cmd: String<MAX_REQUEST_LEN> = String::new();
    let result = match session.protocol {
        SocketProtocol::Tcp => write!(cmd, "AT+KTCPCLOSE={},1", session.id),
        SocketProtocol::Udp => write!(cmd, "AT+KUDPCLOSE={}", session.id),
    };
    result.map_err(|_| ModemError::InvalidArgument)?;
    Ok(cmd)
}

/// Render the session-delete command freeing the modem-side config slot.
pub fn delete_command(session: &SocketSession) -> Result<String<MAX_REQUEST_LEN>, ModemError> {
    let mut cmd: String<MAX_REQUEST_LEN> = String::new();
    let result = match session.protocol {
        SocketProtocol::Tcp => write!(cmd, "AT+KTCPDEL={}", session.id),
        SocketProtocol::Udp => write!(cmd, "AT+KUDPDEL={}", session.id),
    };
    result.map_err(|_| ModemError::InvalidArgument)?;
    Ok(cmd)
}
