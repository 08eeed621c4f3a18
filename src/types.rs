//! Shared types used across the driver
//!
//! This module defines the lifecycle state and event vocabulary, network
//! registration and radio-technology types, and the driver error enum.

/// Modem lifecycle state
///
/// Exactly one state is current at any time. Transitions happen only through
/// [`ModemCore::enter_state`](crate::modem::core::ModemCore::enter_state);
/// the field is never written directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemState {
    /// Powered down, UART closed, no script activity.
    #[default]
    Idle,
    /// Driving the reset pin active for its configured pulse width.
    ResetPulse,
    /// Driving the power-on pin active for its configured pulse width.
    PowerOnPulse,
    /// Waiting out the modem's boot time before talking to it.
    AwaitPowerOn,
    /// Applying a non-default UART rate before initialization.
    SetBaudrate,
    /// Running the firmware initialization script.
    RunInitScript,
    /// Probing boot-report configuration after an init failure.
    RunInitFailDiagnosticScript,
    /// Comparing and applying RAT/band configuration.
    RunRatConfigScript,
    /// Applying APN and phone functionality to bring data service up.
    RunEnableGprsScript,
    /// Attached but not yet registered with a network.
    AwaitRegistered,
    /// Registered; data service available.
    CarrierOn,
    /// Deregistered while up; waiting for sockets to drain.
    CarrierOff,
    /// SIM powered down via functionality level.
    SimPowerOff,
    /// Radio disabled (airplane mode).
    Airplane,
    /// Running the graceful power-off script.
    InitPowerOff,
    /// Driving the power pin for the power-off pulse.
    PowerOffPulse,
    /// Waiting out the shutdown settle time.
    AwaitPowerOff,
}

impl ModemState {
    /// Check whether the UART pipe is expected to be open in this state.
    #[must_use]
    pub const fn uart_active(self) -> bool {
        !matches!(
            self,
            Self::Idle
                | Self::ResetPulse
                | Self::PowerOnPulse
                | Self::AwaitPowerOn
                | Self::PowerOffPulse
                | Self::AwaitPowerOff
        )
    }

    /// Check whether data service is nominally available.
    #[must_use]
    pub const fn is_carrier_on(self) -> bool {
        matches!(self, Self::CarrierOn)
    }
}

/// Modem lifecycle event
///
/// Events are byte-sized tags queued FIFO; duplicates are legal and handled
/// independently. Most are level-triggered retriggerable signals, so bounded
/// loss under queue pressure is tolerable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemEvent {
    /// Bring the modem up (power-management resume or initial start).
    Resume,
    /// Take the modem down gracefully.
    Suspend,
    /// The in-flight script finished successfully.
    ScriptSuccess,
    /// The in-flight script aborted or failed.
    ScriptFailed,
    /// The in-flight script requires a modem restart to take effect.
    ScriptRequireRestart,
    /// The instance timer fired (also carries script timeouts).
    Timeout,
    /// Network registration gained.
    Registered,
    /// Network registration lost.
    Deregistered,
    /// The UART pipe finished opening.
    BusOpened,
    /// The UART pipe closed or faulted.
    BusClosed,
    /// A socket session has data pending.
    SocketReady,
}

/// Radio access technology
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RatMode {
    /// LTE-M (CAT-M1)
    #[default]
    CatM1,
    /// NB-IoT
    NbIot,
    /// GSM fallback
    Gsm,
}

impl RatMode {
    /// Value used by `AT+KSRAT`.
    #[must_use]
    pub const fn as_at(self) -> u8 {
        match self {
            Self::CatM1 => 0,
            Self::NbIot => 1,
            Self::Gsm => 2,
        }
    }

    /// Parse a `+KSRAT:` value.
    #[must_use]
    pub const fn from_at(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::CatM1),
            1 => Some(Self::NbIot),
            2 => Some(Self::Gsm),
            _ => None,
        }
    }

    /// Map a `+CEREG` access-technology field.
    #[must_use]
    pub const fn from_act(value: i32) -> Option<Self> {
        match value {
            0 | 3 => Some(Self::Gsm),
            7 => Some(Self::CatM1),
            9 => Some(Self::NbIot),
            _ => None,
        }
    }
}

/// Network registration state, as reported by `+CREG:` / `+CEREG:`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationState {
    /// Not registered, not searching.
    #[default]
    NotRegistered,
    /// Registered on the home network.
    RegisteredHome,
    /// Not registered, searching.
    Searching,
    /// Registration denied.
    Denied,
    /// Out of coverage.
    OutOfCoverage,
    /// Registered roaming.
    RegisteredRoaming,
    /// Emergency services only.
    EmergencyOnly,
    /// Unrecognized value.
    Unknown,
}

impl RegistrationState {
    /// Parse a `<stat>` field.
    #[must_use]
    pub const fn from_at(value: i32) -> Self {
        match value {
            0 => Self::NotRegistered,
            1 => Self::RegisteredHome,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::OutOfCoverage,
            5 => Self::RegisteredRoaming,
            8 => Self::EmergencyOnly,
            _ => Self::Unknown,
        }
    }

    /// Check whether this state counts as registered (home or roaming).
    #[must_use]
    pub const fn is_registered(self) -> bool {
        matches!(self, Self::RegisteredHome | Self::RegisteredRoaming)
    }
}

/// Phone functionality level (`AT+CFUN`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhoneFunctionality {
    /// Minimum functionality; SIM powered down.
    Minimum,
    /// Full functionality.
    #[default]
    Full,
    /// Radio disabled (airplane mode).
    Airplane,
}

impl PhoneFunctionality {
    /// Value used by `AT+CFUN`.
    #[must_use]
    pub const fn as_at(self) -> u8 {
        match self {
            Self::Minimum => 0,
            Self::Full => 1,
            Self::Airplane => 4,
        }
    }

    /// Parse a `+CFUN:` value.
    #[must_use]
    pub const fn from_at(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Minimum),
            1 => Some(Self::Full),
            4 => Some(Self::Airplane),
            _ => None,
        }
    }
}

/// Signal quality snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    /// Received signal strength in dBm, if known.
    pub rssi_dbm: Option<i16>,
    /// Reference signal received power in dBm, if known.
    pub rsrp_dbm: Option<i16>,
    /// Reference signal received quality in tenths of a dB, if known.
    pub rsrq_tenths_db: Option<i16>,
}

impl SignalQuality {
    /// Convert a `+CSQ` RSSI index (0-31, 99 = unknown) to dBm.
    #[must_use]
    pub const fn rssi_from_csq(index: i32) -> Option<i16> {
        if index >= 0 && index <= 31 {
            Some(-113 + 2 * index as i16)
        } else {
            None
        }
    }

    /// Convert a `+CESQ` RSRP index (0-97, 255 = invalid) to dBm.
    #[must_use]
    pub const fn rsrp_from_cesq(index: i32) -> Option<i16> {
        if index >= 0 && index <= 97 {
            Some(-140 + index as i16)
        } else {
            None
        }
    }

    /// Convert a `+CESQ` RSRQ index (0-34, 255 = invalid) to tenths of a dB.
    #[must_use]
    pub const fn rsrq_from_cesq(index: i32) -> Option<i16> {
        if index >= 0 && index <= 34 {
            Some(-195 + 5 * index as i16)
        } else {
            None
        }
    }
}

/// Driver error
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemError {
    /// The UART transport failed to open, close, read, or write.
    #[error("transport failure")]
    Transport,
    /// A command was answered with `ERROR` or `+CME ERROR:`.
    #[error("command aborted by error response")]
    CommandAborted,
    /// A command or script ran out of time.
    #[error("command timed out")]
    CommandTimeout,
    /// The modem is not in a state that can service the request.
    #[error("modem not ready")]
    NotReady,
    /// A caller-supplied argument could not be encoded.
    #[error("invalid argument")]
    InvalidArgument,
    /// No free socket session is available.
    #[error("no free socket session")]
    NoFreeSocket,
    /// An unknown socket session was referenced.
    #[error("no such socket session")]
    NoSuchSocket,
    /// The socket transfer was aborted by the modem.
    #[error("socket connection aborted")]
    ConnectionAborted,
    /// A fixed-capacity buffer would overflow.
    #[error("buffer capacity exceeded")]
    Overflow,
    /// A control pin could not be driven.
    #[error("gpio failure")]
    Gpio,
}
