//! Per-instance modem record
//!
//! [`ModemCore`] owns everything one modem instance knows: lifecycle state,
//! configuration, identity, registration status, socket sessions, and the
//! queue of actions the state machine asks the shell to perform. The record
//! is mutated only on the driver's worker context; concurrent readers go
//! through the shell's lock.

use heapless::{Deque, String, Vec};

use super::apn;
use super::band::BandBitmap;
use super::identity::ModemIdentity;
use super::registration::RegistrationStatus;
use crate::chat::scripts::ScriptId;
use crate::config::{identity::APN_SIZE, ACTION_QUEUE_SIZE};
use crate::gpio::{PinPresence, PinRole};
use crate::socket::offload::SocketTable;
use crate::types::{ModemEvent, ModemState, PhoneFunctionality, RatMode, SignalQuality};
use embassy_time::Duration;

/// Side effect requested by the state machine, executed by the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Drive a control pin active or inactive.
    SetPin(PinRole, bool),
    /// Arm the instance timer.
    StartTimer(Duration),
    /// Cancel the instance timer.
    StopTimer,
    /// Open the UART pipe asynchronously.
    OpenUart,
    /// Close the UART pipe.
    CloseUart,
    /// Attach the line-chat layer to the transport.
    AttachChat,
    /// Release the line-chat layer from the transport.
    ReleaseChat,
    /// Run a chat script asynchronously.
    RunScript(ScriptId),
    /// Feed an event back through the queue.
    Delegate(ModemEvent),
    /// Wake anyone blocked waiting for the driver to reach idle.
    NotifySuspended,
    /// Reconfigure the local UART rate.
    SetBaudrate(u32),
}

/// Where the data-session APN comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ApnSource {
    /// Detect from the SIM's ICCID/IMSI via the built-in profile table.
    #[default]
    Auto,
    /// Use a statically configured APN.
    Static(String<APN_SIZE>),
    /// Leave blank; the network assigns one.
    NetworkProvided,
}

/// Static driver configuration for one modem instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModemConfig {
    /// Whether the modem boots on its own once power is applied.
    pub autostart: bool,
    /// Desired radio access technology.
    pub rat: RatMode,
    /// Desired band set, or `None` to leave the modem's current set alone.
    pub bands: Option<BandBitmap>,
    /// APN selection policy.
    pub apn: ApnSource,
    /// Target UART rate, or `None` to keep the modem default.
    pub baud: Option<u32>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            rat: RatMode::CatM1,
            bands: None,
            apn: ApnSource::Auto,
            baud: None,
        }
    }
}

/// The modem instance record.
pub struct ModemCore {
    pub(crate) state: ModemState,
    config: ModemConfig,
    pins: PinPresence,
    /// Identity fields read from the modem each boot.
    pub identity: ModemIdentity,
    /// Network registration tracking.
    pub registration: RegistrationStatus,
    /// Most recent signal quality report.
    pub signal: SignalQuality,
    /// Socket session table.
    pub sockets: SocketTable,
    /// RAT currently configured in the modem, as read back.
    pub actual_rat: Option<RatMode>,
    /// Band set currently configured in the modem, as read back.
    pub actual_bands: Option<BandBitmap>,
    actions: Deque<Action, ACTION_QUEUE_SIZE>,
    pub(crate) init_retries: u8,
    pub(crate) urc_reports_enabled: Option<bool>,
    pub(crate) diag_reboot_armed: bool,
    pub(crate) startup_reported: bool,
    pub(crate) functionality: Option<PhoneFunctionality>,
    pub(crate) pdp_active: bool,
    pub(crate) last_cme_error: Option<i32>,
}

impl ModemCore {
    /// Create an idle instance record.
    #[must_use]
    pub fn new(config: ModemConfig, pins: PinPresence) -> Self {
        Self {
            state: ModemState::Idle,
            config,
            pins,
            identity: ModemIdentity::new(),
            registration: RegistrationStatus::new(),
            signal: SignalQuality::default(),
            sockets: SocketTable::new(),
            actual_rat: None,
            actual_bands: None,
            actions: Deque::new(),
            init_retries: 0,
            urc_reports_enabled: None,
            diag_reboot_armed: false,
            startup_reported: false,
            functionality: None,
            pdp_active: false,
            last_cme_error: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ModemState {
        self.state
    }

    /// Instance configuration.
    #[must_use]
    pub const fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Update the APN selection policy.
    pub fn set_apn_source(&mut self, apn: ApnSource) {
        self.config.apn = apn;
    }

    /// Which control pins the board wires up.
    #[must_use]
    pub const fn pins(&self) -> PinPresence {
        self.pins
    }

    /// Pop the next pending action for the shell.
    pub fn next_action(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }

    /// Drain all pending actions into `out`.
    pub fn drain_actions<const N: usize>(&mut self, out: &mut Vec<Action, N>) {
        while let Some(action) = self.actions.pop_front() {
            if out.push(action).is_err() {
                break;
            }
        }
    }

    /// Number of init-script failures seen since the last success.
    #[must_use]
    pub const fn init_retries(&self) -> u8 {
        self.init_retries
    }

    /// Whether the modem reports boot events (`+KSREP`), if known.
    #[must_use]
    pub const fn urc_reports_enabled(&self) -> Option<bool> {
        self.urc_reports_enabled
    }

    /// Whether a `+KSUP` boot report has been seen since power-on.
    #[must_use]
    pub const fn startup_reported(&self) -> bool {
        self.startup_reported
    }

    /// Phone functionality last reported by the modem, if known.
    #[must_use]
    pub const fn functionality(&self) -> Option<PhoneFunctionality> {
        self.functionality
    }

    /// Whether the PDP context was reported active.
    #[must_use]
    pub const fn pdp_active(&self) -> bool {
        self.pdp_active
    }

    /// The numeric code of the last `+CME ERROR:` seen, if any.
    #[must_use]
    pub const fn last_cme_error(&self) -> Option<i32> {
        self.last_cme_error
    }

    /// Queue an action for the shell. A full queue drops the action; the
    /// queue is sized so that no single transition can overflow it.
    pub(crate) fn push_action(&mut self, action: Action) {
        if self.actions.push_back(action).is_err() {
            warn!("action queue full, dropping {:?}", action);
        }
    }

    /// Resolve the APN to apply and store it in the identity record.
    pub(crate) fn resolve_apn(&mut self) {
        match &self.config.apn {
            ApnSource::Static(apn) => {
                let owned: String<APN_SIZE> = apn.clone();
                self.identity.set_apn(owned.as_bytes());
            }
            ApnSource::Auto => match apn::detect_apn(&self.identity) {
                Some(apn) => self.identity.set_apn(apn.as_bytes()),
                None => self.identity.set_apn(b""),
            },
            ApnSource::NetworkProvided => self.identity.set_apn(b""),
        }
    }

    /// Whether applying the desired RAT/band configuration requires a
    /// modem restart.
    ///
    /// Unknown read-back values are treated as already matching: a restart
    /// is only forced by an observed mismatch.
    #[must_use]
    pub fn rat_change_required(&self) -> bool {
        if let Some(actual) = self.actual_rat {
            if actual != self.config.rat {
                return true;
            }
        }
        if let (Some(desired), Some(actual)) = (self.config.bands, self.actual_bands) {
            if desired != actual {
                return true;
            }
        }
        false
    }
}
