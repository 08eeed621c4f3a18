//! HL78xx command sequences
//!
//! The named scripts the state machine runs, plus the response handlers
//! that populate the instance record. Scripts whose requests depend on
//! runtime state (RAT/band values, the APN, the UART rate) have no static
//! body; the shell composes them from the instance record.

use embassy_time::Duration;

use super::script::{ChatScript, ChatStep};
use crate::at::args::AtArgs;
use crate::at::matcher::Match;
use crate::at::urc;
use crate::config::timing;
use crate::modem::core::ModemCore;
use crate::types::RatMode;

/// Identifies a script the state machine can ask the shell to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScriptId {
    /// Firmware initialization and identity read-out.
    Init,
    /// Boot-report (`+KSREP`) probe after an init failure.
    Diagnostic,
    /// Enable boot reporting.
    EnableUrc,
    /// Apply RAT and band configuration (composed by the shell).
    RatConfig,
    /// Apply APN and bring data service up (composed by the shell).
    EnableGprs,
    /// Re-query network registration.
    RegistrationCheck,
    /// Query PDP context and DNS assignment.
    IfaceStatus,
    /// Graceful power-off (detach, then `AT+CPOF`).
    PowerOff,
    /// Enter airplane mode.
    Airplane,
    /// Power the SIM down.
    SimPowerOff,
    /// Apply the configured UART rate (composed by the shell).
    SetBaud,
}

impl ScriptId {
    /// The static script body, or `None` when the shell composes the
    /// requests from runtime state.
    #[must_use]
    pub fn chat(self) -> Option<&'static ChatScript<ModemCore>> {
        match self {
            Self::Init => Some(&INIT_SCRIPT),
            Self::Diagnostic => Some(&DIAGNOSTIC_SCRIPT),
            Self::EnableUrc => Some(&ENABLE_URC_SCRIPT),
            Self::RegistrationCheck => Some(&REGISTRATION_CHECK_SCRIPT),
            Self::IfaceStatus => Some(&IFACE_STATUS_SCRIPT),
            Self::PowerOff => Some(&POWER_OFF_SCRIPT),
            Self::Airplane => Some(&AIRPLANE_SCRIPT),
            Self::SimPowerOff => Some(&SIM_POWER_OFF_SCRIPT),
            Self::RatConfig | Self::EnableGprs | Self::SetBaud => None,
        }
    }
}

/// Abort patterns shared by every script and dynamic command.
pub const ABORT_MATCHES: &[Match<ModemCore>] = &[
    Match::response(b"ERROR"),
    Match::bound(b"+CME ERROR:", on_cme_error),
];

const OK_ONLY: &[Match<ModemCore>] = &[Match::response(b"OK")];
const RESPONSE: Duration = timing::DEFAULT_RESPONSE;

static INIT_STEPS: [ChatStep<ModemCore>; 20] = [
    ChatStep::new(b"ATE0", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CMEE=1", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CGSN", &[Match::any(on_imei)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CGMI", &[Match::any(on_manufacturer)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CGMM", &[Match::any(on_model)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CGMR", &[Match::any(on_revision)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CIMI", &[Match::any(on_imsi)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CCID", &[Match::bound(b"+CCID:", on_iccid)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+KSRAT?", &[Match::bound(b"+KSRAT:", on_ksrat)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(
        b"AT+KBNDCFG?",
        &[Match::bound(b"+KBNDCFG:", urc::on_kbndcfg)],
        RESPONSE,
    ),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CREG=1", OK_ONLY, RESPONSE),
    ChatStep::new(b"AT+CEREG=4", OK_ONLY, RESPONSE),
];

/// Firmware initialization: echo off, identity read-out, registration URC
/// subscription. Identity is re-read on every boot; nothing is cached
/// across power cycles.
pub static INIT_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "init",
    &INIT_STEPS,
    ABORT_MATCHES,
    timing::SCRIPT_BUDGET,
);

static DIAGNOSTIC_STEPS: [ChatStep<ModemCore>; 2] = [
    ChatStep::new(b"AT+KSREP?", &[Match::bound(b"+KSREP:", on_ksrep)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
];

/// Boot-report probe run when the init script fails.
pub static DIAGNOSTIC_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "diagnostic",
    &DIAGNOSTIC_STEPS,
    ABORT_MATCHES,
    timing::SLOW_RESPONSE,
);

static ENABLE_URC_STEPS: [ChatStep<ModemCore>; 1] =
    [ChatStep::new(b"AT+KSREP=1", OK_ONLY, RESPONSE)];

/// Enable the `+KSUP` boot report.
pub static ENABLE_URC_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "enable-urc",
    &ENABLE_URC_STEPS,
    ABORT_MATCHES,
    timing::SLOW_RESPONSE,
);

static REGISTRATION_CHECK_STEPS: [ChatStep<ModemCore>; 2] = [
    ChatStep::new(b"AT+CEREG?", &[Match::bound(b"+CEREG:", urc::on_cereg)], RESPONSE),
    ChatStep::new(b"", OK_ONLY, RESPONSE),
];

/// Solicited registration re-query while waiting for the network.
pub static REGISTRATION_CHECK_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "registration-check",
    &REGISTRATION_CHECK_STEPS,
    ABORT_MATCHES,
    timing::SLOW_RESPONSE,
);

static IFACE_STATUS_STEPS: [ChatStep<ModemCore>; 1] = [ChatStep::new(
    b"AT+CGCONTRDP=1",
    &[
        Match::bound(b"+CGCONTRDP:", on_pdp_context),
        Match::response(b"OK"),
    ],
    RESPONSE,
)];

/// PDP context / DNS poll while the carrier is up. A bare `OK` means no
/// context is active.
pub static IFACE_STATUS_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "iface-status",
    &IFACE_STATUS_STEPS,
    ABORT_MATCHES,
    timing::SLOW_RESPONSE,
);

static POWER_OFF_STEPS: [ChatStep<ModemCore>; 2] = [
    // Detach from the network before removing power.
    ChatStep::new(b"AT+COPS=2", OK_ONLY, timing::SLOW_RESPONSE),
    ChatStep::new(b"AT+CPOF", OK_ONLY, timing::SLOW_RESPONSE),
];

/// Graceful software power-off.
pub static POWER_OFF_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "power-off",
    &POWER_OFF_STEPS,
    ABORT_MATCHES,
    timing::SCRIPT_BUDGET,
);

static AIRPLANE_STEPS: [ChatStep<ModemCore>; 1] =
    [ChatStep::new(b"AT+CFUN=4,0", OK_ONLY, timing::SLOW_RESPONSE)];

/// Disable the radio without a restart.
pub static AIRPLANE_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "airplane",
    &AIRPLANE_STEPS,
    ABORT_MATCHES,
    timing::SLOW_RESPONSE,
);

static SIM_POWER_OFF_STEPS: [ChatStep<ModemCore>; 1] =
    [ChatStep::new(b"AT+CFUN=0,0", OK_ONLY, timing::SLOW_RESPONSE)];

/// Drop to minimum functionality, powering the SIM down.
pub static SIM_POWER_OFF_SCRIPT: ChatScript<ModemCore> = ChatScript::new(
    "sim-power-off",
    &SIM_POWER_OFF_STEPS,
    ABORT_MATCHES,
    timing::SLOW_RESPONSE,
);

/// `+CME ERROR: <code>` — record the cause for diagnostics.
fn on_cme_error(core: &mut ModemCore, args: &AtArgs<'_>) {
    core.last_cme_error = args.int(1);
    warn!("CME error {:?}", core.last_cme_error);
}

/// Whole-line IMEI response after `AT+CGSN`.
fn on_imei(core: &mut ModemCore, args: &AtArgs<'_>) {
    let Some(line) = args.arg(1) else {
        return;
    };
    if line.len() >= 14 && line.iter().all(u8::is_ascii_digit) {
        core.identity.set_imei(line);
    }
}

fn on_manufacturer(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(line) = args.arg(1) {
        if !line.is_empty() {
            core.identity.set_manufacturer(line);
        }
    }
}

fn on_model(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(line) = args.arg(1) {
        if !line.is_empty() {
            core.identity.set_model(line);
        }
    }
}

fn on_revision(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(line) = args.arg(1) {
        if !line.is_empty() {
            core.identity.set_revision(line);
        }
    }
}

/// Whole-line IMSI response after `AT+CIMI`.
fn on_imsi(core: &mut ModemCore, args: &AtArgs<'_>) {
    let Some(line) = args.arg(1) else {
        return;
    };
    if !line.is_empty() && line.iter().all(u8::is_ascii_digit) {
        core.identity.set_imsi(line);
    }
}

/// `+CCID: <iccid>`.
fn on_iccid(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(iccid) = args.quoted(1) {
        if !iccid.is_empty() {
            core.identity.set_iccid(iccid);
        }
    }
}

/// `+KSRAT: <rat>` — configured RAT read-back.
fn on_ksrat(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(value) = args.int(1) {
        core.actual_rat = RatMode::from_at(value);
    }
}

/// `+KSREP: <enabled>[,<delay>]` — boot-report configuration.
fn on_ksrep(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(enabled) = args.int(1) {
        core.urc_reports_enabled = Some(enabled == 1);
    }
}

/// `+CGCONTRDP: <cid>,<bearer>,<apn>,...` — an active PDP context.
fn on_pdp_context(core: &mut ModemCore, args: &AtArgs<'_>) {
    core.pdp_active = true;
    if let Some(apn) = args.quoted(3) {
        if !apn.is_empty() && core.identity.apn().is_empty() {
            core.identity.set_apn(apn);
        }
    }
}
