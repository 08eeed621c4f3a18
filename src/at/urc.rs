//! Unsolicited result code dispatch
//!
//! Every inbound line not claimed as a script response is offered to this
//! table. Handlers update the instance record and may feed events back
//! through the action queue; they never fail, dropping malformed updates
//! instead.

use super::args::AtArgs;
use super::matcher::{self, Match};
use crate::modem::band::BandBitmap;
use crate::modem::core::{Action, ModemCore};
use crate::types::{ModemEvent, PhoneFunctionality, RatMode, RegistrationState, SignalQuality};

/// The standard URC table.
///
/// First matching prefix wins; all prefixes here are mutually exclusive.
pub static URC_MATCHES: &[Match<ModemCore>] = &[
    Match::bound(b"+KSUP:", on_ksup),
    Match::bound(b"+CEREG:", on_cereg),
    Match::bound(b"+CREG:", on_creg),
    Match::bound(b"+KTCP_DATA:", on_ktcp_data),
    Match::bound(b"+KUDP_DATA:", on_kudp_data),
    Match::bound(b"+KTCP_NOTIF:", on_ktcp_notif),
    Match::bound(b"+KSTATEV:", on_kstatev),
    Match::bound(b"+KBNDCFG:", on_kbndcfg),
    Match::bound(b"+CSQ:", on_csq),
    Match::bound(b"+CESQ:", on_cesq),
    Match::bound(b"+CFUN:", on_cfun),
    Match::bound(b"+COPS:", on_cops),
];

/// Offer a line to the URC table.
pub fn dispatch_urc(core: &mut ModemCore, line: &[u8]) -> bool {
    matcher::dispatch(core, URC_MATCHES, line)
}

/// `+KSUP: <status>` — modem boot report.
pub(crate) fn on_ksup(core: &mut ModemCore, args: &AtArgs<'_>) {
    let status = args.int(1);
    debug!("modem started, status {:?}", status);
    core.startup_reported = true;
}

/// `+CEREG:` in both its URC and solicited-read forms.
pub(crate) fn on_cereg(core: &mut ModemCore, args: &AtArgs<'_>) {
    handle_registration(core, args);
}

/// `+CREG:` in both its URC and solicited-read forms.
pub(crate) fn on_creg(core: &mut ModemCore, args: &AtArgs<'_>) {
    handle_registration(core, args);
}

/// Shared `+CxREG` logic.
///
/// The URC form is `<stat>[,<tac>,<ci>,<AcT>]`; the solicited read form is
/// `<n>,<stat>[,<tac>,<ci>,<AcT>]`. The two are told apart by whether the
/// second field is numeric: location fields are always quoted.
fn handle_registration(core: &mut ModemCore, args: &AtArgs<'_>) {
    let mut stat_index = 1;
    if let Some(raw) = args.arg(2) {
        if !raw.is_empty() && raw[0] != b'"' && args.int(2).is_some() {
            stat_index = 2;
        }
    }

    let Some(stat) = args.int(stat_index) else {
        return;
    };

    let act = args.int(stat_index + 3).and_then(RatMode::from_act);
    core.registration.set_rat_mode(act);

    let state = RegistrationState::from_at(stat);
    match core.registration.update(state) {
        Some(crate::modem::registration::RegistrationEdge::Registered) => {
            core.push_action(Action::Delegate(ModemEvent::Registered));
        }
        Some(crate::modem::registration::RegistrationEdge::Deregistered) => {
            core.push_action(Action::Delegate(ModemEvent::Deregistered));
        }
        None => {}
    }
}

/// `+KTCP_DATA: <session>,<bytes>` — TCP data pending.
pub(crate) fn on_ktcp_data(core: &mut ModemCore, args: &AtArgs<'_>) {
    let (Some(id), Some(bytes)) = (args.int(1), args.int(2)) else {
        return;
    };
    if core.sockets.data_announced(id, bytes) {
        core.push_action(Action::Delegate(ModemEvent::SocketReady));
    }
}

/// `+KUDP_DATA: <session>,<bytes>` — UDP data pending.
pub(crate) fn on_kudp_data(core: &mut ModemCore, args: &AtArgs<'_>) {
    on_ktcp_data(core, args);
}

/// `+KTCP_NOTIF: <session>,<cause>` — TCP session fault.
pub(crate) fn on_ktcp_notif(core: &mut ModemCore, args: &AtArgs<'_>) {
    let (Some(id), Some(cause)) = (args.int(1), args.int(2)) else {
        return;
    };
    warn!("socket {} notif {}", id, cause);
    core.sockets.notify(id, cause);
}

/// `+KSTATEV: <state>,<rat>` — variant-gated state event report.
pub(crate) fn on_kstatev(_core: &mut ModemCore, args: &AtArgs<'_>) {
    debug!("modem state event {:?}/{:?}", args.int(1), args.int(2));
}

/// `+KBNDCFG: <rat>,<bitmap>` — configured band read-back.
///
/// The read command reports one line per RAT; only the line for the
/// configured RAT is recorded.
pub(crate) fn on_kbndcfg(core: &mut ModemCore, args: &AtArgs<'_>) {
    let Some(rat) = args.int(1) else {
        return;
    };
    if rat != i32::from(core.config().rat.as_at()) {
        return;
    }
    if let Some(hex) = args.arg(2) {
        if let Some(bitmap) = BandBitmap::from_hex(hex) {
            core.actual_bands = Some(bitmap);
        }
    }
}

/// `+CSQ: <rssi>,<ber>`.
pub(crate) fn on_csq(core: &mut ModemCore, args: &AtArgs<'_>) {
    let Some(index) = args.int(1) else {
        return;
    };
    core.signal.rssi_dbm = SignalQuality::rssi_from_csq(index);
}

/// `+CESQ: <rxlev>,<ber>,<rscp>,<ecno>,<rsrq>,<rsrp>`.
pub(crate) fn on_cesq(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(rsrq) = args.int(5) {
        core.signal.rsrq_tenths_db = SignalQuality::rsrq_from_cesq(rsrq);
    }
    if let Some(rsrp) = args.int(6) {
        core.signal.rsrp_dbm = SignalQuality::rsrp_from_cesq(rsrp);
    }
}

/// `+CFUN: <fun>`.
pub(crate) fn on_cfun(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(fun) = args.int(1) {
        if let Some(level) = PhoneFunctionality::from_at(fun) {
            core.functionality = Some(level);
        }
    }
}

/// `+COPS: <mode>[,<format>,<oper>[,<AcT>]]`.
pub(crate) fn on_cops(core: &mut ModemCore, args: &AtArgs<'_>) {
    if let Some(oper) = args.quoted(3) {
        if !oper.is_empty() {
            core.identity.set_operator(oper);
        }
    }
    core.registration
        .set_rat_mode(args.int(4).and_then(RatMode::from_act));
}
