//! Lifecycle state machine
//!
//! The transition table over [`ModemState`]. Each state has an optional
//! enter handler, leave handler, and event handler; dispatch is an
//! exhaustive `match`, so adding a state without wiring it up fails to
//! compile rather than falling through a bounds check.
//!
//! Handlers do no I/O. They queue [`Action`]s which the shell executes on
//! the worker context.

use super::core::{Action, ModemCore};
use crate::chat::scripts::ScriptId;
use crate::config::{timing, MAX_SCRIPT_AT_CMD_RETRY};
use crate::gpio::PinRole;
use crate::types::{ModemError, ModemEvent, ModemState};

impl ModemCore {
    /// Transition to `new`.
    ///
    /// This is the only place the current state is written. The previous
    /// state's leave handler runs first; if it fails the transition is
    /// aborted and the state is unchanged. The state change then commits
    /// *before* the enter handler runs: an enter failure is logged but does
    /// not roll back, since the machine is already in the new state and
    /// recovery happens through events, not rollback.
    pub fn enter_state(&mut self, new: ModemState) {
        if let Err(err) = self.on_leave(self.state) {
            warn!("leave {:?} failed ({:?}), transition aborted", self.state, err);
            return;
        }

        debug!("modem state {:?} -> {:?}", self.state, new);
        self.state = new;

        if let Err(err) = self.on_enter(new) {
            warn!("enter {:?} failed ({:?})", new, err);
        }
    }

    /// Feed one event through the current state's event handler.
    ///
    /// Called only from the dispatcher on the worker context, strictly in
    /// queue order.
    pub fn handle_event(&mut self, event: ModemEvent) {
        trace!("event {:?} in {:?}", event, self.state);

        if event == ModemEvent::Suspend {
            self.handle_suspend();
            return;
        }

        match self.state {
            ModemState::Idle => self.idle_event(event),
            ModemState::ResetPulse | ModemState::PowerOnPulse => self.pulse_event(event),
            ModemState::AwaitPowerOn => self.await_power_on_event(event),
            ModemState::SetBaudrate => self.set_baudrate_event(event),
            ModemState::RunInitScript => self.init_script_event(event),
            ModemState::RunInitFailDiagnosticScript => self.diagnostic_event(event),
            ModemState::RunRatConfigScript => self.rat_config_event(event),
            ModemState::RunEnableGprsScript => self.enable_gprs_event(event),
            ModemState::AwaitRegistered => self.await_registered_event(event),
            ModemState::CarrierOn => self.carrier_on_event(event),
            ModemState::CarrierOff => self.carrier_off_event(event),
            ModemState::SimPowerOff | ModemState::Airplane => self.radio_off_event(event),
            ModemState::InitPowerOff => self.init_power_off_event(event),
            ModemState::PowerOffPulse => self.power_off_pulse_event(event),
            ModemState::AwaitPowerOff => self.await_power_off_event(event),
        }
    }

    fn on_enter(&mut self, state: ModemState) -> Result<(), ModemError> {
        match state {
            ModemState::Idle => {
                self.push_action(Action::StopTimer);
                self.push_action(Action::ReleaseChat);
                self.push_action(Action::CloseUart);
                self.push_action(Action::NotifySuspended);
                self.pdp_active = false;
                self.diag_reboot_armed = false;
            }
            ModemState::ResetPulse => {
                if self.pins().wake {
                    self.push_action(Action::SetPin(PinRole::Wake, false));
                }
                self.push_action(Action::SetPin(PinRole::Reset, true));
                self.push_action(Action::StartTimer(timing::RESET_PULSE));
            }
            ModemState::PowerOnPulse => {
                self.push_action(Action::SetPin(PinRole::PowerOn, true));
                self.push_action(Action::StartTimer(timing::POWER_ON_PULSE));
            }
            ModemState::AwaitPowerOn => {
                self.startup_reported = false;
                self.push_action(Action::StartTimer(timing::STARTUP));
            }
            ModemState::SetBaudrate | ModemState::RunInitScript => {
                // The script starts once BusOpened confirms the pipe.
                self.push_action(Action::OpenUart);
                self.push_action(Action::AttachChat);
            }
            ModemState::RunInitFailDiagnosticScript => {
                self.init_retries = self.init_retries.saturating_add(1);
                if self.init_retries > MAX_SCRIPT_AT_CMD_RETRY {
                    warn!("init retries exhausted, giving up");
                    self.enter_state(ModemState::Idle);
                    return Ok(());
                }
                self.diag_reboot_armed = false;
                self.push_action(Action::OpenUart);
                self.push_action(Action::AttachChat);
            }
            ModemState::RunRatConfigScript => {
                self.init_retries = 0;
                if self.rat_change_required() {
                    self.push_action(Action::RunScript(ScriptId::RatConfig));
                } else {
                    self.push_action(Action::Delegate(ModemEvent::ScriptSuccess));
                }
            }
            ModemState::RunEnableGprsScript => {
                self.resolve_apn();
                self.push_action(Action::RunScript(ScriptId::EnableGprs));
            }
            ModemState::AwaitRegistered => {
                if self.registration.is_registered_currently() {
                    self.push_action(Action::Delegate(ModemEvent::Registered));
                }
                self.push_action(Action::StartTimer(timing::REGISTRATION_POLL));
            }
            ModemState::CarrierOn => {
                self.push_action(Action::StartTimer(timing::IFACE_POLL));
            }
            ModemState::CarrierOff => {
                let period = if self.sockets.open_count() == 0 {
                    timing::SOCKET_POLL_IDLE
                } else {
                    timing::SOCKET_POLL_BUSY
                };
                self.push_action(Action::StartTimer(period));
            }
            ModemState::SimPowerOff => {
                if self.pins().sim_switch {
                    self.push_action(Action::SetPin(PinRole::SimSwitch, false));
                }
                self.push_action(Action::RunScript(ScriptId::SimPowerOff));
            }
            ModemState::Airplane => {
                self.push_action(Action::RunScript(ScriptId::Airplane));
            }
            ModemState::InitPowerOff => {
                self.push_action(Action::StopTimer);
                self.push_action(Action::RunScript(ScriptId::PowerOff));
            }
            ModemState::PowerOffPulse => {
                self.push_action(Action::SetPin(PinRole::PowerOn, true));
                self.push_action(Action::StartTimer(timing::POWER_OFF_PULSE));
            }
            ModemState::AwaitPowerOff => {
                self.push_action(Action::StartTimer(timing::SHUTDOWN));
            }
        }
        Ok(())
    }

    fn on_leave(&mut self, state: ModemState) -> Result<(), ModemError> {
        match state {
            ModemState::ResetPulse => {
                self.push_action(Action::SetPin(PinRole::Reset, false));
                if self.pins().wake {
                    self.push_action(Action::SetPin(PinRole::Wake, true));
                }
            }
            ModemState::PowerOnPulse | ModemState::PowerOffPulse => {
                self.push_action(Action::SetPin(PinRole::PowerOn, false));
            }
            ModemState::AwaitRegistered
            | ModemState::CarrierOn
            | ModemState::CarrierOff => {
                self.push_action(Action::StopTimer);
            }
            _ => {}
        }
        Ok(())
    }

    /// Graceful power-down entry, reachable from any state.
    fn handle_suspend(&mut self) {
        match self.state {
            ModemState::Idle => {
                // Already down; just wake the waiter.
                self.push_action(Action::NotifySuspended);
            }
            ModemState::InitPowerOff
            | ModemState::PowerOffPulse
            | ModemState::AwaitPowerOff => {
                // Power-down already in progress.
            }
            ModemState::ResetPulse | ModemState::PowerOnPulse | ModemState::AwaitPowerOn => {
                // Nothing to say over the UART yet; cut power directly.
                if self.pins().power_on {
                    self.enter_state(ModemState::PowerOffPulse);
                } else {
                    self.enter_state(ModemState::AwaitPowerOff);
                }
            }
            _ => self.enter_state(ModemState::InitPowerOff),
        }
    }

    fn idle_event(&mut self, event: ModemEvent) {
        if event == ModemEvent::Resume {
            let pins = self.pins();
            if self.config().autostart || pins.reset {
                self.enter_state(ModemState::AwaitPowerOn);
            } else if pins.power_on {
                self.enter_state(ModemState::PowerOnPulse);
            } else {
                // No control pin wired at all: try a software-only reboot
                // through the diagnostic script.
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
        }
    }

    fn pulse_event(&mut self, event: ModemEvent) {
        if event == ModemEvent::Timeout {
            self.enter_state(ModemState::AwaitPowerOn);
        }
    }

    fn await_power_on_event(&mut self, event: ModemEvent) {
        if event == ModemEvent::Timeout {
            if self.config().baud.is_some() {
                self.enter_state(ModemState::SetBaudrate);
            } else {
                self.enter_state(ModemState::RunInitScript);
            }
        }
    }

    fn set_baudrate_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::BusOpened => self.push_action(Action::RunScript(ScriptId::SetBaud)),
            ModemEvent::ScriptSuccess => self.enter_state(ModemState::RunInitScript),
            ModemEvent::ScriptFailed | ModemEvent::Timeout | ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn init_script_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::BusOpened => self.push_action(Action::RunScript(ScriptId::Init)),
            ModemEvent::ScriptSuccess => self.enter_state(ModemState::RunRatConfigScript),
            ModemEvent::ScriptFailed | ModemEvent::Timeout | ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn diagnostic_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::BusOpened => {
                self.push_action(Action::RunScript(ScriptId::Diagnostic));
            }
            ModemEvent::ScriptSuccess => {
                if self.diag_reboot_armed {
                    // Boot reporting was just enabled; let the modem settle
                    // before cycling power so the setting sticks.
                    self.push_action(Action::StartTimer(timing::SHUTDOWN));
                } else if self.urc_reports_enabled == Some(true) {
                    self.power_cycle();
                } else {
                    self.diag_reboot_armed = true;
                    self.push_action(Action::RunScript(ScriptId::EnableUrc));
                }
            }
            ModemEvent::ScriptFailed | ModemEvent::Timeout | ModemEvent::BusClosed => {
                self.power_cycle();
            }
            _ => {}
        }
    }

    fn rat_config_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::ScriptSuccess => self.enter_state(ModemState::RunEnableGprsScript),
            ModemEvent::ScriptRequireRestart => {
                // The config was applied with an airplane-mode restart; wait
                // out the shutdown+startup window, then re-initialize.
                self.push_action(Action::StartTimer(timing::AIRPLANE_RESTART));
            }
            ModemEvent::Timeout => {
                self.push_action(Action::RunScript(ScriptId::Init));
            }
            ModemEvent::ScriptFailed | ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn enable_gprs_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::ScriptSuccess => self.enter_state(ModemState::AwaitRegistered),
            ModemEvent::Registered => self.enter_state(ModemState::CarrierOn),
            ModemEvent::ScriptFailed | ModemEvent::Timeout | ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn await_registered_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::Registered => self.enter_state(ModemState::CarrierOn),
            ModemEvent::Timeout => {
                // Stay here indefinitely, but keep asking.
                self.push_action(Action::RunScript(ScriptId::RegistrationCheck));
                self.push_action(Action::StartTimer(timing::REGISTRATION_POLL));
            }
            ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn carrier_on_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::Deregistered => self.enter_state(ModemState::CarrierOff),
            ModemEvent::Timeout => {
                // The status handler re-asserts this while a context is up.
                self.pdp_active = false;
                self.push_action(Action::RunScript(ScriptId::IfaceStatus));
            }
            ModemEvent::ScriptSuccess | ModemEvent::ScriptFailed => {
                // Interface status poll finished; schedule the next one.
                self.push_action(Action::StartTimer(timing::IFACE_POLL));
            }
            ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn carrier_off_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::Registered => self.enter_state(ModemState::CarrierOn),
            ModemEvent::Timeout => {
                if self.sockets.open_count() == 0 {
                    self.enter_state(ModemState::RunEnableGprsScript);
                } else {
                    self.push_action(Action::StartTimer(timing::SOCKET_POLL_BUSY));
                }
            }
            ModemEvent::BusClosed => {
                self.enter_state(ModemState::RunInitFailDiagnosticScript);
            }
            _ => {}
        }
    }

    fn radio_off_event(&mut self, event: ModemEvent) {
        if event == ModemEvent::Resume {
            self.enter_state(ModemState::RunEnableGprsScript);
        }
    }

    fn init_power_off_event(&mut self, event: ModemEvent) {
        match event {
            ModemEvent::ScriptSuccess | ModemEvent::ScriptFailed | ModemEvent::Timeout => {
                if self.pins().power_on {
                    self.enter_state(ModemState::PowerOffPulse);
                } else {
                    self.enter_state(ModemState::AwaitPowerOff);
                }
            }
            ModemEvent::BusClosed => self.enter_state(ModemState::AwaitPowerOff),
            _ => {}
        }
    }

    fn power_off_pulse_event(&mut self, event: ModemEvent) {
        if event == ModemEvent::Timeout {
            self.enter_state(ModemState::AwaitPowerOff);
        }
    }

    fn await_power_off_event(&mut self, event: ModemEvent) {
        if event == ModemEvent::Timeout {
            self.enter_state(ModemState::Idle);
        }
    }

    /// Re-enter the hardware power-cycle path after a failed recovery.
    fn power_cycle(&mut self) {
        let pins = self.pins();
        if pins.reset {
            self.enter_state(ModemState::ResetPulse);
        } else if pins.power_on {
            self.enter_state(ModemState::PowerOnPulse);
        } else {
            self.enter_state(ModemState::AwaitPowerOn);
        }
    }
}
