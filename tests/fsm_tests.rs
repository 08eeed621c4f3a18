//! Modem State Machine Tests
//!
//! Transition table coverage: power-up path selection, script chaining,
//! registration tracking, bounded init retries, and the graceful
//! power-down path.

use hl78xx_modem::chat::scripts::ScriptId;
use hl78xx_modem::config::{timing, MAX_SCRIPT_AT_CMD_RETRY};
use hl78xx_modem::gpio::{PinPresence, PinRole};
use hl78xx_modem::modem::core::{Action, ModemConfig, ModemCore};
use hl78xx_modem::socket::offload::SocketProtocol;
use hl78xx_modem::types::{ModemEvent, ModemState, RatMode};

fn core_with(autostart: bool, reset: bool, power_on: bool) -> ModemCore {
    let config = ModemConfig {
        autostart,
        ..ModemConfig::default()
    };
    let pins = PinPresence {
        reset,
        power_on,
        ..PinPresence::default()
    };
    ModemCore::new(config, pins)
}

fn drain(core: &mut ModemCore) -> Vec<Action> {
    let mut actions = Vec::new();
    while let Some(action) = core.next_action() {
        actions.push(action);
    }
    actions
}

/// Step until a given state through the happy init path.
fn bring_to_init_script(core: &mut ModemCore) {
    core.handle_event(ModemEvent::Resume);
    assert_eq!(core.state(), ModemState::AwaitPowerOn);
    let _ = drain(core);
    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::RunInitScript);
    let _ = drain(core);
    core.handle_event(ModemEvent::BusOpened);
    let actions = drain(core);
    assert!(actions.contains(&Action::RunScript(ScriptId::Init)));
}

// ============================================================================
// Power-Up Path Selection
// ============================================================================

#[test]
fn test_resume_with_reset_pin_goes_to_await_power_on() {
    // Scenario: only a reset pin wired, no power-on pin, no autostart.
    let mut core = core_with(false, true, false);
    core.handle_event(ModemEvent::Resume);
    assert_eq!(core.state(), ModemState::AwaitPowerOn);
}

#[test]
fn test_resume_with_autostart_goes_to_await_power_on() {
    let mut core = core_with(true, false, false);
    core.handle_event(ModemEvent::Resume);
    assert_eq!(core.state(), ModemState::AwaitPowerOn);
}

#[test]
fn test_resume_with_power_on_pin_pulses() {
    let mut core = core_with(false, false, true);
    core.handle_event(ModemEvent::Resume);
    assert_eq!(core.state(), ModemState::PowerOnPulse);

    let actions = drain(&mut core);
    assert!(actions.contains(&Action::SetPin(PinRole::PowerOn, true)));
    assert!(actions.contains(&Action::StartTimer(timing::POWER_ON_PULSE)));
}

#[test]
fn test_resume_with_no_control_pins_takes_software_path() {
    let mut core = core_with(false, false, false);
    core.handle_event(ModemEvent::Resume);
    assert_eq!(core.state(), ModemState::RunInitFailDiagnosticScript);
}

#[test]
fn test_power_on_pulse_releases_pin_on_leave() {
    let mut core = core_with(false, false, true);
    core.handle_event(ModemEvent::Resume);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::AwaitPowerOn);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::SetPin(PinRole::PowerOn, false)));
    assert!(actions.contains(&Action::StartTimer(timing::STARTUP)));
}

#[test]
fn test_reset_pulse_sequencing() {
    let mut core = core_with(false, true, false);
    core.enter_state(ModemState::ResetPulse);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::SetPin(PinRole::Reset, true)));
    assert!(actions.contains(&Action::StartTimer(timing::RESET_PULSE)));

    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::AwaitPowerOn);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::SetPin(PinRole::Reset, false)));
}

#[test]
fn test_await_power_on_timeout_with_baud_config() {
    let config = ModemConfig {
        autostart: true,
        baud: Some(921_600),
        ..ModemConfig::default()
    };
    let mut core = ModemCore::new(config, PinPresence::default());
    core.handle_event(ModemEvent::Resume);
    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::SetBaudrate);
}

// ============================================================================
// Init Script Chain
// ============================================================================

#[test]
fn test_init_opens_uart_and_runs_on_bus_opened() {
    let mut core = core_with(false, true, false);
    core.handle_event(ModemEvent::Resume);
    let _ = drain(&mut core);
    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::RunInitScript);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::OpenUart));
    assert!(actions.contains(&Action::AttachChat));

    core.handle_event(ModemEvent::BusOpened);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::Init)));
}

#[test]
fn test_rat_config_short_circuits_when_matching() {
    // Scenario: init succeeds and the read-back RAT already matches the
    // desired configuration, so no restart is needed.
    let mut core = core_with(false, true, false);
    bring_to_init_script(&mut core);

    core.actual_rat = Some(RatMode::CatM1);
    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::RunRatConfigScript);
    assert!(!core.rat_change_required());

    let actions = drain(&mut core);
    assert!(actions.contains(&Action::Delegate(ModemEvent::ScriptSuccess)));

    // The synthesized event flows back through the queue.
    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::RunEnableGprsScript);
}

#[test]
fn test_rat_config_runs_script_when_mismatched() {
    let mut core = core_with(false, true, false);
    bring_to_init_script(&mut core);

    core.actual_rat = Some(RatMode::NbIot);
    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::RunRatConfigScript);

    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::RatConfig)));

    // Applying with a restart arms the settle timer.
    core.handle_event(ModemEvent::ScriptRequireRestart);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::StartTimer(timing::AIRPLANE_RESTART)));

    // After the restart window, the init sequence reruns in place.
    core.handle_event(ModemEvent::Timeout);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::Init)));
}

#[test]
fn test_enable_gprs_to_await_registered() {
    let mut core = core_with(false, true, false);
    bring_to_init_script(&mut core);
    core.handle_event(ModemEvent::ScriptSuccess);
    let _ = drain(&mut core);
    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::RunEnableGprsScript);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::EnableGprs)));

    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::AwaitRegistered);
}

#[test]
fn test_script_failure_enters_diagnostic() {
    // Scenario: +CME ERROR mid-init aborts the script; the callback
    // delegates ScriptFailed and the machine enters the diagnostic state.
    let mut core = core_with(false, true, false);
    bring_to_init_script(&mut core);

    core.handle_event(ModemEvent::ScriptFailed);
    assert_eq!(core.state(), ModemState::RunInitFailDiagnosticScript);
    assert_eq!(core.init_retries(), 1);
}

#[test]
fn test_diagnostic_enables_urc_then_arms_reboot() {
    let mut core = core_with(false, true, false);
    bring_to_init_script(&mut core);
    core.handle_event(ModemEvent::ScriptFailed);
    let _ = drain(&mut core);
    core.handle_event(ModemEvent::BusOpened);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::Diagnostic)));

    // Probe found reporting disabled: enable it.
    core.handle_event(ModemEvent::ScriptSuccess);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::EnableUrc)));

    // Enable succeeded: wait out the shutdown, then cycle power.
    core.handle_event(ModemEvent::ScriptSuccess);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::StartTimer(timing::SHUTDOWN)));

    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::ResetPulse);
}

#[test]
fn test_init_retries_are_bounded() {
    let mut core = core_with(false, true, false);
    for _ in 0..MAX_SCRIPT_AT_CMD_RETRY {
        core.enter_state(ModemState::RunInitFailDiagnosticScript);
        assert_eq!(core.state(), ModemState::RunInitFailDiagnosticScript);
        let _ = drain(&mut core);
    }

    // One failure past the bound parks the driver in Idle.
    core.enter_state(ModemState::RunInitFailDiagnosticScript);
    assert_eq!(core.state(), ModemState::Idle);
}

// ============================================================================
// Registration
// ============================================================================

fn bring_to_await_registered(core: &mut ModemCore) {
    bring_to_init_script(core);
    core.handle_event(ModemEvent::ScriptSuccess);
    let _ = drain(core);
    core.handle_event(ModemEvent::ScriptSuccess);
    let _ = drain(core);
    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::AwaitRegistered);
    let _ = drain(core);
}

#[test]
fn test_registered_event_brings_carrier_on() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);

    core.handle_event(ModemEvent::Registered);
    assert_eq!(core.state(), ModemState::CarrierOn);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::StartTimer(timing::IFACE_POLL)));
}

#[test]
fn test_await_registered_requeries_on_timeout() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);

    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::AwaitRegistered);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::RegistrationCheck)));
    assert!(actions.contains(&Action::StartTimer(timing::REGISTRATION_POLL)));
}

#[test]
fn test_deregistration_enters_carrier_off() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);
    core.handle_event(ModemEvent::Registered);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Deregistered);
    assert_eq!(core.state(), ModemState::CarrierOff);
}

#[test]
fn test_carrier_off_waits_for_sockets() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);
    core.handle_event(ModemEvent::Registered);
    let _ = drain(&mut core);
    core.sockets
        .insert(1, SocketProtocol::Tcp, "example.com", 80)
        .unwrap();

    core.handle_event(ModemEvent::Deregistered);
    assert_eq!(core.state(), ModemState::CarrierOff);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::StartTimer(timing::SOCKET_POLL_BUSY)));

    // Sockets still open: keep polling.
    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::CarrierOff);
    let _ = drain(&mut core);

    // Sockets drained: bring data service back up.
    core.sockets.remove(1);
    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::RunEnableGprsScript);
}

#[test]
fn test_carrier_on_periodic_iface_poll() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);
    core.handle_event(ModemEvent::Registered);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Timeout);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::IfaceStatus)));

    // Poll finished; the next one is scheduled.
    core.handle_event(ModemEvent::ScriptSuccess);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::StartTimer(timing::IFACE_POLL)));
}

// ============================================================================
// Power-Down Path
// ============================================================================

#[test]
fn test_suspend_runs_power_off_then_pulses() {
    let mut core = core_with(false, true, true);
    bring_to_await_registered(&mut core);
    core.handle_event(ModemEvent::Registered);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Suspend);
    assert_eq!(core.state(), ModemState::InitPowerOff);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::PowerOff)));

    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::PowerOffPulse);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::AwaitPowerOff);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Timeout);
    assert_eq!(core.state(), ModemState::Idle);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::CloseUart));
    assert!(actions.contains(&Action::NotifySuspended));
}

#[test]
fn test_suspend_without_power_pin_skips_pulse() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);

    core.handle_event(ModemEvent::Suspend);
    core.handle_event(ModemEvent::ScriptSuccess);
    assert_eq!(core.state(), ModemState::AwaitPowerOff);
}

#[test]
fn test_suspend_while_idle_notifies_immediately() {
    let mut core = core_with(false, true, false);
    core.handle_event(ModemEvent::Suspend);
    assert_eq!(core.state(), ModemState::Idle);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::NotifySuspended));
}

#[test]
fn test_suspend_before_uart_cuts_power_directly() {
    let mut core = core_with(false, false, true);
    core.handle_event(ModemEvent::Resume);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::Suspend);
    assert_eq!(core.state(), ModemState::PowerOffPulse);
}

// ============================================================================
// Event Handling Properties
// ============================================================================

#[test]
fn test_unhandled_events_leave_state_unchanged() {
    let mut core = core_with(false, true, false);
    core.handle_event(ModemEvent::Registered);
    core.handle_event(ModemEvent::SocketReady);
    core.handle_event(ModemEvent::BusOpened);
    assert_eq!(core.state(), ModemState::Idle);
}

#[test]
fn test_enter_state_commits_before_enter_handler() {
    // The state change commits even though the enter handler queues
    // follow-up work; observing the state right after enter_state must
    // show the new state.
    let mut core = core_with(false, true, false);
    core.enter_state(ModemState::AwaitPowerOn);
    assert_eq!(core.state(), ModemState::AwaitPowerOn);
}

#[test]
fn test_bus_closed_recovers_through_diagnostic() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);
    core.handle_event(ModemEvent::Registered);
    let _ = drain(&mut core);

    core.handle_event(ModemEvent::BusClosed);
    assert_eq!(core.state(), ModemState::RunInitFailDiagnosticScript);
}

#[test]
fn test_airplane_resume_reenables_gprs() {
    let mut core = core_with(false, true, false);
    bring_to_await_registered(&mut core);
    core.enter_state(ModemState::Airplane);
    let actions = drain(&mut core);
    assert!(actions.contains(&Action::RunScript(ScriptId::Airplane)));

    core.handle_event(ModemEvent::Resume);
    assert_eq!(core.state(), ModemState::RunEnableGprsScript);
}
