//! Modem control pins
//!
//! Every control pin is optional per board configuration; state-machine
//! logic checks presence before sequencing a pin, and driving an absent pin
//! is a defensive no-op.

use embedded_hal::digital::OutputPin;

use crate::types::ModemError;

/// Control pin identity used by state-machine actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    /// Hardware reset.
    Reset,
    /// Sleep/wake control.
    Wake,
    /// Power-on request (doubles as the power-off pulse pin).
    PowerOn,
    /// Fast shutdown request.
    FastShutdown,
    /// External/internal SIM select.
    SimSwitch,
}

/// Which pins (and status inputs) the board wires up.
///
/// Output pin flags come from [`ModemPins::presence`]; the status-input
/// flags are set by the integrator for the signals it routed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinPresence {
    /// Reset output wired.
    pub reset: bool,
    /// Wake output wired.
    pub wake: bool,
    /// Power-on output wired.
    pub power_on: bool,
    /// Fast-shutdown output wired.
    pub fast_shutdown: bool,
    /// SIM-select output wired.
    pub sim_switch: bool,
    /// VGPIO status input wired.
    pub vgpio: bool,
    /// UART DSR status input wired.
    pub uart_dsr: bool,
    /// UART CTS status input wired.
    pub uart_cts: bool,
    /// UART DTR output wired.
    pub uart_dtr: bool,
    /// GPIO6 status input wired.
    pub gpio6: bool,
    /// GPIO8 status input wired.
    pub gpio8: bool,
}

/// One output pin together with its active polarity.
pub struct ControlPin<P: OutputPin> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> ControlPin<P> {
    /// Wrap an active-high pin.
    pub fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }

    /// Wrap an active-low pin.
    pub fn active_low(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
        }
    }

    /// Drive the pin to its active or inactive level.
    pub fn set(&mut self, active: bool) -> Result<(), ModemError> {
        let high = active != self.active_low;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| ModemError::Gpio)
    }
}

/// The set of control pins handed to the driver shell.
pub struct ModemPins<P: OutputPin> {
    /// Hardware reset, if wired.
    pub reset: Option<ControlPin<P>>,
    /// Sleep/wake control, if wired.
    pub wake: Option<ControlPin<P>>,
    /// Power-on request, if wired.
    pub power_on: Option<ControlPin<P>>,
    /// Fast shutdown, if wired.
    pub fast_shutdown: Option<ControlPin<P>>,
    /// SIM select, if wired.
    pub sim_switch: Option<ControlPin<P>>,
}

impl<P: OutputPin> Default for ModemPins<P> {
    fn default() -> Self {
        Self {
            reset: None,
            wake: None,
            power_on: None,
            fast_shutdown: None,
            sim_switch: None,
        }
    }
}

impl<P: OutputPin> ModemPins<P> {
    /// Create a pin set with nothing wired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot which output pins are wired.
    #[must_use]
    pub fn presence(&self) -> PinPresence {
        PinPresence {
            reset: self.reset.is_some(),
            wake: self.wake.is_some(),
            power_on: self.power_on.is_some(),
            fast_shutdown: self.fast_shutdown.is_some(),
            sim_switch: self.sim_switch.is_some(),
            ..PinPresence::default()
        }
    }

    /// Drive a pin by role. Driving an absent pin succeeds as a no-op.
    pub fn set(&mut self, role: PinRole, active: bool) -> Result<(), ModemError> {
        let pin = match role {
            PinRole::Reset => self.reset.as_mut(),
            PinRole::Wake => self.wake.as_mut(),
            PinRole::PowerOn => self.power_on.as_mut(),
            PinRole::FastShutdown => self.fast_shutdown.as_mut(),
            PinRole::SimSwitch => self.sim_switch.as_mut(),
        };
        match pin {
            Some(pin) => pin.set(active),
            None => Ok(()),
        }
    }
}
