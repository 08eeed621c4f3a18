//! Network registration tracking
//!
//! Updated only by the `+CREG:` / `+CEREG:` handlers; everything else reads.

use crate::types::{RatMode, RegistrationState};

/// A registration transition worth signaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationEdge {
    /// Went from unregistered to registered.
    Registered,
    /// Went from registered to unregistered.
    Deregistered,
}

/// Current and previous registration state with the reported access
/// technology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistrationStatus {
    current: RegistrationState,
    previous: RegistrationState,
    act: Option<RatMode>,
}

impl RegistrationStatus {
    /// Create a status with both states unregistered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: RegistrationState::NotRegistered,
            previous: RegistrationState::NotRegistered,
            act: None,
        }
    }

    /// Record a newly reported state, returning the edge if the derived
    /// registered/unregistered flag changed.
    pub fn update(&mut self, new: RegistrationState) -> Option<RegistrationEdge> {
        self.previous = self.current;
        self.current = new;

        match (
            self.previous.is_registered(),
            self.current.is_registered(),
        ) {
            (false, true) => Some(RegistrationEdge::Registered),
            (true, false) => Some(RegistrationEdge::Deregistered),
            _ => None,
        }
    }

    /// Record the reported access technology.
    pub fn set_rat_mode(&mut self, act: Option<RatMode>) {
        if act.is_some() {
            self.act = act;
        }
    }

    /// Most recently reported state.
    #[must_use]
    pub const fn current(&self) -> RegistrationState {
        self.current
    }

    /// State reported before the current one.
    #[must_use]
    pub const fn previous(&self) -> RegistrationState {
        self.previous
    }

    /// Access technology the network reported, if any.
    #[must_use]
    pub const fn rat_mode(&self) -> Option<RatMode> {
        self.act
    }

    /// Whether the current state is registered (home or roaming).
    #[must_use]
    pub const fn is_registered_currently(&self) -> bool {
        self.current.is_registered()
    }

    /// Whether the previous state was registered (home or roaming).
    #[must_use]
    pub const fn is_registered_previously(&self) -> bool {
        self.previous.is_registered()
    }
}
