//! Chat script data model
//!
//! Scripts are static data: each step carries its request, the responses
//! that complete it, and a timeout. Abort matches apply to the whole
//! script; any hit terminates it immediately.

use embassy_time::Duration;

use crate::at::matcher::Match;

/// Terminal result of one script execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScriptResult {
    /// Every step saw one of its expected responses.
    Success,
    /// An abort pattern matched, or a request could not be sent.
    Abort,
    /// A step (or the script as a whole) ran out of time.
    Timeout,
}

/// One request/await-response step.
pub struct ChatStep<C: 'static> {
    /// Request to transmit, without the trailing line delimiter. An empty
    /// request transmits nothing and goes straight to awaiting a response
    /// (used to consume a trailing `OK` after a data line).
    pub request: &'static [u8],
    /// Responses that complete this step; first match wins.
    pub matches: &'static [Match<C>],
    /// How long to wait for one of `matches`.
    pub timeout: Duration,
}

impl<C> ChatStep<C> {
    /// Create a step.
    #[must_use]
    pub const fn new(
        request: &'static [u8],
        matches: &'static [Match<C>],
        timeout: Duration,
    ) -> Self {
        Self {
            request,
            matches,
            timeout,
        }
    }
}

impl<C> Clone for ChatStep<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ChatStep<C> {}

/// An ordered sequence of chat steps with a shared abort set.
pub struct ChatScript<C: 'static> {
    /// Name used in log output.
    pub name: &'static str,
    /// Steps executed strictly in order.
    pub steps: &'static [ChatStep<C>],
    /// Patterns that abort the whole script from any step.
    pub abort_matches: &'static [Match<C>],
    /// Overall budget for the whole run.
    pub timeout: Duration,
}

impl<C> ChatScript<C> {
    /// Create a script.
    #[must_use]
    pub const fn new(
        name: &'static str,
        steps: &'static [ChatStep<C>],
        abort_matches: &'static [Match<C>],
        timeout: Duration,
    ) -> Self {
        Self {
            name,
            steps,
            abort_matches,
            timeout,
        }
    }
}
