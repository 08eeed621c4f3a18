//! Chat script runner
//!
//! Pure sequential executor: `Idle → Sending(i) → Awaiting(i) → …`. The
//! runner never performs I/O; the shell transmits the requests it hands
//! out, feeds received lines back in, and reports timer expiry.
//!
//! A line is checked against the script's abort patterns first, then the
//! current step's expected responses. Response matching only starts once
//! the shell confirms the request went out, so step `i + 1`'s request can
//! never be transmitted before step `i`'s response was observed.

use embassy_time::Duration;

use super::script::{ChatScript, ScriptResult};
use crate::at::matcher::find_match;

/// Execution phase of one script run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunnerPhase {
    /// No script loaded.
    Idle,
    /// Step's request is being transmitted.
    Sending(usize),
    /// Step's request is out; awaiting a matching response.
    Awaiting(usize),
    /// Script finished with a terminal result.
    Done(ScriptResult),
}

/// What the shell must do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerStep {
    /// Transmit `request` (skip the write if empty, but still confirm with
    /// [`ChatRunner::request_sent`]), then await responses for `timeout`.
    Transmit {
        /// Request bytes without the line delimiter.
        request: &'static [u8],
        /// Response window for the step just entered.
        timeout: Duration,
    },
    /// The line belonged to the script; keep waiting.
    Pending,
    /// The line did not belong to the script; offer it to the URC table.
    Unclaimed,
    /// The script reached a terminal result.
    Finished(ScriptResult),
}

/// One script execution at a time per modem instance.
pub struct ChatRunner<C: 'static> {
    script: Option<&'static ChatScript<C>>,
    phase: RunnerPhase,
}

impl<C> ChatRunner<C> {
    /// Create an idle runner.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            script: None,
            phase: RunnerPhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> RunnerPhase {
        self.phase
    }

    /// Whether a script is in flight.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.phase, RunnerPhase::Sending(_) | RunnerPhase::Awaiting(_))
    }

    /// Name of the loaded script.
    #[must_use]
    pub fn script_name(&self) -> Option<&'static str> {
        self.script.map(|s| s.name)
    }

    /// Load a script and hand out its first request.
    pub fn start(&mut self, script: &'static ChatScript<C>) -> RunnerStep {
        if script.steps.is_empty() {
            self.phase = RunnerPhase::Done(ScriptResult::Success);
            return RunnerStep::Finished(ScriptResult::Success);
        }
        self.script = Some(script);
        self.phase = RunnerPhase::Sending(0);
        RunnerStep::Transmit {
            request: script.steps[0].request,
            timeout: script.steps[0].timeout,
        }
    }

    /// Confirm the current step's request went out over the transport.
    pub fn request_sent(&mut self) {
        if let RunnerPhase::Sending(index) = self.phase {
            self.phase = RunnerPhase::Awaiting(index);
        }
    }

    /// Feed one received line through the script.
    pub fn handle_line(&mut self, ctx: &mut C, line: &[u8]) -> RunnerStep {
        let Some(script) = self.script else {
            return RunnerStep::Unclaimed;
        };
        let RunnerPhase::Awaiting(index) = self.phase else {
            // Lines received before the request is out are not ours.
            return RunnerStep::Unclaimed;
        };

        if let Some(abort) = find_match(script.abort_matches, line) {
            if let Some(handler) = abort.handler {
                handler(ctx, &abort.parse(line));
            }
            self.phase = RunnerPhase::Done(ScriptResult::Abort);
            return RunnerStep::Finished(ScriptResult::Abort);
        }

        let step = &script.steps[index];
        match find_match(step.matches, line) {
            Some(entry) => {
                if let Some(handler) = entry.handler {
                    handler(ctx, &entry.parse(line));
                }
                let next = index + 1;
                if next < script.steps.len() {
                    self.phase = RunnerPhase::Sending(next);
                    RunnerStep::Transmit {
                        request: script.steps[next].request,
                        timeout: script.steps[next].timeout,
                    }
                } else {
                    self.phase = RunnerPhase::Done(ScriptResult::Success);
                    RunnerStep::Finished(ScriptResult::Success)
                }
            }
            None => RunnerStep::Unclaimed,
        }
    }

    /// Report that the step's response window elapsed.
    pub fn handle_timeout(&mut self) -> RunnerStep {
        if self.is_running() {
            self.phase = RunnerPhase::Done(ScriptResult::Timeout);
            RunnerStep::Finished(ScriptResult::Timeout)
        } else {
            RunnerStep::Pending
        }
    }

    /// Drop any loaded script and return to idle.
    pub fn reset(&mut self) {
        self.script = None;
        self.phase = RunnerPhase::Idle;
    }
}

impl<C> Default for ChatRunner<C> {
    fn default() -> Self {
        Self::new()
    }
}
