/*!
 * Diagnoser State Machine
 */

use super::signals::HostSignal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-case lifecycle state
///
/// `Collecting` is never stored: the controller reports it while armed and
/// the measurement window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnoserState {
    Idle,
    SessionOpen,
    ProvidersArmed,
    Collecting,
    Stopped,
}

impl DiagnoserState {
    /// Next state for a host signal, or `None` when the signal is a no-op here
    pub fn transition(self, signal: HostSignal) -> Option<DiagnoserState> {
        use DiagnoserState::*;
        match (self, signal) {
            (Idle | Stopped, HostSignal::BeforeProcessStart) => Some(SessionOpen),
            (SessionOpen, HostSignal::BeforeAnythingElse) => Some(SessionOpen),
            (SessionOpen, HostSignal::BeforeActualRun) => Some(ProvidersArmed),
            (ProvidersArmed | Collecting, HostSignal::AfterActualRun) => Some(Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for DiagnoserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnoserState::Idle => "IDLE",
            DiagnoserState::SessionOpen => "SESSION_OPEN",
            DiagnoserState::ProvidersArmed => "PROVIDERS_ARMED",
            DiagnoserState::Collecting => "COLLECTING",
            DiagnoserState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}
