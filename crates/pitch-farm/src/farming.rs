//! Farming loop state machine
//!
//! Pure transition function: no I/O, no clock reads. The runner feeds it
//! the outcome of each step together with the current time and the cached
//! next-claim instant.

use std::fmt;

/// Where the farming loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmState {
    /// Fetching the current farming window
    Checking,
    /// Sleeping one poll interval before re-evaluating
    Waiting,
    /// Claiming a finished window
    Claiming,
    /// Cancelled; terminal
    Stopped,
}

impl fmt::Display for FarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FarmState::Checking => "checking",
            FarmState::Waiting => "waiting",
            FarmState::Claiming => "claiming",
            FarmState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What just happened in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The farming status call returned (successfully or not)
    CheckFinished,
    /// The claim call returned (successfully or not)
    ClaimFinished,
    /// One poll interval has passed
    WaitElapsed,
    /// Shutdown was requested
    Cancelled,
}

/// A claim is due once the current time is strictly past the window end.
///
/// `next_claim_ms == 0` (no window known yet) is always due.
pub fn claim_due(now_ms: i64, next_claim_ms: i64) -> bool {
    now_ms > next_claim_ms
}

/// Compute the next state.
///
/// Transitions not listed below leave the state unchanged.
///
/// | State    | Transition    | Next                                  |
/// |----------|---------------|---------------------------------------|
/// | Checking | CheckFinished | Claiming if claim due, else Waiting   |
/// | Claiming | ClaimFinished | Waiting                               |
/// | Waiting  | WaitElapsed   | Claiming if claim due, else Waiting   |
/// | any      | Cancelled     | Stopped                               |
pub fn handle_transition(
    state: FarmState,
    transition: Transition,
    now_ms: i64,
    next_claim_ms: i64,
) -> FarmState {
    match (state, transition) {
        (_, Transition::Cancelled) => FarmState::Stopped,
        (FarmState::Checking, Transition::CheckFinished)
        | (FarmState::Waiting, Transition::WaitElapsed) => {
            if claim_due(now_ms, next_claim_ms) {
                FarmState::Claiming
            } else {
                FarmState::Waiting
            }
        }
        (FarmState::Claiming, Transition::ClaimFinished) => FarmState::Waiting,
        (state, _) => state,
    }
}
