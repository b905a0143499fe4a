//! Session-loss state machines using rust-fsm.
//!
//! Logout and expiration handling are tracked by two independent machines.
//! The coordinator reports `LoggingOut` whenever a logout is running, even
//! if an expiration episode is still open underneath it.
//!
//! ## State Diagram
//!
//! ```text
//!   logout_machine                    expiration_machine
//!
//!   ┌──────┐ LogoutStarted ┌────────────┐   ┌──────┐ ExpirationDetected ┌────────────────────┐
//!   │ Idle ├──────────────►│ LoggingOut │   │ Idle ├───────────────────►│ HandlingExpiration │
//!   └──────┘◄──────────────┴────────────┘   └──────┘◄───────────────────┴────────────────────┘
//!      LogoutFinished / SafetyValveElapsed            ExpirationSettled
//! ```
//!
//! Neither machine ever moves the other. An expiration trigger seen while
//! logging out is dropped before it reaches `expiration_machine`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub logout_machine(Idle)

    Idle => {
        LogoutStarted => LoggingOut
    },
    LoggingOut => {
        // A repeated start restarts the safety valve
        LogoutStarted => LoggingOut,
        LogoutFinished => Idle,
        SafetyValveElapsed => Idle
    }
}

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub expiration_machine(Idle)

    Idle => {
        ExpirationDetected => HandlingExpiration
    },
    HandlingExpiration => {
        ExpirationSettled => Idle
    }
}

pub use expiration_machine::Input as ExpirationMachineInput;
pub use expiration_machine::State as ExpirationMachineState;
pub use expiration_machine::StateMachine as ExpirationMachine;
pub use logout_machine::Input as LogoutMachineInput;
pub use logout_machine::State as LogoutMachineState;
pub use logout_machine::StateMachine as LogoutMachine;

/// Coordinator phase for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Expiration triggers are acted on.
    Idle,
    /// An intentional logout is running; expiration triggers are ignored.
    LoggingOut,
    /// A session-loss episode is being handled; further triggers are ignored.
    HandlingExpiration,
}

impl SessionPhase {
    /// Combine both machines. A running logout takes precedence.
    pub fn of(logout: &LogoutMachineState, expiration: &ExpirationMachineState) -> Self {
        match (logout, expiration) {
            (LogoutMachineState::LoggingOut, _) => SessionPhase::LoggingOut,
            (LogoutMachineState::Idle, ExpirationMachineState::HandlingExpiration) => {
                SessionPhase::HandlingExpiration
            }
            (LogoutMachineState::Idle, ExpirationMachineState::Idle) => SessionPhase::Idle,
        }
    }
}
