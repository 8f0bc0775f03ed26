//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!              ┌─────────────┐
//!              │   Unknown   │ (initial)
//!              └──────┬──────┘
//!        NoToken      │ TokenFound / LoginSubmitted
//!     ┌───────────────┤
//!     │               ▼
//!     │        ┌─────────────┐  ProbeSucceeded  ┌───────────────┐
//!     │        │  Checking   │ ───────────────► │ Authenticated │
//!     │        └──────┬──────┘                  └───────┬───────┘
//!     │               │ LogoutCompleted                 │ LoginSubmitted ──► Checking
//!     ▼               ▼                                 │ LogoutCompleted
//! ┌──────────────────────┐ ◄────────────────────────────┘
//! │   Unauthenticated    │
//! └──────────────────────┘
//!        LoginSubmitted ──► Checking
//! ```
//!
//! A failed probe always goes through the logout sequence, so `Checking`
//! only ever leaves via `ProbeSucceeded` or `LogoutCompleted`.

use crown_storage::UserIdentity;
use rust_fsm::*;
use serde::Serialize;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub session_machine(Unknown)

    Unknown => {
        NoToken => Unauthenticated,
        TokenFound => Checking,
        LoginSubmitted => Checking,
        LogoutCompleted => Unauthenticated
    },
    Checking => {
        ProbeSucceeded => Authenticated,
        LogoutCompleted => Unauthenticated
    },
    Authenticated => {
        LoginSubmitted => Checking,
        LogoutCompleted => Unauthenticated
    },
    Unauthenticated => {
        LoginSubmitted => Checking,
        LogoutCompleted => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state as observers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum SessionState {
    /// Startup check has not run yet.
    Unknown,
    /// A token is being verified against the backend.
    Checking,
    /// The backend confirmed the token.
    Authenticated(UserIdentity),
    /// No usable session.
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Identity of the signed-in user, if any.
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Project a machine state onto the observable state.
    ///
    /// `Authenticated` without a cached identity falls back to an empty one.
    pub fn from_machine(state: &SessionMachineState, identity: Option<&UserIdentity>) -> Self {
        match state {
            SessionMachineState::Unknown => SessionState::Unknown,
            SessionMachineState::Checking => SessionState::Checking,
            SessionMachineState::Authenticated => {
                SessionState::Authenticated(identity.cloned().unwrap_or_default())
            }
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_unknown() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Unknown);
    }

    #[test]
    fn test_startup_without_token() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::NoToken).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_startup_with_token_probe_succeeds() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::TokenFound).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Checking);

        machine.consume(&SessionMachineInput::ProbeSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_probe_failure_exits_checking_via_logout() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::TokenFound).unwrap();

        machine.consume(&SessionMachineInput::LogoutCompleted).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_login_from_every_settled_state() {
        for setup in [
            vec![],
            vec![SessionMachineInput::NoToken],
            vec![
                SessionMachineInput::TokenFound,
                SessionMachineInput::ProbeSucceeded,
            ],
        ] {
            let mut machine = SessionMachine::new();
            for input in &setup {
                machine.consume(input).unwrap();
            }
            machine.consume(&SessionMachineInput::LoginSubmitted).unwrap();
            assert_eq!(*machine.state(), SessionMachineState::Checking);
        }
    }

    #[test]
    fn test_cannot_login_while_checking() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::TokenFound).unwrap();

        let result = machine.consume(&SessionMachineInput::LoginSubmitted);
        assert!(result.is_err());
        assert_eq!(*machine.state(), SessionMachineState::Checking);
    }

    #[test]
    fn test_cannot_skip_probe() {
        let mut machine = SessionMachine::new();
        assert!(machine
            .consume(&SessionMachineInput::ProbeSucceeded)
            .is_err());

        machine.consume(&SessionMachineInput::NoToken).unwrap();
        assert!(machine
            .consume(&SessionMachineInput::ProbeSucceeded)
            .is_err());
    }

    #[test]
    fn test_logout_from_any_state() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LogoutCompleted).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);

        machine.consume(&SessionMachineInput::LogoutCompleted).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);

        machine.consume(&SessionMachineInput::LoginSubmitted).unwrap();
        machine.consume(&SessionMachineInput::ProbeSucceeded).unwrap();
        machine.consume(&SessionMachineInput::LogoutCompleted).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_session_state_projection() {
        let identity = UserIdentity::from_nickname("crowny");

        assert_eq!(
            SessionState::from_machine(&SessionMachineState::Unknown, None),
            SessionState::Unknown
        );
        assert_eq!(
            SessionState::from_machine(&SessionMachineState::Checking, Some(&identity)),
            SessionState::Checking
        );
        assert_eq!(
            SessionState::from_machine(&SessionMachineState::Authenticated, Some(&identity)),
            SessionState::Authenticated(identity.clone())
        );
        assert_eq!(
            SessionState::from_machine(&SessionMachineState::Unauthenticated, Some(&identity)),
            SessionState::Unauthenticated
        );
    }

    #[test]
    fn test_session_state_helpers() {
        let authed = SessionState::Authenticated(UserIdentity::from_nickname("crowny"));
        assert!(authed.is_authenticated());
        assert_eq!(authed.identity().map(|i| i.nickname.as_str()), Some("crowny"));

        for state in [
            SessionState::Unknown,
            SessionState::Checking,
            SessionState::Unauthenticated,
        ] {
            assert!(!state.is_authenticated());
            assert!(state.identity().is_none());
        }
    }

    #[test]
    fn test_session_state_serialization() {
        let json = serde_json::to_value(SessionState::Authenticated(
            UserIdentity::from_nickname("crowny"),
        ))
        .unwrap();
        assert_eq!(json["state"], "authenticated");
        assert_eq!(json["identity"]["nickname"], "crowny");

        let json = serde_json::to_value(SessionState::Unauthenticated).unwrap();
        assert_eq!(json["state"], "unauthenticated");
    }
}
