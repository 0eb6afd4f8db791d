//! Run state machine.
//!
//! ```text
//! Init -> Pass1 -> Pass2 -> Aggregate -> Finalize -> Done
//!   \________\_______\__________\____________\-----> Failed(kind)
//! ```
//!
//! `Done` and `Failed` are terminal.

use std::fmt;

use spi_core::{ComputationError, ErrorKind};

/// Where a run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Validating configuration and inputs.
    Init,
    /// Computing capped cost distance per feature.
    Pass1,
    /// Converting cost distance into weighted influence per feature.
    Pass2,
    /// Summing the influence rasters.
    Aggregate,
    /// Filling, quantizing, and emitting the total.
    Finalize,
    /// The output was emitted.
    Done,
    /// The run aborted; nothing was emitted.
    Failed(ErrorKind),
}

impl RunState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// The state that follows on success, `None` for terminal states.
    pub fn successor(self) -> Option<RunState> {
        match self {
            Self::Init => Some(Self::Pass1),
            Self::Pass1 => Some(Self::Pass2),
            Self::Pass2 => Some(Self::Aggregate),
            Self::Aggregate => Some(Self::Finalize),
            Self::Finalize => Some(Self::Done),
            Self::Done | Self::Failed(_) => None,
        }
    }

    /// Whether `self -> next` is allowed.
    pub fn can_transition_to(self, next: RunState) -> bool {
        match next {
            Self::Failed(_) => !self.is_terminal(),
            _ => self.successor() == Some(next),
        }
    }

    /// Move to `next`, rejecting anything but the forward edge or a
    /// failure from a live state.
    pub fn transition(&mut self, next: RunState) -> Result<(), ComputationError> {
        if !self.can_transition_to(next) {
            return Err(ComputationError::IllegalTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Pass1 => f.write_str("pass1"),
            Self::Pass2 => f.write_str("pass2"),
            Self::Aggregate => f.write_str("aggregate"),
            Self::Finalize => f.write_str("finalize"),
            Self::Done => f.write_str("done"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_reaches_done() {
        let mut s = RunState::Init;
        for next in [
            RunState::Pass1,
            RunState::Pass2,
            RunState::Aggregate,
            RunState::Finalize,
            RunState::Done,
        ] {
            s.transition(next).unwrap();
        }
        assert_eq!(s, RunState::Done);
        assert!(s.is_terminal());
    }

    #[test]
    fn skipping_a_state_is_illegal() {
        let mut s = RunState::Pass1;
        let err = s.transition(RunState::Aggregate).unwrap_err();
        assert_eq!(
            err,
            ComputationError::IllegalTransition {
                from: "pass1".into(),
                to: "aggregate".into(),
            }
        );
        assert_eq!(s, RunState::Pass1);
    }

    #[test]
    fn any_live_state_may_fail() {
        for from in [
            RunState::Init,
            RunState::Pass1,
            RunState::Pass2,
            RunState::Aggregate,
            RunState::Finalize,
        ] {
            let mut s = from;
            s.transition(RunState::Failed(ErrorKind::Computation)).unwrap();
            assert_eq!(s, RunState::Failed(ErrorKind::Computation));
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let mut done = RunState::Done;
        assert!(done.transition(RunState::Failed(ErrorKind::Output)).is_err());
        let mut failed = RunState::Failed(ErrorKind::Precondition);
        assert!(failed.transition(RunState::Init).is_err());
        assert!(failed.transition(RunState::Failed(ErrorKind::Output)).is_err());
    }

    #[test]
    fn backwards_is_illegal() {
        let mut s = RunState::Pass2;
        assert!(s.transition(RunState::Pass1).is_err());
        assert!(s.transition(RunState::Pass2).is_err());
    }

    #[test]
    fn failed_display_includes_kind() {
        assert_eq!(
            RunState::Failed(ErrorKind::ResourceLimit).to_string(),
            "failed(resource-limit)"
        );
    }
}
