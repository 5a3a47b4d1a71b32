//! Training pipeline state machine.

use crate::error::{PipelineError, PipelineResult};

/// Stage of a training run.
///
/// ```text
/// NotStarted → Extracting → Registering → Exporting → Done
///                   │            │            │
///                   └────────────┴────────────┴──→ Failed
/// ```
///
/// `Extracting → Exporting` is allowed for runs that skip registration.
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    /// No work has been done.
    #[default]
    NotStarted,
    /// Bone surfaces are being extracted and processed.
    Extracting,
    /// Registration passes are running.
    Registering,
    /// Output files are being written.
    Exporting,
    /// The run finished and every output was written.
    Done,
    /// The run stopped on an error; nothing further happens.
    Failed,
}

impl PipelineState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self → next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Extracting)
                | (Self::Extracting, Self::Registering | Self::Exporting)
                | (Self::Registering, Self::Exporting)
                | (Self::Exporting, Self::Done)
                | (Self::NotStarted | Self::Extracting | Self::Registering | Self::Exporting, Self::Failed)
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] for an illegal move.
    pub fn transition(&mut self, next: Self) -> PipelineResult<()> {
        if !self.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Extracting => "extracting",
            Self::Registering => "registering",
            Self::Exporting => "exporting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn full_run() {
        let mut state = PipelineState::default();
        for next in [
            PipelineState::Extracting,
            PipelineState::Registering,
            PipelineState::Exporting,
            PipelineState::Done,
        ] {
            state.transition(next).unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [PipelineState::Done, PipelineState::Failed] {
            let mut state = terminal;
            assert!(state.transition(PipelineState::Extracting).is_err());
            assert!(state.transition(PipelineState::Failed).is_err());
            assert_eq!(state, terminal);
        }
    }

    #[test]
    fn no_skipping_ahead() {
        let mut state = PipelineState::NotStarted;
        assert!(matches!(
            state.transition(PipelineState::Registering),
            Err(PipelineError::InvalidTransition { .. })
        ));
        state.transition(PipelineState::Extracting).unwrap();
        assert!(state.transition(PipelineState::Done).is_err());
        state.transition(PipelineState::Exporting).unwrap();
    }
}
