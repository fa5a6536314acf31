//! Worker lifecycle phases.
//!
//! The worker moves Installing -> Waiting -> Activating -> Active. There is
//! no rollback transition: a failed install leaves the phase at Installing
//! and whatever generation was previously active stays in control. A
//! successful install is immediately eligible for activation (no waiting
//! for old clients to drain).

use m360_core::Error;
use std::fmt;

/// Lifecycle phase of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Installing,
    Waiting,
    Activating,
    Active,
}

impl Phase {
    /// Step to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(self, next: Phase) -> Result<Phase, Error> {
        match (self, next) {
            (Phase::Installing, Phase::Waiting)
            | (Phase::Waiting, Phase::Activating)
            | (Phase::Activating, Phase::Active) => Ok(next),
            _ => Err(Error::InvalidInput(format!("illegal lifecycle transition: {self} -> {next}"))),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Installing => "installing",
            Phase::Waiting => "waiting",
            Phase::Activating => "activating",
            Phase::Active => "active",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_chain() {
        let phase = Phase::Installing
            .advance(Phase::Waiting)
            .and_then(|p| p.advance(Phase::Activating))
            .and_then(|p| p.advance(Phase::Active))
            .unwrap();
        assert_eq!(phase, Phase::Active);
    }

    #[test]
    fn test_no_skipping_phases() {
        assert!(Phase::Installing.advance(Phase::Active).is_err());
        assert!(Phase::Installing.advance(Phase::Activating).is_err());
        assert!(Phase::Waiting.advance(Phase::Active).is_err());
    }

    #[test]
    fn test_no_rollback() {
        assert!(Phase::Active.advance(Phase::Installing).is_err());
        assert!(Phase::Activating.advance(Phase::Waiting).is_err());
    }

    #[test]
    fn test_display_lowercase() {
        assert_eq!(Phase::Installing.to_string(), "installing");
        assert_eq!(Phase::Active.to_string(), "active");
    }
}
