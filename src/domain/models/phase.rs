use std::fmt;

use serde::{Deserialize, Serialize};

/// Phases of one optimizer run.
///
/// `Init -> (Evaluate -> Analyze -> Refine -> Commit) x N -> RestoreBest -> Done`.
/// Refinement may be skipped, so `Analyze` can move straight to `Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Init,
    Evaluate,
    Analyze,
    Refine,
    Commit,
    RestoreBest,
    Done,
}

impl LoopPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Evaluate => "evaluate",
            Self::Analyze => "analyze",
            Self::Refine => "refine",
            Self::Commit => "commit",
            Self::RestoreBest => "restore_best",
            Self::Done => "done",
        }
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Init => vec![Self::Evaluate],
            Self::Evaluate => vec![Self::Analyze],
            Self::Analyze => vec![Self::Refine, Self::Commit],
            Self::Refine => vec![Self::Commit],
            Self::Commit => vec![Self::Evaluate, Self::RestoreBest],
            Self::RestoreBest => vec![Self::Done],
            Self::Done => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
