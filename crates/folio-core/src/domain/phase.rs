//! Run lifecycle phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phases of a single run, in the only order they may be entered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    RegistryLoaded,
    AssetsPrefetched,
    ModulesExecuted,
    Assembled,
    Done,
}

impl RunPhase {
    /// The phase that follows this one, or `None` after `Done`.
    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::Init => Some(RunPhase::RegistryLoaded),
            RunPhase::RegistryLoaded => Some(RunPhase::AssetsPrefetched),
            RunPhase::AssetsPrefetched => Some(RunPhase::ModulesExecuted),
            RunPhase::ModulesExecuted => Some(RunPhase::Assembled),
            RunPhase::Assembled => Some(RunPhase::Done),
            RunPhase::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Init => "init",
            RunPhase::RegistryLoaded => "registry_loaded",
            RunPhase::AssetsPrefetched => "assets_prefetched",
            RunPhase::ModulesExecuted => "modules_executed",
            RunPhase::Assembled => "assembled",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_linearly_to_done() {
        let mut phase = RunPhase::Init;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(next > phase);
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(phase, RunPhase::Done);
    }
}
