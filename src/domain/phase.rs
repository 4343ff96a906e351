// ============================================================
// Layer 3 — Trainer Phases
// ============================================================
//   Uninitialized → Built → Running ⇄ Checkpointing → Stopped

use std::fmt;

use crate::domain::error::{GanError, GanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    Uninitialized,
    Built,
    Running,
    Checkpointing,
    Stopped,
}

impl TrainerPhase {
    fn allows(self, next: TrainerPhase) -> bool {
        use TrainerPhase::*;
        matches!(
            (self, next),
            (Uninitialized, Built)
                | (Built, Running)
                | (Running, Checkpointing)
                | (Checkpointing, Running)
                | (Running, Stopped)
        )
    }

    /// Move to `next`, or fail if the lifecycle forbids it.
    pub fn advance(&mut self, next: TrainerPhase) -> GanResult<()> {
        if !self.allows(next) {
            return Err(GanError::config(format!(
                "trainer cannot move from {self} to {next}"
            )));
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for TrainerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Built         => "BUILT",
            Self::Running       => "RUNNING",
            Self::Checkpointing => "CHECKPOINTING",
            Self::Stopped       => "STOPPED",
        };
        f.write_str(name)
    }
}
