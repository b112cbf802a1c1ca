//! Evolution stages: the tapped object advances one stage every few taps.

use serde::Serialize;

pub const EVOLUTION_STAGES: [&str; 3] = ["Zevru Coin", "Ancient Scroll", "Chain Link"];

/// Taps needed to advance one stage.
pub const TAPS_PER_STAGE: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTracker {
    stage: usize,
    taps_this_stage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageProgress {
    pub stage: usize,
    pub name: &'static str,
    pub taps_this_stage: u32,
}

impl StageTracker {
    /// Count one tap. Returns true when this tap advanced the stage.
    pub fn record_tap(&mut self) -> bool {
        self.taps_this_stage += 1;
        if self.taps_this_stage % TAPS_PER_STAGE != 0 {
            return false;
        }
        // The counter wraps even on the last stage; the stage itself saturates.
        self.taps_this_stage = 0;
        let before = self.stage;
        self.stage = (self.stage + 1).min(EVOLUTION_STAGES.len() - 1);
        self.stage != before
    }

    pub fn progress(&self) -> StageProgress {
        StageProgress {
            stage: self.stage,
            name: EVOLUTION_STAGES[self.stage],
            taps_this_stage: self.taps_this_stage,
        }
    }
}
