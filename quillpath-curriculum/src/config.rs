//! Curriculum configuration.
//!
//! Gate thresholds and XP constants are product decisions, so they live
//! here as data rather than in the graph algorithms.

use crate::graph::Level;
use crate::standard;
use quillpath_types::{Category, LevelId};
use serde::{Deserialize, Serialize};

/// Progress threshold that opens a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGate {
    /// Category being gated.
    pub category: Category,
    /// Level whose progress is checked.
    pub gate_level: LevelId,
    /// Minimum percentage (inclusive) on `gate_level`.
    pub threshold: u8,
}

/// Score-to-rank curve. Rank `n + 1` needs `base * growth^(n - 1)` more
/// points than rank `n`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XpCurve {
    pub base: u64,
    pub growth: f64,
}

impl Default for XpCurve {
    fn default() -> Self {
        Self {
            base: 100,
            growth: 1.5,
        }
    }
}

const MAX_RANK: u32 = 999;

impl XpCurve {
    /// Rank reached with `xp` accumulated points. Ranks start at 1.
    pub fn rank_for(&self, xp: u64) -> u32 {
        if self.base == 0 || self.growth < 1.0 {
            return 1;
        }
        let mut rank = 1;
        let mut remaining = xp as f64;
        let mut needed = self.base as f64;
        while remaining >= needed && rank < MAX_RANK {
            remaining -= needed;
            needed *= self.growth;
            rank += 1;
        }
        rank
    }

    /// Total points needed to reach `rank`.
    pub fn xp_for_rank(&self, rank: u32) -> u64 {
        let mut total = 0.0;
        let mut step = self.base as f64;
        for _ in 1..rank.min(MAX_RANK) {
            total += step;
            step *= self.growth;
        }
        total.ceil() as u64
    }
}

/// Full curriculum definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurriculumConfig {
    /// Level every learner starts on.
    pub default_level: LevelId,
    pub levels: Vec<Level>,
    #[serde(default)]
    pub gates: Vec<CategoryGate>,
    #[serde(default)]
    pub xp_curve: XpCurve,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            default_level: LevelId::new(standard::ENTRY_LEVEL),
            levels: standard::levels(),
            gates: vec![
                CategoryGate {
                    category: Category::Sequencing,
                    gate_level: LevelId::new("mechanics-2"),
                    threshold: 70,
                },
                CategoryGate {
                    category: Category::Voice,
                    gate_level: LevelId::new("sequencing-2"),
                    threshold: 60,
                },
            ],
            xp_curve: XpCurve::default(),
        }
    }
}
