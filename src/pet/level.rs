use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub level: u32,
    pub xp_threshold: u64,
    pub title_key: &'static str,
}

/// Ordered by strictly increasing level and threshold.
pub const LEVEL_TABLE: &[Level] = &[
    Level { level: 1, xp_threshold: 0, title_key: "levels.l1" },
    Level { level: 2, xp_threshold: 50, title_key: "levels.l2" },
    Level { level: 3, xp_threshold: 150, title_key: "levels.l3" },
    Level { level: 4, xp_threshold: 350, title_key: "levels.l4" },
    Level { level: 5, xp_threshold: 700, title_key: "levels.l5" },
    Level { level: 6, xp_threshold: 1200, title_key: "levels.l6" },
    Level { level: 7, xp_threshold: 1800, title_key: "levels.l7" },
    Level { level: 8, xp_threshold: 2500, title_key: "levels.l8" },
    Level { level: 9, xp_threshold: 3500, title_key: "levels.l9" },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level: u32,
    pub title_key: &'static str,
    pub current_level_xp: u64,
    /// `None` at the top level.
    pub next_level_xp: Option<u64>,
    pub progress: u32,
}

/// Highest level whose threshold is at or below `xp`.
pub fn level_info(xp: u64) -> LevelInfo {
    let idx = LEVEL_TABLE
        .iter()
        .rposition(|l| l.xp_threshold <= xp)
        .unwrap_or(0);
    let current = LEVEL_TABLE[idx];
    let next = LEVEL_TABLE.get(idx + 1);

    let progress = match next {
        Some(next) => {
            let span = next.xp_threshold - current.xp_threshold;
            ((xp - current.xp_threshold) * 100 / span) as u32
        }
        None => 100,
    };

    LevelInfo {
        level: current.level,
        title_key: current.title_key,
        current_level_xp: current.xp_threshold,
        next_level_xp: next.map(|n| n.xp_threshold),
        progress,
    }
}
