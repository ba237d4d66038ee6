use serde::Serialize;

use crate::i18n::{Language, t};
use crate::pet::level::level_info;
use crate::pet::state::SessionState;

/// Sitting share of the limit at which the pet starts to fret.
pub const ANXIOUS_PERCENT: u64 = 70;
/// Minutes of sickness after which the pet is ascending.
pub const ASCENDING_AFTER_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Anxious,
    Sick,
    Ascending,
    Paused,
}

impl Mood {
    pub fn of(state: &SessionState, now_ms: i64) -> Self {
        if state.is_paused {
            return Mood::Paused;
        }
        if let Some(minutes) = state.sick_minutes(now_ms) {
            return if minutes >= ASCENDING_AFTER_MINUTES {
                Mood::Ascending
            } else {
                Mood::Sick
            };
        }
        let sitting = u64::from(state.sitting_minutes);
        if sitting * 100 >= u64::from(state.max_work_time) * ANXIOUS_PERCENT {
            Mood::Anxious
        } else {
            Mood::Happy
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            Mood::Happy => "HAPPY",
            Mood::Anxious => "ANXIOUS",
            Mood::Sick => "SICK",
            Mood::Ascending => "ASCENDING",
            Mood::Paused => "PAUSED",
        }
    }

    fn label_key(&self) -> &'static str {
        match self {
            Mood::Happy => "status.happy",
            Mood::Anxious => "status.anxious",
            Mood::Sick => "status.sick",
            Mood::Ascending => "status.soul",
            Mood::Paused => "status.paused",
        }
    }
}

/// Hover text for the extension icon.
pub fn tooltip(state: &SessionState, now_ms: i64) -> String {
    let lang: Language = state.language;
    let mood = Mood::of(state, now_ms);
    let info = level_info(state.xp);
    let title_line = format!("{} (Lv.{})", t(info.title_key, lang), info.level);
    let status = format!("{}{}", t("status.prefix", lang), t(mood.label_key(), lang));

    if mood == Mood::Paused {
        return format!("{}\n{}", status, title_line);
    }
    format!(
        "{}\n{}{}m{}{}m\n{}",
        status,
        t("status.sitting", lang),
        state.sitting_minutes,
        t("status.limit", lang),
        state.max_work_time,
        title_line
    )
}
