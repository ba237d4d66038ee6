pub mod desktop;

use async_trait::async_trait;

use crate::error::Result;
use crate::i18n::{Language, t, t_with};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// First alert of a sickness episode.
    Sick,
    /// Second alert, fifty minutes into sickness.
    Urgent,
    /// Rest mode finished.
    Recovered,
    LevelUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub icon: &'static str,
    pub title: String,
    pub message: String,
    /// 0 (low) to 2 (high).
    pub priority: u8,
    /// Stays on screen until the user dismisses it.
    pub require_interaction: bool,
}

impl Alert {
    pub fn sick(lang: Language, max_work_time: u32) -> Self {
        Self {
            kind: AlertKind::Sick,
            icon: "icon-soul.png",
            title: t("notification.firstTitle", lang),
            message: t_with(
                "notification.firstMessage",
                lang,
                &[("maxWorkTime", &max_work_time.to_string())],
            ),
            priority: 2,
            require_interaction: true,
        }
    }

    pub fn urgent(lang: Language) -> Self {
        Self {
            kind: AlertKind::Urgent,
            icon: "icon.png",
            title: t("notification.urgentTitle", lang),
            message: t("notification.urgentMessage", lang),
            priority: 2,
            require_interaction: false,
        }
    }

    pub fn recovered(lang: Language) -> Self {
        Self {
            kind: AlertKind::Recovered,
            icon: "icon-happy.png",
            title: t("notification.restTitle", lang),
            message: t("notification.restMessage", lang),
            priority: 2,
            require_interaction: false,
        }
    }

    pub fn level_up(lang: Language, title_key: &str) -> Self {
        let title = t(title_key, lang);
        Self {
            kind: AlertKind::LevelUp,
            icon: "icon.png",
            title: t("notification.levelUpTitle", lang),
            message: t_with("notification.levelUpMessage", lang, &[("title", &title)]),
            priority: 2,
            require_interaction: false,
        }
    }
}

/// Fire-and-forget alert dispatch.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}
