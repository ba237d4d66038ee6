//! Wire shapes of the command channel.

use serde::{Deserialize, Serialize};

use crate::i18n::Language;
use crate::pet::state::StateSnapshot;
use crate::probe::IdleState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    GetState,
    SetPause {
        #[serde(rename = "isPaused")]
        is_paused: bool,
    },
    ResetTimer,
    StartRest,
    StopRest,
    UpdateSettings(SettingsUpdate),
    SetZenMode {
        #[serde(rename = "zenMode")]
        zen_mode: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub max_work_time: Option<u32>,
    pub break_duration: Option<u32>,
    pub notification_enabled: Option<bool>,
    pub language: Option<Language>,
}

/// Activity readings pushed by the extension; these get no reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActivityReport {
    IdleState { state: IdleState },
    TabUpdate {
        url: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        domain: Option<String>,
    },
}

/// Anything the extension may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Command(Command),
    Activity(ActivityReport),
}

impl Frame {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punished: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    State(Box<StateSnapshot>),
    Outcome(Outcome),
}

/// Pushed to every listening client after an XP change.
#[derive(Debug, Clone, Serialize)]
pub struct XpUpdated {
    pub action: &'static str,
    pub state: StateSnapshot,
}

impl XpUpdated {
    pub fn new(state: StateSnapshot) -> Self {
        Self {
            action: "xpUpdated",
            state,
        }
    }
}
