//! The mutable session state and its mapping onto the flat key-value store.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::i18n::Language;
use crate::pet::level::{LevelInfo, level_info};
use crate::pet::mood::{Mood, tooltip};

pub const DEFAULT_MAX_WORK_MINUTES: u32 = 45;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
/// Longest work limit or break the settings accept, one day.
pub const MAX_SETTING_MINUTES: u32 = 24 * 60;

pub const KEY_MAX_WORK_TIME: &str = "maxWorkTime";
pub const KEY_BREAK_DURATION: &str = "breakDuration";
pub const KEY_IS_PAUSED: &str = "isPaused";
pub const KEY_SITTING_MINUTES: &str = "sittingMinutes";
pub const KEY_LAST_UPDATE_TIME: &str = "lastUpdateTime";
pub const KEY_NOTIFICATION_SENT: &str = "notificationSent";
pub const KEY_SECOND_NOTIFICATION_SENT: &str = "secondNotificationSent";
pub const KEY_SICK_START_TIME: &str = "sickStartTime";
pub const KEY_NOTIFICATION_ENABLED: &str = "notificationEnabled";
pub const KEY_ZEN_MODE: &str = "zenMode";
pub const KEY_XP: &str = "xp";
pub const KEY_LAST_LOGIN_DATE: &str = "lastLoginDate";
pub const KEY_REST_START_TIME: &str = "restStartTime";
pub const KEY_LANGUAGE: &str = "language";

pub const ALL_KEYS: &[&str] = &[
    KEY_MAX_WORK_TIME,
    KEY_BREAK_DURATION,
    KEY_IS_PAUSED,
    KEY_SITTING_MINUTES,
    KEY_LAST_UPDATE_TIME,
    KEY_NOTIFICATION_SENT,
    KEY_SECOND_NOTIFICATION_SENT,
    KEY_SICK_START_TIME,
    KEY_NOTIFICATION_ENABLED,
    KEY_ZEN_MODE,
    KEY_XP,
    KEY_LAST_LOGIN_DATE,
    KEY_REST_START_TIME,
    KEY_LANGUAGE,
];

/// Which group of fields a write covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistScope {
    /// Everything the tick loop mutates.
    Session,
    /// Only the pause flag.
    Pause,
    /// Only the zen flag.
    Zen,
    /// User-tunable thresholds and toggles.
    Settings,
}

impl PersistScope {
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            PersistScope::Session => &[
                KEY_IS_PAUSED,
                KEY_SITTING_MINUTES,
                KEY_LAST_UPDATE_TIME,
                KEY_NOTIFICATION_SENT,
                KEY_SECOND_NOTIFICATION_SENT,
                KEY_SICK_START_TIME,
                KEY_XP,
                KEY_LAST_LOGIN_DATE,
                KEY_REST_START_TIME,
            ],
            PersistScope::Pause => &[KEY_IS_PAUSED],
            PersistScope::Zen => &[KEY_ZEN_MODE],
            PersistScope::Settings => &[
                KEY_MAX_WORK_TIME,
                KEY_BREAK_DURATION,
                KEY_NOTIFICATION_ENABLED,
                KEY_LANGUAGE,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Minutes of sitting before the pet gets sick.
    pub max_work_time: u32,
    /// Minutes of rest or idleness needed to recover.
    pub break_duration: u32,
    pub is_paused: bool,
    pub sitting_minutes: u32,
    /// Epoch millis of the last tick the user was seen active.
    pub last_update_time: i64,
    pub notification_sent: bool,
    pub second_notification_sent: bool,
    pub sick_start_time: Option<i64>,
    pub notification_enabled: bool,
    pub zen_mode: bool,
    pub xp: u64,
    pub last_login_date: Option<NaiveDate>,
    pub rest_start_time: Option<i64>,
    pub language: Language,
    /// Ticks since process start; never persisted.
    #[serde(skip)]
    pub tick_count: u64,
}

impl SessionState {
    pub fn new(now_ms: i64) -> Self {
        Self {
            max_work_time: DEFAULT_MAX_WORK_MINUTES,
            break_duration: DEFAULT_BREAK_MINUTES,
            is_paused: false,
            sitting_minutes: 0,
            last_update_time: now_ms,
            notification_sent: false,
            second_notification_sent: false,
            sick_start_time: None,
            notification_enabled: true,
            zen_mode: false,
            xp: 0,
            last_login_date: None,
            rest_start_time: None,
            language: Language::default(),
            tick_count: 0,
        }
    }

    /// Build state from stored entries, substituting defaults key by key.
    pub fn from_stored(stored: &Map<String, Value>, now_ms: i64) -> Self {
        let d = Self::new(now_ms);
        let mut state = Self {
            max_work_time: field(stored, KEY_MAX_WORK_TIME, d.max_work_time),
            break_duration: field(stored, KEY_BREAK_DURATION, d.break_duration),
            is_paused: field(stored, KEY_IS_PAUSED, d.is_paused),
            sitting_minutes: field(stored, KEY_SITTING_MINUTES, d.sitting_minutes),
            last_update_time: field(stored, KEY_LAST_UPDATE_TIME, d.last_update_time),
            notification_sent: field(stored, KEY_NOTIFICATION_SENT, d.notification_sent),
            second_notification_sent: field(
                stored,
                KEY_SECOND_NOTIFICATION_SENT,
                d.second_notification_sent,
            ),
            sick_start_time: field(stored, KEY_SICK_START_TIME, d.sick_start_time),
            notification_enabled: field(stored, KEY_NOTIFICATION_ENABLED, d.notification_enabled),
            zen_mode: field(stored, KEY_ZEN_MODE, d.zen_mode),
            xp: field(stored, KEY_XP, d.xp),
            last_login_date: field(stored, KEY_LAST_LOGIN_DATE, d.last_login_date),
            rest_start_time: field(stored, KEY_REST_START_TIME, d.rest_start_time),
            language: field(stored, KEY_LANGUAGE, d.language),
            tick_count: 0,
        };

        if !minutes_in_range(state.max_work_time) {
            state.max_work_time = d.max_work_time;
        }
        if !minutes_in_range(state.break_duration) {
            state.break_duration = d.break_duration;
        }
        // A stored rest without the pause flag predates isPaused being persisted.
        if state.rest_start_time.is_some() {
            state.is_paused = true;
        }
        if state.sick_start_time.is_some() && state.sitting_minutes < state.max_work_time {
            state.sick_start_time = None;
            state.notification_sent = false;
            state.second_notification_sent = false;
        }
        state
    }

    /// The subset of fields covered by `scope`, keyed as in the store.
    pub fn entries(&self, scope: PersistScope) -> Map<String, Value> {
        let mut all = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        all.retain(|k, _| scope.keys().contains(&k.as_str()));
        all
    }

    /// Mirror a setting that changed underneath us in the store.
    ///
    /// Returns whether anything changed.
    pub fn mirror_external(&mut self, key: &str, value: &Value) -> bool {
        fn parse<T: DeserializeOwned>(key: &str, value: &Value) -> Option<T> {
            match serde_json::from_value(value.clone()) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(key, error = %e, "ignoring malformed external change");
                    None
                }
            }
        }

        match key {
            KEY_MAX_WORK_TIME => match parse::<u32>(key, value) {
                Some(v) if minutes_in_range(v) && v != self.max_work_time => {
                    self.max_work_time = v;
                    true
                }
                _ => false,
            },
            KEY_BREAK_DURATION => match parse::<u32>(key, value) {
                Some(v) if minutes_in_range(v) && v != self.break_duration => {
                    self.break_duration = v;
                    true
                }
                _ => false,
            },
            KEY_NOTIFICATION_ENABLED => match parse::<bool>(key, value) {
                Some(v) if v != self.notification_enabled => {
                    self.notification_enabled = v;
                    true
                }
                _ => false,
            },
            KEY_ZEN_MODE => match parse::<bool>(key, value) {
                Some(v) if v != self.zen_mode => {
                    self.zen_mode = v;
                    true
                }
                _ => false,
            },
            KEY_LANGUAGE => match parse::<Language>(key, value) {
                Some(v) if v != self.language => {
                    self.language = v;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn is_sick(&self) -> bool {
        self.sitting_minutes >= self.max_work_time
    }

    pub fn is_resting(&self) -> bool {
        self.rest_start_time.is_some()
    }

    /// Whole minutes since the sickness episode began, if there is one.
    pub fn sick_minutes(&self, now_ms: i64) -> Option<i64> {
        self.sick_start_time
            .map(|start| (now_ms - start).max(0) / 60_000)
    }

    /// Healthy again: clears the sickness episode and re-arms both alerts.
    pub fn recover(&mut self) {
        self.sitting_minutes = 0;
        self.sick_start_time = None;
        self.notification_sent = false;
        self.second_notification_sent = false;
    }

    pub fn snapshot(&self, now_ms: i64) -> StateSnapshot {
        StateSnapshot {
            state: self.clone(),
            level_info: level_info(self.xp),
            mood: Mood::of(self, now_ms),
            tooltip: tooltip(self, now_ms),
        }
    }
}

pub(crate) fn minutes_in_range(minutes: u32) -> bool {
    (1..=MAX_SETTING_MINUTES).contains(&minutes)
}

fn field<T: DeserializeOwned>(stored: &Map<String, Value>, key: &str, default: T) -> T {
    match stored.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(key, error = %e, "stored value unreadable, using default");
            default
        }),
    }
}

/// What the UI gets for `getState` and `xpUpdated`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(flatten)]
    pub state: SessionState,
    pub level_info: LevelInfo,
    pub mood: Mood,
    pub tooltip: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn empty_store_yields_defaults() {
        let state = SessionState::from_stored(&Map::new(), 1_000);
        assert_eq!(state, SessionState::new(1_000));
        assert_eq!(state.max_work_time, 45);
        assert_eq!(state.break_duration, 5);
        assert!(state.notification_enabled);
        assert_eq!(state.language, Language::Zh);
    }

    #[test]
    fn stored_values_override_defaults_field_by_field() {
        let stored = map(json!({
            "maxWorkTime": 30,
            "xp": 120,
            "language": "en",
            "lastLoginDate": "2026-10-15",
            "sickStartTime": null,
        }));
        let state = SessionState::from_stored(&stored, 0);
        assert_eq!(state.max_work_time, 30);
        assert_eq!(state.break_duration, 5);
        assert_eq!(state.xp, 120);
        assert_eq!(state.language, Language::En);
        assert_eq!(state.last_login_date, NaiveDate::from_ymd_opt(2026, 10, 15));
        assert_eq!(state.sick_start_time, None);
    }

    #[test]
    fn malformed_values_fall_back() {
        let stored = map(json!({ "xp": "lots", "maxWorkTime": 0, "language": "fr" }));
        let state = SessionState::from_stored(&stored, 0);
        assert_eq!(state.xp, 0);
        assert_eq!(state.max_work_time, 45);
        assert_eq!(state.language, Language::Zh);
    }

    #[test]
    fn out_of_range_durations_fall_back_to_defaults() {
        let stored = map(json!({ "maxWorkTime": 100_000_000, "breakDuration": 0 }));
        let state = SessionState::from_stored(&stored, 0);
        assert_eq!(state.max_work_time, DEFAULT_MAX_WORK_MINUTES);
        assert_eq!(state.break_duration, DEFAULT_BREAK_MINUTES);
    }

    #[test]
    fn stored_rest_implies_paused() {
        let stored = map(json!({ "restStartTime": 5, "isPaused": false }));
        let state = SessionState::from_stored(&stored, 0);
        assert!(state.is_paused);
    }

    #[test]
    fn stale_sickness_is_dropped_on_load() {
        let stored = map(json!({
            "sittingMinutes": 3,
            "sickStartTime": 100,
            "notificationSent": true,
        }));
        let state = SessionState::from_stored(&stored, 0);
        assert_eq!(state.sick_start_time, None);
        assert!(!state.notification_sent);
    }

    #[test]
    fn entries_respect_scope() {
        let state = SessionState::new(0);
        let pause = state.entries(PersistScope::Pause);
        assert_eq!(pause.len(), 1);
        assert_eq!(pause.get("isPaused"), Some(&json!(false)));

        let session = state.entries(PersistScope::Session);
        assert!(session.contains_key("xp"));
        assert!(session.contains_key("sickStartTime"));
        assert!(!session.contains_key("maxWorkTime"));
        assert!(!session.contains_key("tickCount"));
        // Settings the user edits elsewhere are never rewritten by ticks.
        assert!(!session.contains_key("language"));
        assert!(!session.contains_key("zenMode"));

        let zen = state.entries(PersistScope::Zen);
        assert_eq!(zen.get("zenMode"), Some(&json!(false)));
        assert_eq!(zen.len(), 1);

        let settings = state.entries(PersistScope::Settings);
        assert_eq!(settings.get("maxWorkTime"), Some(&json!(45)));
        assert!(!settings.contains_key("xp"));
    }

    #[test]
    fn entries_load_back_to_same_state() {
        let mut state = SessionState::new(42);
        state.xp = 77;
        state.sitting_minutes = 50;
        state.sick_start_time = Some(40);
        state.last_login_date = NaiveDate::from_ymd_opt(2026, 1, 2);
        state.zen_mode = true;
        state.language = Language::En;
        let mut all = state.entries(PersistScope::Session);
        all.extend(state.entries(PersistScope::Settings));
        all.extend(state.entries(PersistScope::Zen));
        assert_eq!(SessionState::from_stored(&all, 0), state);
    }

    #[test]
    fn mirror_only_touches_settings() {
        let mut state = SessionState::new(0);
        assert!(state.mirror_external("maxWorkTime", &json!(60)));
        assert_eq!(state.max_work_time, 60);
        assert!(!state.mirror_external("maxWorkTime", &json!(60)));
        assert!(!state.mirror_external("maxWorkTime", &json!(0)));
        assert!(!state.mirror_external("maxWorkTime", &json!(100_000_000)));
        assert_eq!(state.max_work_time, 60);
        assert!(state.mirror_external("language", &json!("en")));
        assert!(!state.mirror_external("xp", &json!(9000)));
        assert_eq!(state.xp, 0);
    }

    #[test]
    fn snapshot_flattens_state() {
        let state = SessionState::new(0);
        let json = serde_json::to_value(state.snapshot(0)).unwrap();
        assert_eq!(json["maxWorkTime"], json!(45));
        assert_eq!(json["levelInfo"]["level"], json!(1));
        assert_eq!(json["mood"], json!("happy"));
        assert!(json["tooltip"].as_str().unwrap().contains("Lv.1"));
    }
}
