//! The sitting / health / XP state machine.
//!
//! Every transition mutates [`SessionState`] in place and returns the side
//! effects it wants, in order. Nothing here touches the store, the notifier
//! or the clock; the tracker applies the effects.

use chrono::NaiveDate;
use tracing::info;

use crate::command::{Command, Outcome, Reply, SettingsUpdate};
use crate::error::Error;
use crate::notify::Alert;
use crate::pet::level::level_info;
use crate::pet::state::{MAX_SETTING_MINUTES, PersistScope, SessionState, minutes_in_range};
use crate::probe::IdleState;

pub const TICKS_PER_MINUTE: u64 = 6;

pub const XP_HEALTHY_TICK: i64 = 1;
pub const XP_SICK_TICK: i64 = -1;
pub const XP_SICK_ONSET: i64 = -50;
pub const XP_ASCENDED_PENALTY: i64 = -100;
pub const XP_REST_BONUS: i64 = 20;
pub const XP_IDLE_BONUS: i64 = 10;
pub const XP_DAILY_BONUS: i64 = 20;
pub const XP_RESET_PENALTY: i64 = -30;

/// Sick minutes before the second, urgent alert.
pub const URGENT_AFTER_MINUTES: i64 = 50;
/// Sick minutes before the recurring penalty starts.
pub const PENALTY_AFTER_MINUTES: i64 = 60;
pub const PENALTY_EVERY_MINUTES: i64 = 5;

const MINUTE_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Alert),
    Persist(PersistScope),
    /// Broadcast the current snapshot to listeners.
    XpChanged,
    RefreshTooltip,
}

impl SessionState {
    /// Adjust XP, floor-clamped at zero.
    pub fn apply_xp(&mut self, delta: i64, effects: &mut Vec<Effect>) {
        let old_level = level_info(self.xp).level;
        self.xp = if delta >= 0 {
            self.xp.saturating_add(delta.unsigned_abs())
        } else {
            self.xp.saturating_sub(delta.unsigned_abs())
        };
        let new_info = level_info(self.xp);

        if new_info.level > old_level {
            info!(level = new_info.level, xp = self.xp, "level up");
            if self.notification_enabled {
                effects.push(Effect::Notify(Alert::level_up(
                    self.language,
                    new_info.title_key,
                )));
            }
        }
        effects.push(Effect::Persist(PersistScope::Session));
        effects.push(Effect::XpChanged);
    }

    /// First start on a new calendar day earns a bonus.
    pub fn claim_daily_bonus(&mut self, today: NaiveDate) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.last_login_date == Some(today) {
            return effects;
        }
        info!(%today, "daily bonus");
        self.apply_xp(XP_DAILY_BONUS, &mut effects);
        self.last_login_date = Some(today);
        effects.push(Effect::Persist(PersistScope::Session));
        effects
    }

    /// Tick while in rest mode. Returns nothing until the rest is complete.
    pub fn rest_tick(&mut self, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(start) = self.rest_start_time else {
            return effects;
        };
        if now_ms - start < self.break_duration as i64 * MINUTE_MS {
            return effects;
        }

        info!("rest complete, pet recovered");
        self.recover();
        self.rest_start_time = None;
        self.is_paused = false;
        self.apply_xp(XP_REST_BONUS, &mut effects);
        if self.notification_enabled {
            effects.push(Effect::Notify(Alert::recovered(self.language)));
        }
        effects.push(Effect::Persist(PersistScope::Session));
        effects.push(Effect::RefreshTooltip);
        effects
    }

    /// Tick outside rest mode, given what the probe saw.
    pub fn activity_tick(&mut self, reading: IdleState, now_ms: i64) -> Vec<Effect> {
        match reading {
            IdleState::Active if self.is_paused => Vec::new(),
            IdleState::Active => self.active_tick(now_ms),
            IdleState::Idle | IdleState::Locked => self.idle_tick(now_ms),
        }
    }

    fn active_tick(&mut self, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.tick_count += 1;
        self.last_update_time = now_ms;

        if self.is_sick() {
            self.apply_xp(XP_SICK_TICK, &mut effects);
        } else {
            self.apply_xp(XP_HEALTHY_TICK, &mut effects);
        }

        if self.tick_count % TICKS_PER_MINUTE == 0 {
            self.sitting_minutes = self.sitting_minutes.saturating_add(1);
            if self.is_sick() {
                self.sick_minute(now_ms, &mut effects);
            }
        }

        effects.push(Effect::Persist(PersistScope::Session));
        effects.push(Effect::RefreshTooltip);
        effects
    }

    fn sick_minute(&mut self, now_ms: i64, effects: &mut Vec<Effect>) {
        if self.sick_start_time.is_none() {
            info!(sitting = self.sitting_minutes, "pet fell sick");
            self.sick_start_time = Some(now_ms);
            self.apply_xp(XP_SICK_ONSET, effects);
        }

        let sick_minutes = self.sick_minutes(now_ms).unwrap_or(0);
        if sick_minutes >= PENALTY_AFTER_MINUTES
            && (sick_minutes - PENALTY_AFTER_MINUTES) % PENALTY_EVERY_MINUTES == 0
        {
            info!(sick_minutes, "ascended penalty");
            self.apply_xp(XP_ASCENDED_PENALTY, effects);
        }

        if !self.notification_sent {
            if self.notification_enabled {
                effects.push(Effect::Notify(Alert::sick(self.language, self.max_work_time)));
            }
            self.notification_sent = true;
        }

        if !self.second_notification_sent && sick_minutes >= URGENT_AFTER_MINUTES {
            if self.notification_enabled {
                effects.push(Effect::Notify(Alert::urgent(self.language)));
            }
            self.second_notification_sent = true;
        }
    }

    fn idle_tick(&mut self, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();
        let idle_minutes = (now_ms - self.last_update_time) / MINUTE_MS;
        if idle_minutes < self.break_duration as i64 {
            return effects;
        }

        // Only a break from actual sitting earns the bonus.
        if self.sitting_minutes > 0 {
            info!(idle_minutes, sitting = self.sitting_minutes, "natural break");
            self.apply_xp(XP_IDLE_BONUS, &mut effects);
        }
        self.recover();
        effects.push(Effect::Persist(PersistScope::Session));
        effects.push(Effect::RefreshTooltip);
        effects
    }

    /// Drop a sickness episode the current threshold no longer supports.
    fn settle_threshold(&mut self) -> bool {
        if self.sick_start_time.is_some() && !self.is_sick() {
            self.sick_start_time = None;
            self.notification_sent = false;
            self.second_notification_sent = false;
            return true;
        }
        false
    }

    /// Mirror a store change and keep the sickness invariant.
    pub fn apply_external(&mut self, key: &str, value: &serde_json::Value) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.mirror_external(key, value) {
            return effects;
        }
        if self.settle_threshold() {
            effects.push(Effect::Persist(PersistScope::Session));
        }
        effects.push(Effect::RefreshTooltip);
        effects
    }

    pub fn handle(&mut self, command: Command, now_ms: i64) -> (Reply, Vec<Effect>) {
        let mut effects = Vec::new();
        let outcome = match command {
            Command::GetState => {
                return (Reply::State(Box::new(self.snapshot(now_ms))), effects);
            }
            Command::SetPause { is_paused } => {
                if !is_paused && self.is_resting() {
                    return (
                        Reply::Outcome(Outcome::failed("resting; stop the rest first")),
                        effects,
                    );
                }
                self.is_paused = is_paused;
                effects.push(Effect::Persist(PersistScope::Pause));
                effects.push(Effect::RefreshTooltip);
                Outcome::ok()
            }
            Command::ResetTimer => {
                let mut outcome = Outcome::ok();
                if self.sick_start_time.is_some() {
                    self.apply_xp(XP_RESET_PENALTY, &mut effects);
                    outcome.punished = Some(true);
                    outcome.xp_change = Some(XP_RESET_PENALTY);
                }
                self.recover();
                self.last_update_time = now_ms;
                effects.push(Effect::Persist(PersistScope::Session));
                effects.push(Effect::RefreshTooltip);
                outcome
            }
            Command::StartRest => {
                self.rest_start_time = Some(now_ms);
                self.is_paused = true;
                effects.push(Effect::Persist(PersistScope::Session));
                effects.push(Effect::RefreshTooltip);
                Outcome::ok()
            }
            Command::StopRest => {
                self.rest_start_time = None;
                self.is_paused = true;
                effects.push(Effect::Persist(PersistScope::Session));
                effects.push(Effect::RefreshTooltip);
                Outcome::ok()
            }
            Command::UpdateSettings(update) => match self.update_settings(update) {
                Ok(settled) => {
                    effects.push(Effect::Persist(PersistScope::Settings));
                    if settled {
                        effects.push(Effect::Persist(PersistScope::Session));
                    }
                    effects.push(Effect::RefreshTooltip);
                    Outcome::ok()
                }
                Err(e) => Outcome::failed(e.to_string()),
            },
            Command::SetZenMode { zen_mode } => {
                self.zen_mode = zen_mode;
                effects.push(Effect::Persist(PersistScope::Zen));
                Outcome::ok()
            }
        };
        (Reply::Outcome(outcome), effects)
    }

    fn update_settings(&mut self, update: SettingsUpdate) -> Result<bool, Error> {
        check_minutes("maxWorkTime", update.max_work_time)?;
        check_minutes("breakDuration", update.break_duration)?;

        if let Some(v) = update.max_work_time {
            self.max_work_time = v;
        }
        if let Some(v) = update.break_duration {
            self.break_duration = v;
        }
        if let Some(v) = update.notification_enabled {
            self.notification_enabled = v;
        }
        if let Some(v) = update.language {
            self.language = v;
        }
        Ok(self.settle_threshold())
    }
}

fn check_minutes(key: &'static str, minutes: Option<u32>) -> Result<(), Error> {
    match minutes {
        Some(v) if !minutes_in_range(v) => Err(Error::InvalidSetting {
            key,
            reason: format!("must be between 1 and {} minutes", MAX_SETTING_MINUTES),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::AlertKind;
    use serde_json::json;

    const T0: i64 = 1_700_000_000_000;
    const TICK_MS: i64 = 10_000;

    fn state() -> SessionState {
        SessionState::new(T0)
    }

    fn alerts(effects: &[Effect]) -> Vec<AlertKind> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(a) => Some(a.kind),
                _ => None,
            })
            .collect()
    }

    /// Run `n` active ticks starting at `*now`, collecting every effect.
    fn run_active(s: &mut SessionState, now: &mut i64, n: usize) -> Vec<Effect> {
        let mut all = Vec::new();
        for _ in 0..n {
            *now += TICK_MS;
            all.extend(s.activity_tick(IdleState::Active, *now));
        }
        all
    }

    #[test]
    fn xp_is_clamped_at_zero() {
        let mut s = state();
        s.xp = 5;
        let mut effects = Vec::new();
        s.apply_xp(-1000, &mut effects);
        assert_eq!(s.xp, 0);
        assert!(effects.contains(&Effect::XpChanged));
        assert!(effects.contains(&Effect::Persist(PersistScope::Session)));
    }

    #[test]
    fn huge_xp_saturates_instead_of_wrapping() {
        let mut s = state();
        s.xp = u64::MAX - 1;
        let mut effects = Vec::new();
        s.apply_xp(XP_HEALTHY_TICK, &mut effects);
        s.apply_xp(XP_HEALTHY_TICK, &mut effects);
        assert_eq!(s.xp, u64::MAX);
        s.apply_xp(XP_SICK_TICK, &mut effects);
        assert_eq!(s.xp, u64::MAX - 1);
        assert_eq!(level_info(s.xp).level, 9);
    }

    #[test]
    fn level_up_notifies_only_when_enabled() {
        let mut s = state();
        s.xp = 49;
        let mut effects = Vec::new();
        s.apply_xp(1, &mut effects);
        assert_eq!(alerts(&effects), vec![AlertKind::LevelUp]);

        let mut s = state();
        s.xp = 49;
        s.notification_enabled = false;
        let mut effects = Vec::new();
        s.apply_xp(1, &mut effects);
        assert!(alerts(&effects).is_empty());
        assert_eq!(s.xp, 50);
    }

    #[test]
    fn dropping_a_level_is_silent() {
        let mut s = state();
        s.xp = 50;
        let mut effects = Vec::new();
        s.apply_xp(-1, &mut effects);
        assert!(alerts(&effects).is_empty());
    }

    #[test]
    fn daily_bonus_once_per_date() {
        let mut s = state();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert!(!s.claim_daily_bonus(today).is_empty());
        assert_eq!(s.xp, 20);
        assert!(s.claim_daily_bonus(today).is_empty());
        assert_eq!(s.xp, 20);

        let tomorrow = today.succ_opt().unwrap();
        s.claim_daily_bonus(tomorrow);
        assert_eq!(s.xp, 40);
        assert_eq!(s.last_login_date, Some(tomorrow));
    }

    #[test]
    fn minute_counter_advances_every_sixth_tick() {
        let mut s = state();
        let mut now = T0;
        run_active(&mut s, &mut now, 5);
        assert_eq!(s.sitting_minutes, 0);
        assert_eq!(s.xp, 5);
        run_active(&mut s, &mut now, 1);
        assert_eq!(s.sitting_minutes, 1);
        assert_eq!(s.xp, 6);
        assert_eq!(s.last_update_time, now);
    }

    #[test]
    fn sickness_onset_after_max_work_time() {
        let mut s = state();
        s.xp = 10_000;
        let mut now = T0;

        let effects = run_active(&mut s, &mut now, 269);
        assert_eq!(s.sitting_minutes, 44);
        assert!(s.sick_start_time.is_none());
        assert!(alerts(&effects).is_empty());
        assert_eq!(s.xp, 10_269);

        let effects = run_active(&mut s, &mut now, 1);
        assert_eq!(s.sitting_minutes, 45);
        assert_eq!(s.sick_start_time, Some(now));
        // +1 for the healthy tick, then the one-time onset penalty
        assert_eq!(s.xp, 10_270 - 50);
        assert_eq!(alerts(&effects), vec![AlertKind::Sick]);
        assert!(s.notification_sent);
        assert!(!s.second_notification_sent);
    }

    #[test]
    fn sick_ticks_cost_xp_and_alert_only_once() {
        let mut s = state();
        s.xp = 10_000;
        let mut now = T0;
        run_active(&mut s, &mut now, 270);
        let xp = s.xp;

        let effects = run_active(&mut s, &mut now, 6 * 10);
        assert_eq!(s.xp, xp - 60);
        assert!(alerts(&effects).is_empty());
    }

    #[test]
    fn urgent_alert_at_fifty_sick_minutes() {
        let mut s = state();
        s.xp = 10_000;
        let mut now = T0;
        run_active(&mut s, &mut now, 270);

        let effects = run_active(&mut s, &mut now, 6 * 49);
        assert!(alerts(&effects).is_empty());
        let effects = run_active(&mut s, &mut now, 6);
        assert_eq!(alerts(&effects), vec![AlertKind::Urgent]);
        assert!(s.second_notification_sent);
        let effects = run_active(&mut s, &mut now, 60);
        assert!(alerts(&effects).is_empty());
    }

    #[test]
    fn ascended_penalty_every_five_minutes_past_the_hour() {
        let mut s = state();
        s.xp = 100_000;
        let mut now = T0;
        run_active(&mut s, &mut now, 270);

        // minutes 1..=59 of sickness: only the per-tick cost
        let before = s.xp;
        run_active(&mut s, &mut now, 6 * 59);
        assert_eq!(s.xp, before - 6 * 59);

        // minute 60 fires the first penalty
        let before = s.xp;
        run_active(&mut s, &mut now, 6);
        assert_eq!(s.xp, before - 6 - 100);

        // minutes 61..=64: nothing extra
        let before = s.xp;
        run_active(&mut s, &mut now, 6 * 4);
        assert_eq!(s.xp, before - 6 * 4);

        // minute 65: one more
        let before = s.xp;
        run_active(&mut s, &mut now, 6);
        assert_eq!(s.xp, before - 6 - 100);
    }

    #[test]
    fn paused_active_tick_is_a_no_op() {
        let mut s = state();
        s.is_paused = true;
        let before = s.clone();
        let effects = s.activity_tick(IdleState::Active, T0 + TICK_MS);
        assert!(effects.is_empty());
        assert_eq!(s, before);
    }

    #[test]
    fn rest_mode_recovers_after_break_duration() {
        let mut s = state();
        s.sitting_minutes = 50;
        s.sick_start_time = Some(T0);
        s.notification_sent = true;
        s.xp = 100;
        let (_, _) = s.handle(Command::StartRest, T0);
        assert!(s.is_paused);

        assert!(s.rest_tick(T0 + 4 * 60_000 + 59_000).is_empty());
        assert_eq!(s.sitting_minutes, 50);

        let effects = s.rest_tick(T0 + 5 * 60_000);
        assert_eq!(s.sitting_minutes, 0);
        assert_eq!(s.sick_start_time, None);
        assert!(!s.notification_sent);
        assert!(!s.is_paused);
        assert_eq!(s.rest_start_time, None);
        assert_eq!(s.xp, 120);
        assert_eq!(alerts(&effects), vec![AlertKind::Recovered]);
    }

    #[test]
    fn idle_break_awards_once_per_episode() {
        let mut s = state();
        let mut now = T0;
        run_active(&mut s, &mut now, 60);
        assert_eq!(s.sitting_minutes, 10);
        let xp = s.xp;

        assert!(s.activity_tick(IdleState::Idle, now + 4 * 60_000).is_empty());
        s.activity_tick(IdleState::Idle, now + 5 * 60_000);
        assert_eq!(s.sitting_minutes, 0);
        assert_eq!(s.xp, xp + 10);

        s.activity_tick(IdleState::Locked, now + 6 * 60_000);
        s.activity_tick(IdleState::Idle, now + 7 * 60_000);
        assert_eq!(s.xp, xp + 10);
    }

    #[test]
    fn idle_break_clears_sickness_and_rearms_alerts() {
        let mut s = state();
        s.xp = 10_000;
        s.max_work_time = 2;
        let mut now = T0;
        let effects = run_active(&mut s, &mut now, 12);
        assert_eq!(alerts(&effects), vec![AlertKind::Sick]);

        s.activity_tick(IdleState::Idle, now + 5 * 60_000);
        assert!(s.sick_start_time.is_none());
        assert!(!s.notification_sent);

        now += 5 * 60_000;
        let effects = run_active(&mut s, &mut now, 12);
        assert_eq!(alerts(&effects), vec![AlertKind::Sick]);
    }

    #[test]
    fn reset_while_sick_costs_thirty() {
        let mut s = state();
        s.xp = 100;
        s.sitting_minutes = 45;
        s.sick_start_time = Some(T0);
        let (reply, _) = s.handle(Command::ResetTimer, T0 + 1);
        let json = serde_json::to_value(reply).unwrap();
        assert_eq!(json, json!({"success": true, "punished": true, "xpChange": -30}));
        assert_eq!(s.xp, 70);
        assert_eq!(s.sitting_minutes, 0);
        assert_eq!(s.sick_start_time, None);
        assert_eq!(s.last_update_time, T0 + 1);
    }

    #[test]
    fn reset_while_healthy_is_free() {
        let mut s = state();
        s.xp = 100;
        s.sitting_minutes = 20;
        let (reply, effects) = s.handle(Command::ResetTimer, T0);
        let json = serde_json::to_value(reply).unwrap();
        assert_eq!(json, json!({"success": true}));
        assert_eq!(s.xp, 100);
        assert!(!effects.contains(&Effect::XpChanged));
    }

    #[test]
    fn set_pause_persists_only_the_flag() {
        let mut s = state();
        let (_, effects) = s.handle(Command::SetPause { is_paused: true }, T0);
        assert!(s.is_paused);
        assert_eq!(effects[0], Effect::Persist(PersistScope::Pause));
    }

    #[test]
    fn zen_mode_persists_only_its_flag() {
        let mut s = state();
        let (_, effects) = s.handle(Command::SetZenMode { zen_mode: true }, T0);
        assert!(s.zen_mode);
        assert_eq!(effects, vec![Effect::Persist(PersistScope::Zen)]);
    }

    #[test]
    fn resume_is_refused_while_resting() {
        let mut s = state();
        s.handle(Command::StartRest, T0);
        let (reply, effects) = s.handle(Command::SetPause { is_paused: false }, T0);
        assert!(matches!(reply, Reply::Outcome(Outcome { success: false, .. })));
        assert!(effects.is_empty());
        assert!(s.is_paused);
    }

    #[test]
    fn stop_rest_stays_paused() {
        let mut s = state();
        s.handle(Command::StartRest, T0);
        s.handle(Command::StopRest, T0 + 1);
        assert_eq!(s.rest_start_time, None);
        assert!(s.is_paused);
    }

    #[test]
    fn update_settings_validates_and_persists() {
        let mut s = state();
        let update = SettingsUpdate {
            max_work_time: Some(0),
            ..SettingsUpdate::default()
        };
        let (reply, effects) = s.handle(Command::UpdateSettings(update), T0);
        assert!(matches!(reply, Reply::Outcome(Outcome { success: false, .. })));
        assert!(effects.is_empty());
        assert_eq!(s.max_work_time, 45);

        let update = SettingsUpdate {
            max_work_time: Some(30),
            notification_enabled: Some(false),
            ..SettingsUpdate::default()
        };
        let (_, effects) = s.handle(Command::UpdateSettings(update), T0);
        assert_eq!(s.max_work_time, 30);
        assert_eq!(s.break_duration, 5);
        assert!(!s.notification_enabled);
        assert!(effects.contains(&Effect::Persist(PersistScope::Settings)));
    }

    #[test]
    fn oversized_limits_are_refused() {
        let mut s = state();
        let update = SettingsUpdate {
            max_work_time: Some(100_000_000),
            ..SettingsUpdate::default()
        };
        let (reply, effects) = s.handle(Command::UpdateSettings(update), T0);
        match reply {
            Reply::Outcome(outcome) => {
                assert!(!outcome.success);
                assert!(outcome.message.unwrap().contains("maxWorkTime"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert!(effects.is_empty());
        assert_eq!(s.max_work_time, 45);

        let update = SettingsUpdate {
            break_duration: Some(MAX_SETTING_MINUTES),
            ..SettingsUpdate::default()
        };
        s.handle(Command::UpdateSettings(update), T0);
        assert_eq!(s.break_duration, MAX_SETTING_MINUTES);
    }

    #[test]
    fn raising_threshold_ends_sickness() {
        let mut s = state();
        s.sitting_minutes = 46;
        s.sick_start_time = Some(T0);
        s.notification_sent = true;
        let update = SettingsUpdate {
            max_work_time: Some(60),
            ..SettingsUpdate::default()
        };
        let (_, effects) = s.handle(Command::UpdateSettings(update), T0);
        assert_eq!(s.sick_start_time, None);
        assert!(!s.notification_sent);
        assert_eq!(s.sitting_minutes, 46);
        assert!(effects.contains(&Effect::Persist(PersistScope::Session)));
    }

    #[test]
    fn external_change_mirrors_settings() {
        let mut s = state();
        let effects = s.apply_external("breakDuration", &json!(10));
        assert_eq!(s.break_duration, 10);
        assert_eq!(effects, vec![Effect::RefreshTooltip]);
        assert!(s.apply_external("breakDuration", &json!(10)).is_empty());
    }

    #[test]
    fn notifications_disabled_still_arms_flags() {
        let mut s = state();
        s.xp = 10_000;
        s.notification_enabled = false;
        s.max_work_time = 1;
        let mut now = T0;
        let effects = run_active(&mut s, &mut now, 6);
        assert!(alerts(&effects).is_empty());
        assert!(s.notification_sent);
    }
}
