//! Owns the session state and carries out what the state machine asks for.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::command::{Command, Reply};
use crate::error::Result;
use crate::notify::Notifier;
use crate::pet::machine::Effect;
use crate::pet::mood::{Mood, tooltip};
use crate::pet::state::{ALL_KEYS, PersistScope, SessionState};
use crate::probe::{ACTIVITY_WINDOW_SECS, ActivityProbe};
use crate::store::{PersistentStore, StoreChange};

pub struct SittingTracker {
    state: SessionState,
    store: Arc<dyn PersistentStore>,
    probe: Arc<dyn ActivityProbe>,
    notifier: Arc<dyn Notifier>,
    listeners: Broadcaster,
    tooltip: String,
}

impl SittingTracker {
    /// Load state from the store and claim today's bonus.
    pub async fn load(
        store: Arc<dyn PersistentStore>,
        probe: Arc<dyn ActivityProbe>,
        notifier: Arc<dyn Notifier>,
        listeners: Broadcaster,
        now: DateTime<Local>,
    ) -> Self {
        let now_ms = now.timestamp_millis();
        let stored = match store.get(ALL_KEYS).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "failed to read state, starting from defaults");
                Default::default()
            }
        };
        let state = SessionState::from_stored(&stored, now_ms);
        let tooltip = tooltip(&state, now_ms);
        let mut tracker = Self {
            state,
            store,
            probe,
            notifier,
            listeners,
            tooltip,
        };
        info!(
            xp = tracker.state.xp,
            sitting = tracker.state.sitting_minutes,
            max_work_time = tracker.state.max_work_time,
            language = tracker.state.language.as_str(),
            "session loaded"
        );

        let effects = tracker.state.claim_daily_bonus(now.date_naive());
        tracker.apply(effects, now_ms).await;
        tracker
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    pub async fn tick(&mut self) -> Result<()> {
        self.tick_at(Local::now()).await
    }

    /// One pass of the detection loop. A probe failure aborts the pass
    /// before any sitting state is mutated.
    pub async fn tick_at(&mut self, now: DateTime<Local>) -> Result<()> {
        let now_ms = now.timestamp_millis();
        // Crossing midnight while running earns the next day's bonus.
        let bonus = self.state.claim_daily_bonus(now.date_naive());
        if !bonus.is_empty() {
            self.apply(bonus, now_ms).await;
        }

        let effects = if self.state.is_resting() {
            self.state.rest_tick(now_ms)
        } else {
            let reading = self.probe.query(ACTIVITY_WINDOW_SECS).await?;
            self.state.activity_tick(reading, now_ms)
        };
        self.apply(effects, now_ms).await;
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) -> Reply {
        self.handle_at(command, Local::now()).await
    }

    pub async fn handle_at(&mut self, command: Command, now: DateTime<Local>) -> Reply {
        let now_ms = now.timestamp_millis();
        debug!(?command, "command");
        let (reply, effects) = self.state.handle(command, now_ms);
        self.apply(effects, now_ms).await;
        reply
    }

    pub async fn on_store_change(&mut self, change: &StoreChange, now: DateTime<Local>) {
        let now_ms = now.timestamp_millis();
        let effects = self.state.apply_external(&change.key, &change.new_value);
        if !effects.is_empty() {
            info!(key = %change.key, value = %change.new_value, "setting changed in store");
        }
        self.apply(effects, now_ms).await;
    }

    /// Re-read mirrored settings after missing change events.
    pub async fn resync(&mut self, now: DateTime<Local>) {
        match self.store.get(PersistScope::Settings.keys()).await {
            Ok(stored) => {
                for (key, value) in stored {
                    self.on_store_change(&StoreChange { key, new_value: value }, now)
                        .await;
                }
            }
            Err(e) => warn!(error = %e, "failed to resync settings"),
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>, now_ms: i64) {
        let mut scopes: Vec<PersistScope> = Vec::new();
        let mut xp_changed = false;
        let mut refresh = false;

        for effect in effects {
            match effect {
                Effect::Notify(alert) => {
                    if let Err(e) = self.notifier.notify(&alert).await {
                        warn!(error = %e, kind = ?alert.kind, "notification dropped");
                    }
                }
                Effect::Persist(scope) => {
                    if !scopes.contains(&scope) {
                        scopes.push(scope);
                    }
                }
                Effect::XpChanged => xp_changed = true,
                Effect::RefreshTooltip => refresh = true,
            }
        }

        for scope in scopes {
            if let Err(e) = self.store.set(self.state.entries(scope)).await {
                warn!(error = %e, ?scope, "failed to persist state");
            }
        }

        if xp_changed {
            let listeners = self.listeners.publish(self.state.snapshot(now_ms));
            debug!(xp = self.state.xp, listeners, "xp updated");
        }

        if refresh {
            let text = tooltip(&self.state, now_ms);
            if text != self.tooltip {
                debug!(
                    mood = Mood::of(&self.state, now_ms).as_str(),
                    tooltip = %text,
                    "display hint changed"
                );
                self.tooltip = text;
            }
        }
    }
}
