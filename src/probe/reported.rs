//! Activity reported by the browser extension.
//!
//! The extension forwards its own idle-state readings and every tab switch.
//! A tab switch counts as activity.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local};

use super::{ActivityProbe, IdleState};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Reports {
    last_active: Option<DateTime<Local>>,
    last_state: Option<IdleState>,
}

/// Cloneable handle; transports record, the tracker queries.
#[derive(Debug, Clone, Default)]
pub struct ReportedActivity {
    inner: Arc<Mutex<Reports>>,
}

impl ReportedActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, state: IdleState, at: DateTime<Local>) {
        if let Ok(mut reports) = self.inner.lock() {
            if state == IdleState::Active {
                reports.last_active = Some(at);
            }
            reports.last_state = Some(state);
        }
    }

    pub fn state_at(&self, window_secs: u64, now: DateTime<Local>) -> Result<IdleState> {
        let reports = self
            .inner
            .lock()
            .map_err(|e| Error::ProbeUnavailable(e.to_string()))?;

        let Some(last_state) = reports.last_state else {
            return Err(Error::ProbeUnavailable(
                "no activity reported yet".to_string(),
            ));
        };
        if last_state != IdleState::Active {
            return Ok(last_state);
        }
        match reports.last_active {
            Some(at) if (now - at).num_seconds() < window_secs as i64 => Ok(IdleState::Active),
            _ => Ok(IdleState::Idle),
        }
    }
}

#[async_trait]
impl ActivityProbe for ReportedActivity {
    async fn query(&self, window_secs: u64) -> Result<IdleState> {
        self.state_at(window_secs, Local::now())
    }
}
