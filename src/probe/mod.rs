pub mod reported;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Trailing window the tick asks about.
pub const ACTIVITY_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// Answers whether the user was active over a trailing window.
#[async_trait]
pub trait ActivityProbe: Send + Sync {
    async fn query(&self, window_secs: u64) -> Result<IdleState>;
}
