//! The owner task and the entry point every transport talks to.
//!
//! One task holds the [`SittingTracker`]; ticks, commands and store changes
//! are serialized through its `select!` loop.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Local;
use futures_util::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, warn};

use crate::broadcast::Broadcaster;
use crate::command::{ActivityReport, Command, Frame, Outcome, Reply, XpUpdated};
use crate::error::{Error, Result};
use crate::pet::state::StateSnapshot;
use crate::probe::IdleState;
use crate::probe::reported::ReportedActivity;
use crate::tracker::SittingTracker;

const COMMAND_QUEUE: usize = 32;

pub type Request = (Command, oneshot::Sender<Reply>);

/// Cloneable sender of commands to the owner task.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<Request>,
}

impl TrackerHandle {
    pub fn channel() -> (Self, mpsc::Receiver<Request>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        (Self { tx }, rx)
    }

    pub async fn send(&self, command: Command) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((command, reply_tx))
            .await
            .map_err(|_| Error::Protocol("tracker has shut down".into()))?;
        reply_rx
            .await
            .map_err(|_| Error::Protocol("tracker dropped the request".into()))
    }
}

/// Drive the tracker until the process exits.
pub async fn run(
    mut tracker: SittingTracker,
    mut commands: mpsc::Receiver<Request>,
    every: Duration,
) {
    let mut changes = tracker.store().subscribe();
    let mut changes_open = true;
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match AssertUnwindSafe(tracker.tick()).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(Error::ProbeUnavailable(reason))) => {
                        debug!(%reason, "tick skipped");
                    }
                    Ok(Err(e)) => warn!(error = %e, "tick failed"),
                    Err(_) => error!("tick panicked; timer kept alive"),
                }
            }
            Some((command, reply)) = commands.recv() => {
                let guarded = AssertUnwindSafe(tracker.handle(command)).catch_unwind();
                let response = match guarded.await {
                    Ok(response) => response,
                    Err(_) => {
                        error!("command panicked; tracker kept alive");
                        Reply::Outcome(Outcome::failed("internal error"))
                    }
                };
                // The asker may have given up.
                let _ = reply.send(response);
            }
            change = changes.recv(), if changes_open => {
                let now = Local::now();
                let applied = match change {
                    Ok(change) => AssertUnwindSafe(tracker.on_store_change(&change, now))
                        .catch_unwind()
                        .await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "store change feed lagged, resyncing");
                        AssertUnwindSafe(tracker.resync(now)).catch_unwind().await
                    }
                    Err(RecvError::Closed) => {
                        changes_open = false;
                        Ok(())
                    }
                };
                if applied.is_err() {
                    error!("store change panicked; tracker kept alive");
                }
            }
        }
    }
}

/// What a transport needs to serve one client.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub handle: TrackerHandle,
    pub activity: ReportedActivity,
    pub listeners: Broadcaster,
}

impl Endpoint {
    /// Handle one inbound frame; commands get a JSON reply, reports do not.
    pub async fn handle_text(&self, text: &str) -> Option<String> {
        let reply = match Frame::parse(text) {
            Ok(Frame::Command(command)) => match self.handle.send(command).await {
                Ok(reply) => reply,
                Err(e) => Reply::Outcome(Outcome::failed(e.to_string())),
            },
            Ok(Frame::Activity(report)) => {
                self.record(report);
                return None;
            }
            Err(e) => {
                warn!(error = %e, "unparseable frame");
                Reply::Outcome(Outcome::failed(format!("Parse error: {}", e)))
            }
        };
        match serde_json::to_string(&reply) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(error = %e, "failed to encode reply");
                None
            }
        }
    }

    fn record(&self, report: ActivityReport) {
        let now = Local::now();
        match report {
            ActivityReport::IdleState { state } => self.activity.record(state, now),
            ActivityReport::TabUpdate { url, domain, .. } => {
                debug!(%url, ?domain, "tab update");
                self.activity.record(IdleState::Active, now);
            }
        }
    }
}

pub fn encode_broadcast(snapshot: StateSnapshot) -> Option<String> {
    serde_json::to_string(&XpUpdated::new(snapshot))
        .map_err(|e| error!(error = %e, "failed to encode broadcast"))
        .ok()
}
