use async_trait::async_trait;
use notify_rust::{Notification, Timeout, Urgency};

use super::{Alert, Notifier};
use crate::error::{Error, Result};

const APP_NAME: &str = "NekoRest";

/// Shows alerts through the desktop notification daemon.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

fn urgency(priority: u8) -> Urgency {
    match priority {
        0 => Urgency::Low,
        1 => Urgency::Normal,
        _ => Urgency::Critical,
    }
}

fn build(alert: &Alert) -> Notification {
    let mut notification = Notification::new();
    notification
        .appname(APP_NAME)
        .summary(&alert.title)
        .body(&alert.message)
        .icon(alert.icon.trim_end_matches(".png"))
        .urgency(urgency(alert.priority));
    if alert.require_interaction {
        notification.timeout(Timeout::Never);
    }
    notification
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let notification = build(alert);
        // show() blocks on the session bus
        tokio::task::spawn_blocking(move || notification.show().map(|_| ()))
            .await
            .map_err(|e| Error::NotifierUnavailable(e.to_string()))?
            .map_err(|e| Error::NotifierUnavailable(e.to_string()))
    }
}
