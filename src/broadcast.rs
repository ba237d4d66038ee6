use tokio::sync::broadcast;

use crate::pet::state::StateSnapshot;

const CAPACITY: usize = 32;

/// Pushes state snapshots to whoever is listening. Nobody listening is fine.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<StateSnapshot>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(CAPACITY).0,
        }
    }

    /// Returns how many listeners received it.
    pub fn publish(&self, snapshot: StateSnapshot) -> usize {
        self.tx.send(snapshot).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::state::SessionState;

    #[test]
    fn publishing_without_listeners_is_not_an_error() {
        let b = Broadcaster::new();
        assert_eq!(b.publish(SessionState::new(0).snapshot(0)), 0);
    }

    #[tokio::test]
    async fn listeners_get_snapshots() {
        let b = Broadcaster::new();
        let mut rx = b.subscribe();
        let mut state = SessionState::new(0);
        state.xp = 7;
        assert_eq!(b.publish(state.snapshot(0)), 1);
        assert_eq!(rx.recv().await.unwrap().state.xp, 7);
    }
}
