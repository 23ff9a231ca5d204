//! Observable channel state.
//!
//! The publisher holds the two values a consumer renders: the connection
//! status and the last received payload. Consumers read them through
//! [`StatePublisher`]; only the channel worker holds the [`StateWriter`].

use tokio::sync::watch;

use sensorlink_core::ChannelState;

/// Read side of the channel state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    status: watch::Receiver<ChannelState>,
    last_message: watch::Receiver<Option<String>>,
}

/// Write side, owned by the channel worker.
#[derive(Debug)]
pub(crate) struct StateWriter {
    status: watch::Sender<ChannelState>,
    last_message: watch::Sender<Option<String>>,
}

/// Create a linked writer/publisher pair in the initial state.
pub(crate) fn state_channel() -> (StateWriter, StatePublisher) {
    let (status_tx, status_rx) = watch::channel(ChannelState::Disconnected);
    let (message_tx, message_rx) = watch::channel(None);

    (
        StateWriter {
            status: status_tx,
            last_message: message_tx,
        },
        StatePublisher {
            status: status_rx,
            last_message: message_rx,
        },
    )
}

impl StatePublisher {
    /// Current connection status.
    pub fn status(&self) -> ChannelState {
        *self.status.borrow()
    }

    /// Most recent inbound payload, if any has arrived.
    ///
    /// Not cleared on disconnect.
    pub fn last_message(&self) -> Option<String> {
        self.last_message.borrow().clone()
    }

    /// Receiver notified on every status transition.
    pub fn watch_status(&self) -> watch::Receiver<ChannelState> {
        self.status.clone()
    }

    /// Receiver notified on every inbound payload.
    pub fn watch_last_message(&self) -> watch::Receiver<Option<String>> {
        self.last_message.clone()
    }

    /// Wait until the status equals `state`.
    ///
    /// Returns false if the writer is gone and the status never got there.
    pub async fn wait_for_status(&self, state: ChannelState) -> bool {
        let mut rx = self.status.clone();
        loop {
            if *rx.borrow_and_update() == state {
                return true;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow() == state;
            }
        }
    }
}

impl StateWriter {
    /// Set the status, notifying watchers only on an actual change.
    ///
    /// Returns true if the status changed.
    pub(crate) fn set_status(&self, state: ChannelState) -> bool {
        self.status.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    /// Overwrite the last payload. Every payload notifies, even if equal to
    /// the previous one.
    pub(crate) fn set_last_message(&self, payload: String) {
        self.last_message.send_replace(Some(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let (_writer, publisher) = state_channel();

        assert_eq!(publisher.status(), ChannelState::Disconnected);
        assert_eq!(publisher.last_message(), None);
    }

    #[test]
    fn test_status_notifies_only_on_change() {
        let (writer, publisher) = state_channel();
        let mut rx = publisher.watch_status();

        assert!(!writer.set_status(ChannelState::Disconnected));
        assert!(!rx.has_changed().unwrap());

        assert!(writer.set_status(ChannelState::Connected));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ChannelState::Connected);
    }

    #[test]
    fn test_last_message_overwritten() {
        let (writer, publisher) = state_channel();

        writer.set_last_message("42.5".to_string());
        assert_eq!(publisher.last_message().as_deref(), Some("42.5"));

        writer.set_last_message("43.0".to_string());
        assert_eq!(publisher.last_message().as_deref(), Some("43.0"));
    }

    #[test]
    fn test_values_survive_writer_drop() {
        let (writer, publisher) = state_channel();
        writer.set_status(ChannelState::Connected);
        writer.set_last_message("last".to_string());
        drop(writer);

        assert_eq!(publisher.status(), ChannelState::Connected);
        assert_eq!(publisher.last_message().as_deref(), Some("last"));
    }

    #[tokio::test]
    async fn test_wait_for_status() {
        let (writer, publisher) = state_channel();

        let waiter = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.wait_for_status(ChannelState::Connected).await })
        };
        tokio::task::yield_now().await;
        writer.set_status(ChannelState::Connected);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_status_gives_up_when_writer_dropped() {
        let (writer, publisher) = state_channel();
        drop(writer);

        assert!(!publisher.wait_for_status(ChannelState::Connected).await);
    }
}
