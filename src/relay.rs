//! Single-slot, latest-wins hand-off from the processing loop to a consumer.
//!
//! The publisher never blocks: when the slot is still full it discards the
//! unread update and puts the new one in its place. The consumer therefore
//! only ever sees the newest snapshot, never a backlog. The last update of a
//! session is always a terminal status.

use crate::core::report::MonitorSnapshot;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why the processing loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TerminalStatus {
    /// A stop was requested.
    Stopped,
    /// A recorded source ran out of data.
    EndOfStream,
    /// A camera or audio device failed.
    DeviceFailure(String),
    /// The loop went away without reporting a status.
    Aborted,
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalStatus::Stopped => write!(f, "stopped"),
            TerminalStatus::EndOfStream => write!(f, "end of recording"),
            TerminalStatus::DeviceFailure(e) => write!(f, "device failure: {e}"),
            TerminalStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// An update carried by the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayUpdate {
    Snapshot(MonitorSnapshot),
    Terminated(TerminalStatus),
}

/// Create a connected publisher/reader pair.
pub fn relay() -> (RelayPublisher, RelayReader) {
    let (sender, receiver) = bounded(1);
    (
        RelayPublisher {
            sender,
            stale: receiver.clone(),
        },
        RelayReader {
            receiver,
            latest: None,
            terminal: None,
        },
    )
}

/// Producer side, owned by the processing loop.
pub struct RelayPublisher {
    sender: Sender<RelayUpdate>,
    stale: Receiver<RelayUpdate>,
}

impl RelayPublisher {
    pub fn publish(&self, snapshot: MonitorSnapshot) {
        self.replace(RelayUpdate::Snapshot(snapshot));
    }

    pub fn terminate(&self, status: TerminalStatus) {
        self.replace(RelayUpdate::Terminated(status));
    }

    fn replace(&self, mut update: RelayUpdate) {
        loop {
            match self.sender.try_send(update) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    // Only this side fills the slot, so one eviction makes room.
                    let _ = self.stale.try_recv();
                    update = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Consumer side.
pub struct RelayReader {
    receiver: Receiver<RelayUpdate>,
    latest: Option<MonitorSnapshot>,
    terminal: Option<TerminalStatus>,
}

impl RelayReader {
    /// Take any pending update without blocking and return the newest
    /// snapshot seen so far.
    pub fn poll(&mut self) -> Option<&MonitorSnapshot> {
        match self.receiver.try_recv() {
            Ok(update) => self.absorb(update),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.disconnected(),
        }
        self.latest.as_ref()
    }

    /// Wait up to `timeout` for the next update.
    ///
    /// Returns `None` on timeout. Once the session has terminated, the
    /// terminal status is returned immediately on every call.
    pub fn wait(&mut self, timeout: Duration) -> Option<RelayUpdate> {
        if let Some(ref status) = self.terminal {
            return Some(RelayUpdate::Terminated(status.clone()));
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(update) => {
                self.absorb(update.clone());
                Some(update)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected();
                self.terminal.clone().map(RelayUpdate::Terminated)
            }
        }
    }

    /// Newest snapshot received so far.
    pub fn latest(&self) -> Option<&MonitorSnapshot> {
        self.latest.as_ref()
    }

    /// Terminal status, once the loop has ended.
    pub fn terminal(&self) -> Option<&TerminalStatus> {
        self.terminal.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    fn absorb(&mut self, update: RelayUpdate) {
        match update {
            RelayUpdate::Snapshot(snapshot) => self.latest = Some(snapshot),
            RelayUpdate::Terminated(status) => self.terminal = Some(status),
        }
    }

    fn disconnected(&mut self) {
        if self.terminal.is_none() {
            self.terminal = Some(TerminalStatus::Aborted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tick: u64) -> MonitorSnapshot {
        MonitorSnapshot {
            tick,
            ..MonitorSnapshot::default()
        }
    }

    #[test]
    fn test_latest_wins() {
        let (publisher, mut reader) = relay();
        for tick in 1..=50 {
            publisher.publish(snapshot(tick));
        }
        assert_eq!(reader.poll().map(|s| s.tick), Some(50));
        // Nothing queued behind it.
        assert_eq!(reader.wait(Duration::from_millis(10)), None);
        assert_eq!(reader.latest().map(|s| s.tick), Some(50));
    }

    #[test]
    fn test_poll_keeps_last_snapshot() {
        let (publisher, mut reader) = relay();
        assert!(reader.poll().is_none());
        publisher.publish(snapshot(7));
        assert_eq!(reader.poll().map(|s| s.tick), Some(7));
        assert_eq!(reader.poll().map(|s| s.tick), Some(7));
    }

    #[test]
    fn test_terminal_status_replaces_pending_snapshot() {
        let (publisher, mut reader) = relay();
        publisher.publish(snapshot(1));
        publisher.terminate(TerminalStatus::DeviceFailure("camera unplugged".into()));

        let update = reader.wait(Duration::from_millis(10));
        assert_eq!(
            update,
            Some(RelayUpdate::Terminated(TerminalStatus::DeviceFailure(
                "camera unplugged".into()
            )))
        );
        assert!(reader.is_terminated());
        assert!(matches!(
            reader.wait(Duration::from_millis(1)),
            Some(RelayUpdate::Terminated(_))
        ));
    }

    #[test]
    fn test_dropped_publisher_aborts() {
        let (publisher, mut reader) = relay();
        drop(publisher);
        assert_eq!(
            reader.wait(Duration::from_millis(10)),
            Some(RelayUpdate::Terminated(TerminalStatus::Aborted))
        );
    }

    #[test]
    fn test_publisher_never_blocks_across_threads() {
        let (publisher, mut reader) = relay();
        let handle = std::thread::spawn(move || {
            for tick in 1..=10_000 {
                publisher.publish(snapshot(tick));
            }
            publisher.terminate(TerminalStatus::Stopped);
        });
        handle.join().unwrap();

        assert_eq!(
            reader.wait(Duration::from_secs(1)),
            Some(RelayUpdate::Terminated(TerminalStatus::Stopped))
        );
    }
}
