//! Update notifications from loaders to the component that owns them.
//!
//! Loaders never call back into their owner. They post an [`UpdateEvent`]
//! on an unbounded channel, and the owner drains the channel on its own
//! schedule (see `TableViewer::process_updates`). A notification is
//! therefore always observed after the load task that produced it has
//! returned, never re-entrantly.

use futures::{FutureExt, StreamExt, channel::mpsc};

/// Which loader of a row source an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadSide {
    /// Loads negative offsets, moving away from the pivot.
    Low,
    /// Loads non-negative offsets.
    High,
}

impl std::fmt::Display for LoadSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadSide::Low => f.write_str("low"),
            LoadSide::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Rows were appended to a loader, or it reached a terminal state.
    Loaded(LoadSide),
    /// The table configuration request finished.
    Configured,
}

/// Sending half of the update channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpdateNotifier(mpsc::UnboundedSender<UpdateEvent>);

impl UpdateNotifier {
    pub fn notify(&self, event: UpdateEvent) {
        if self.0.unbounded_send(event).is_err() {
            log::debug!("update receiver dropped, discarding {event:?}");
        }
    }
}

/// Receiving half of the update channel.
#[derive(Debug)]
pub struct UpdateReceiver(mpsc::UnboundedReceiver<UpdateEvent>);

impl UpdateReceiver {
    /// Takes every event posted so far without waiting for more.
    pub fn drain(&mut self) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        while let Some(Some(event)) = self.0.next().now_or_never() {
            events.push(event);
        }
        events
    }
}

pub fn update_channel() -> (UpdateNotifier, UpdateReceiver) {
    let (tx, rx) = mpsc::unbounded();
    (UpdateNotifier(tx), UpdateReceiver(rx))
}
