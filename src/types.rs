use crate::abi::DecodedEvent;

/// Messages published by the watcher to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A new chain head is about to be processed.
    NewBlock(u64),
    /// A registry event was decoded, published before its reactions run.
    Event(DecodedEvent),
}

impl Notification {
    /// Name of the notification: `newBlock`, or the event name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Notification::NewBlock(_) => "newBlock",
            Notification::Event(event) => &event.event_name,
        }
    }
}
