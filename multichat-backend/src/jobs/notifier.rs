use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Wakes whoever is waiting for a message's final text to be written.
///
/// Signals are only a shortcut: waiters still re-read the message and keep a
/// poll interval as an upper bound, since writers in another process never
/// signal here.
#[derive(Default)]
pub struct CompletionNotifier {
    waiters: DashMap<i64, Arc<Notify>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, message_id: i64) -> Arc<Notify> {
        self.waiters.entry(message_id).or_default().clone()
    }

    /// A signal sent while nobody is waiting is kept for the next wait.
    pub fn notify(&self, message_id: i64) {
        if let Some(notify) = self.waiters.get(&message_id) {
            notify.notify_one();
        }
    }

    pub fn forget(&self, message_id: i64) {
        self.waiters.remove(&message_id);
    }
}
