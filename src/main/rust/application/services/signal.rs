use tokio::sync::Notify;

/// Payload-less wake-up signal.
///
/// Any number of `set` calls before the consumer waits collapse into a single
/// notification. Consumers re-read the current state after waking.
#[derive(Debug, Default)]
pub struct LevelTrigger {
    notify: Notify,
}

impl LevelTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}
