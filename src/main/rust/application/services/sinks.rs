use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, Mutex};

use super::LevelTrigger;

/// Bounded FIFO of snapshot images.
///
/// Single producer (event dispatch), single consumer (the outbound merge).
/// A full queue drops the new picture instead of blocking the producer.
pub struct PictureQueue {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    listening: AtomicBool,
}

impl PictureQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            listening: AtomicBool::new(false),
        }
    }

    /// Returns `false` when the picture was dropped
    pub fn put(&self, picture: Vec<u8>) -> bool {
        match self.tx.try_send(picture) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::info!("Picture queue full, ignoring");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Wait for the next picture
    pub async fn next(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Mark that a consumer exists; pictures are ignored until then
    pub fn start_listening(&self) {
        self.listening.store(true, Ordering::SeqCst);
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Last known motion flag plus its change trigger
#[derive(Debug, Default)]
pub struct MotionSink {
    motion: AtomicBool,
    trigger: LevelTrigger,
}

impl MotionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, motion: bool) {
        self.motion.store(motion, Ordering::SeqCst);
        self.trigger.set();
    }

    pub fn current(&self) -> bool {
        self.motion.load(Ordering::SeqCst)
    }

    /// Wait for a change and return the latest flag
    pub async fn changed(&self) -> bool {
        self.trigger.wait().await;
        self.current()
    }
}
