use crate::error::MediaError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Local capture, owned by the embedding application.
///
/// The orchestrator only decides *when* capture starts and stops; the tracks
/// themselves reach peer connections through the transport factory.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<(), MediaError>;

    fn stop(&self);
}

/// Participant that sends no media, e.g. a data-only probe.
#[derive(Debug, Default)]
pub struct NoMedia {
    active: AtomicBool,
}

impl NoMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for NoMedia {
    async fn acquire(&self) -> Result<(), MediaError> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
