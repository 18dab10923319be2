//! Destinations for CSI sample events.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use super::types::CsiSampleEvent;

/// Depth of the CSI event queue. Producers never wait on it; a full queue
/// drops the newest event.
pub const CSI_EVENT_QUEUE_SIZE: usize = 32;
/// Bounded channel carrying CSI events to the owner's event bus.
pub type CsiEventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, CsiSampleEvent, CSI_EVENT_QUEUE_SIZE>;
/// Sender side of the CSI event queue.
pub type CsiEventQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, CsiSampleEvent, CSI_EVENT_QUEUE_SIZE>;
/// Receiver side of the CSI event queue.
pub type CsiEventQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, CsiSampleEvent, CSI_EVENT_QUEUE_SIZE>;

/// Receives one event per acquired sample. Delivery is best effort.
pub trait CsiSink: Send + Sync {
    fn publish(&self, event: CsiSampleEvent);
}

/// Publishes into a [`CsiEventQueue`] without blocking the sampling loop.
pub struct QueueSink {
    sender: CsiEventQueueSender,
}

impl QueueSink {
    pub fn new(sender: CsiEventQueueSender) -> Self {
        Self { sender }
    }
}

impl CsiSink for QueueSink {
    fn publish(&self, event: CsiSampleEvent) {
        let sequence = event.sequence;
        if self.sender.try_send(event).is_err() {
            log::warn!("CSI event queue full, dropping sample {}", sequence);
        }
    }
}
