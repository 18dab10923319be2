//! Channel state information collection.
//!
//! - `types`: CSI matrices, samples and published events
//! - `source`: where samples come from
//! - `sink`: where events go
//! - `collector`: the periodic background sampling task

pub mod collector;
pub mod sink;
pub mod source;
pub mod types;

pub use collector::CsiCollector;
pub use sink::{CSI_EVENT_QUEUE_SIZE, CsiEventQueue, CsiEventQueueReceiver, CsiEventQueueSender, CsiSink, QueueSink};
pub use source::{CsiSource, SimulatedCsiSource};
pub use types::{CsiMatrix, CsiSample, CsiSampleEvent};
