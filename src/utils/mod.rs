pub mod priority_queue;
pub mod queue;

pub use priority_queue::{PriorityQueue, PriorityQueueNode};
pub use queue::Queue;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds, as used by output timelocks
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}
