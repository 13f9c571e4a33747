use crate::models::Snapshot;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

/// Slot holding the most recently published snapshot
pub type LatestSlot = Shared<Option<Arc<Snapshot>>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Replace the published snapshot; readers only ever see complete values
pub fn publish(slot: &LatestSlot, snapshot: Arc<Snapshot>) {
    *slot.lock() = Some(snapshot);
}
