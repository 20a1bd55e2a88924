//! Registry of frame sources visible to the host
//!
//! A running session registers its `FrameSlot` here and hands the returned id
//! to the host, which uses it to pull frames for display.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::frame_slot::FrameSlot;

pub struct FrameSources {
    next_id: AtomicI64,
    slots: Mutex<HashMap<i64, Arc<FrameSlot>>>,
}

impl FrameSources {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a slot; ids are never reused
    pub fn register(&self, slot: Arc<FrameSlot>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slot);
        id
    }

    pub fn get(&self, id: i64) -> Option<Arc<FrameSlot>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Returns false if the id was not registered
    pub fn unregister(&self, id: i64) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameSources {
    fn default() -> Self {
        Self::new()
    }
}
