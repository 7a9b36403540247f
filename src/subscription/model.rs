/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 25/10/25
******************************************************************************/

use crate::subscription::{SubscriptionListener, Values};
use crate::utils::Error;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// One registered subscription: the user's listener plus the last-known
/// snapshot of every item seen so far.
pub(crate) struct SubscriptionEntry {
    group: String,
    listener: Box<dyn SubscriptionListener>,
    items: Mutex<HashMap<u32, Values>>,
}

impl SubscriptionEntry {
    pub(crate) fn new(group: impl Into<String>, listener: Box<dyn SubscriptionListener>) -> Self {
        Self {
            group: group.into(),
            listener,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// The group this subscription was created for, for diagnostics.
    pub(crate) fn group(&self) -> &str {
        &self.group
    }

    /// Applies an update body to the item's snapshot and returns the next
    /// snapshot. The item lock is released before this returns, so the
    /// caller can notify the listener without holding it.
    pub(crate) fn apply(&self, item: u32, update: &[String]) -> Result<Values, Error> {
        let mut items = self.items.lock();
        let current = items.entry(item).or_default();
        let next = current.update(update)?;
        *current = next.clone();
        Ok(next)
    }

    /// Invokes the user listener. Only called with all locks released.
    pub(crate) fn notify(&self, item: u32, values: &Values) {
        self.listener.on_item_update(item, values);
    }
}

/// Concurrent registry of live subscriptions, keyed by subscription id.
///
/// Inserts come from Subscribe callers under the write lock; the reader
/// task looks entries up under the read lock and clones the `Arc` out, so
/// user callbacks never run with the registry locked.
#[derive(Default)]
pub(crate) struct Subscriptions {
    entries: RwLock<HashMap<u32, Arc<SubscriptionEntry>>>,
}

impl Subscriptions {
    pub(crate) fn add(&self, id: u32, entry: SubscriptionEntry) {
        self.entries.write().insert(id, Arc::new(entry));
    }

    pub(crate) fn get(&self, id: u32) -> Option<Arc<SubscriptionEntry>> {
        self.entries.read().get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
