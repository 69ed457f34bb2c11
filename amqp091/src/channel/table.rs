use std::sync::Arc;

use slab::Slab;

use crate::error::Error;

/// Channels of a connection by id. Slab key `k` holds channel id `k + 1`.
#[derive(Debug)]
pub(crate) struct ChannelTable<T> {
    slots: Slab<Arc<T>>,
    channel_max: u16,
    closed: bool,
}

impl<T> ChannelTable<T> {
    /// `channel_max` of 0 means no limit below `u16::MAX`
    pub fn new(channel_max: u16) -> Self {
        let channel_max = match channel_max {
            0 => u16::MAX,
            max => max,
        };
        Self {
            slots: Slab::new(),
            channel_max,
            closed: false,
        }
    }

    /// Reserve a free id, the most recently released one first, and store the value built
    /// for it
    pub fn allocate(&mut self, make: impl FnOnce(u16) -> T) -> Result<Arc<T>, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let entry = self.slots.vacant_entry();
        let id = entry.key() + 1;
        if id > self.channel_max as usize {
            return Err(Error::ChannelMaxReached);
        }
        let value = Arc::new(make(id as u16));
        entry.insert(value.clone());
        Ok(value)
    }

    pub fn get(&self, id: u16) -> Option<&Arc<T>> {
        let key = (id as usize).checked_sub(1)?;
        self.slots.get(key)
    }

    /// Free `id` if it still holds `value`
    pub fn remove(&mut self, id: u16, value: &Arc<T>) -> bool {
        let Some(key) = (id as usize).checked_sub(1) else {
            return false;
        };
        match self.slots.get(key) {
            Some(current) if Arc::ptr_eq(current, value) => {
                self.slots.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Refuse further allocations and hand out every channel
    pub fn drain(&mut self) -> Vec<Arc<T>> {
        self.closed = true;
        self.slots.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
