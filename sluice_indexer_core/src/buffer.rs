use crate::{batch::FlushBatch, item::BufferedItem};

/// Items that have not been flushed yet, in arrival order.
///
/// `total_bytes` is always the sum of the items' sizes.
#[derive(Debug, Default)]
pub struct Buffer {
    items: Vec<BufferedItem>,
    total_bytes: u64,
}

impl Buffer {
    pub fn push(&mut self, item: BufferedItem) {
        self.total_bytes += item.size_bytes;
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Returns true if the buffer holds at least `max_items` items or `max_bytes` bytes.
    pub fn is_full(&self, max_items: usize, max_bytes: u64) -> bool {
        self.items.len() >= max_items || self.total_bytes >= max_bytes
    }

    /// Takes every buffered item, leaving the buffer empty.
    pub fn drain(&mut self, batch_id: u64) -> FlushBatch {
        let items = std::mem::take(&mut self.items);
        let size_bytes = std::mem::take(&mut self.total_bytes);
        FlushBatch::new(batch_id, items, size_bytes)
    }
}
