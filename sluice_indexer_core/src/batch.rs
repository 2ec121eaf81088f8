use sluice_store::WriteDescriptor;

use crate::item::BufferedItem;

/// Items drained from the buffer in one go, in arrival order.
///
/// A batch owns its items: once drained they are never returned to the buffer, whatever
/// the outcome of the write.
#[derive(Debug, PartialEq, Eq)]
pub struct FlushBatch {
    id: u64,
    items: Vec<BufferedItem>,
    size_bytes: u64,
}

impl FlushBatch {
    pub(crate) fn new(id: u64, items: Vec<BufferedItem>, size_bytes: u64) -> Self {
        Self {
            id,
            items,
            size_bytes,
        }
    }

    /// Sequence number of the batch, starting from zero.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of the items' sizes, envelope included.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn items(&self) -> &[BufferedItem] {
        &self.items
    }

    /// Converts the batch into one write descriptor per item, in arrival order.
    pub fn into_descriptors(self) -> Vec<WriteDescriptor> {
        self.items
            .into_iter()
            .map(BufferedItem::into_descriptor)
            .collect()
    }
}
