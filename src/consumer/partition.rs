//! Per-partition fetch cursor

use crate::broker::{Message, PartitionStream};
use crate::error::Result;
use std::fmt;

/// Fetch cursor for one claimed partition
///
/// Wraps the broker client's stream. [`offset`](Self::offset) is the next
/// offset to read after the last returned batch, which is exactly the value
/// the group commits after a successful checkout.
pub struct PartitionConsumer {
    partition: i32,
    stream: Box<dyn PartitionStream>,
}

impl PartitionConsumer {
    pub(crate) fn new(partition: i32, stream: Box<dyn PartitionStream>) -> Self {
        Self { partition, stream }
    }

    /// Partition id this cursor consumes.
    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Fetch the next batch from the partition leader.
    pub fn fetch(&mut self) -> Result<Vec<Message>> {
        self.stream.fetch()
    }

    /// Next offset to read.
    pub fn offset(&self) -> i64 {
        self.stream.next_offset()
    }
}

impl fmt::Debug for PartitionConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionConsumer")
            .field("partition", &self.partition)
            .field("offset", &self.offset())
            .finish()
    }
}
