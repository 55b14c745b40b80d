//! External broker-client interface
//!
//! The wire protocol to broker nodes is out of scope; the group consumes it
//! through two narrow seams: [`BrokerClient`] for cluster metadata and
//! stream construction, and [`PartitionStream`] as the per-partition fetch
//! cursor. Test suites script these traits in memory; production code backs
//! them with a real protocol client.

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single message returned by a partition fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Offset of this message within its partition.
    pub offset: i64,
    /// Optional message key.
    pub key: Option<Bytes>,
    /// Message payload.
    pub value: Bytes,
}

/// Where a partition stream starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    /// Head of the partition.
    Earliest,
    /// Tail of the partition.
    Latest,
    /// A specific next offset.
    At(i64),
}

/// Broker record from cluster metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    /// Broker id.
    pub id: i32,
    /// Hostname or address.
    pub host: String,
    /// Port.
    pub port: u16,
}

/// Partition record from topic metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Partition id.
    pub id: i32,
    /// Broker id of the current leader, if any.
    pub leader: Option<i32>,
    /// Replica broker ids.
    pub replicas: Vec<i32>,
    /// In-sync replica broker ids.
    pub isr: Vec<i32>,
}

/// Topic metadata as returned by [`BrokerClient::fetch_metadata`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Known brokers.
    pub brokers: Vec<BrokerInfo>,
    /// Partitions of the requested topic; empty when the topic is unknown.
    pub partitions: Vec<PartitionInfo>,
}

/// Parameters for opening a partition stream
#[derive(Debug, Clone)]
pub struct FetchSpec {
    /// Client id reported to the broker (the group name).
    pub client_id: String,
    /// Leader host.
    pub host: String,
    /// Leader port.
    pub port: u16,
    /// Topic to fetch from.
    pub topic: String,
    /// Partition to fetch from.
    pub partition: i32,
    /// Initial cursor position.
    pub start: StartOffset,
    /// Maximum fetch size in bytes.
    pub max_bytes: u32,
    /// Minimum fetch size in bytes.
    pub min_bytes: u32,
    /// Maximum fetch wait in milliseconds.
    pub max_wait_ms: u64,
    /// Socket timeout in milliseconds.
    pub socket_timeout_ms: u64,
}

/// Wire client for a cluster of brokers
pub trait BrokerClient: Send + Sync {
    /// Fetch cluster metadata for `topic`. Unknown topics yield a snapshot
    /// with no partitions rather than an error.
    fn fetch_metadata(&self, topic: &str) -> Result<MetadataSnapshot>;

    /// Open a fetch cursor against the partition leader described by `spec`.
    fn partition_stream(&self, spec: &FetchSpec) -> Result<Box<dyn PartitionStream>>;
}

/// Per-partition fetch cursor provided by the broker client
pub trait PartitionStream: Send {
    /// Fetch the next batch; empty when caught up.
    fn fetch(&mut self) -> Result<Vec<Message>>;

    /// Next offset to read after the last returned batch.
    fn next_offset(&self) -> i64;
}
