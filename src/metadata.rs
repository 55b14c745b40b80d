//! Cached view of cluster metadata for one topic
//!
//! The group keeps a [`ClusterView`] per instance and reloads it at every
//! rebalance. Only partitions with a live leader are retained; a partition
//! whose leader id points at an unknown broker is treated as unavailable.

use crate::broker::{BrokerClient, BrokerInfo, PartitionInfo};
use crate::error::Result;
use std::collections::HashMap;
use tracing::debug;

/// Broker map and available partitions of a single topic
#[derive(Debug, Clone, Default)]
pub struct ClusterView {
    brokers: HashMap<i32, BrokerInfo>,
    partitions: Vec<PartitionInfo>,
}

impl ClusterView {
    /// Fetch a fresh view from the broker client.
    ///
    /// Unknown topics produce an empty view.
    pub fn fetch(client: &dyn BrokerClient, topic: &str) -> Result<Self> {
        let snapshot = client.fetch_metadata(topic)?;
        let brokers: HashMap<i32, BrokerInfo> = snapshot
            .brokers
            .into_iter()
            .map(|broker| (broker.id, broker))
            .collect();
        let mut partitions: Vec<PartitionInfo> = snapshot
            .partitions
            .into_iter()
            .filter(|partition| {
                partition
                    .leader
                    .is_some_and(|leader| brokers.contains_key(&leader))
            })
            .collect();
        partitions.sort_by_key(|partition| partition.id);
        debug!(
            topic,
            brokers = brokers.len(),
            partitions = partitions.len(),
            "loaded cluster metadata"
        );
        Ok(Self {
            brokers,
            partitions,
        })
    }

    /// Available partitions (live leader), ascending by id.
    pub fn partitions(&self) -> &[PartitionInfo] {
        &self.partitions
    }

    /// Leader broker for `partition`, or `None` when unknown or unavailable.
    pub fn leader(&self, partition: i32) -> Option<&BrokerInfo> {
        self.partitions
            .iter()
            .find(|info| info.id == partition)
            .and_then(|info| info.leader)
            .and_then(|leader| self.brokers.get(&leader))
    }
}
