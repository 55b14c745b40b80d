//! Shared fixtures for consumer group integration tests
//!
//! `ScriptedBroker` stands in for the wire client: one broker node,
//! preloadable per-partition logs, and a record of every `FetchSpec` it was
//! asked to open. Combined with the in-memory coordinator it gives the
//! tests a fully deterministic cluster.

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use shepherd::{
    BrokerClient, BrokerInfo, FetchSpec, GroupConfig, Message, MetadataSnapshot, PartitionInfo,
    PartitionStream, Result, StartOffset,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Scripted in-memory broker
pub struct ScriptedBroker {
    topic: String,
    broker: BrokerInfo,
    logs: Arc<Mutex<HashMap<i32, Vec<Message>>>>,
    specs: Mutex<Vec<FetchSpec>>,
}

impl ScriptedBroker {
    /// Broker hosting `partitions` empty partitions of `topic`.
    pub fn new(topic: &str, partitions: i32) -> Arc<Self> {
        let logs = (0..partitions).map(|id| (id, Vec::new())).collect();
        Arc::new(Self {
            topic: topic.to_string(),
            broker: BrokerInfo {
                id: 1,
                host: "broker-1.local".into(),
                port: 9092,
            },
            logs: Arc::new(Mutex::new(logs)),
            specs: Mutex::new(Vec::new()),
        })
    }

    /// Append a message at the tail of `partition`.
    pub fn append(&self, partition: i32, value: &str) {
        let mut logs = self.logs.lock();
        let log = logs.entry(partition).or_default();
        let offset = log.len() as i64;
        log.push(Message {
            offset,
            key: None,
            value: Bytes::copy_from_slice(value.as_bytes()),
        });
    }

    /// Every `FetchSpec` passed to `partition_stream`, in call order.
    pub fn specs(&self) -> Vec<FetchSpec> {
        self.specs.lock().clone()
    }
}

impl BrokerClient for ScriptedBroker {
    fn fetch_metadata(&self, topic: &str) -> Result<MetadataSnapshot> {
        if topic != self.topic {
            return Ok(MetadataSnapshot::default());
        }
        let logs = self.logs.lock();
        let mut partitions: Vec<PartitionInfo> = logs
            .keys()
            .map(|&id| PartitionInfo {
                id,
                leader: Some(self.broker.id),
                replicas: vec![self.broker.id],
                isr: vec![self.broker.id],
            })
            .collect();
        partitions.sort_by_key(|partition| partition.id);
        Ok(MetadataSnapshot {
            brokers: vec![self.broker.clone()],
            partitions,
        })
    }

    fn partition_stream(&self, spec: &FetchSpec) -> Result<Box<dyn PartitionStream>> {
        self.specs.lock().push(spec.clone());
        let next = {
            let logs = self.logs.lock();
            let len = logs.get(&spec.partition).map_or(0, |log| log.len() as i64);
            match spec.start {
                StartOffset::Earliest => 0,
                StartOffset::Latest => len,
                StartOffset::At(offset) => offset,
            }
        };
        Ok(Box::new(ScriptedStream {
            logs: Arc::clone(&self.logs),
            partition: spec.partition,
            next,
        }))
    }
}

struct ScriptedStream {
    logs: Arc<Mutex<HashMap<i32, Vec<Message>>>>,
    partition: i32,
    next: i64,
}

impl PartitionStream for ScriptedStream {
    fn fetch(&mut self) -> Result<Vec<Message>> {
        let logs = self.logs.lock();
        let from = self.next.max(0) as usize;
        let batch: Vec<Message> = logs
            .get(&self.partition)
            .and_then(|log| log.get(from..))
            .unwrap_or(&[])
            .to_vec();
        self.next += batch.len() as i64;
        Ok(batch)
    }

    fn next_offset(&self) -> i64 {
        self.next
    }
}

/// Group config with a deterministic member id and a short loop delay.
pub fn member_config(member_id: &str) -> GroupConfig {
    GroupConfig::builder()
        .member_id(member_id)
        .loop_delay(Duration::from_millis(5))
        .build()
}
