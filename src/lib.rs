#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Shepherd
//!
//! Self-balancing consumer groups for partitioned, append-only logs
//! (Kafka 0.8 style), coordinated through a hierarchical ephemeral-node
//! store (the ZooKeeper model).
//!
//! A [`ConsumerGroup`] is a named set of processes that collectively
//! consume every message of one topic exactly once: each partition is owned
//! by exactly one live member at any moment, ownership is renegotiated when
//! members join or leave, and every member persists its own per-partition
//! read offsets in the coordinator.
//!
//! ## How it works
//!
//! - Each member registers an ephemeral id node under
//!   `/consumers/<group>/ids` and watches the directory; membership changes
//!   trigger a rebalance.
//! - The deterministic [`pick`](consumer::pick) function maps the sorted
//!   member list onto contiguous partition ranges, so all members agree on
//!   the split without talking to each other.
//! - Claims are ephemeral owner nodes under
//!   `/consumers/<group>/owners/<topic>`; contended claims watch the
//!   current owner and retry when it disappears.
//! - Offsets are decimal payloads under
//!   `/consumers/<group>/offsets/<topic>`, committed automatically after
//!   each successful [`fetch`](ConsumerGroup::fetch).
//!
//! ## Example
//!
//! ```ignore
//! use shepherd::{Ack, ConsumerGroup, GroupConfig};
//! use std::sync::Arc;
//!
//! // `brokers` implements BrokerClient, `session` implements Coordinator.
//! let group = ConsumerGroup::new(
//!     "billing",
//!     brokers,
//!     session,
//!     "events",
//!     GroupConfig::default(),
//! )?;
//!
//! group.fetch_loop(|partition, messages| {
//!     for message in messages {
//!         handle(partition, message)?;
//!     }
//!     Ok(shepherd::LoopControl::Continue(Ack::Commit))
//! })?;
//! ```
//!
//! The wire protocol to the brokers and the coordinator client are external
//! collaborators behind the [`BrokerClient`] and [`Coordinator`] traits;
//! [`coordinator::memory`] ships an in-process coordinator with real
//! session and watch semantics for tests and examples.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod guid;
pub mod metadata;

pub use broker::{
    BrokerClient, BrokerInfo, FetchSpec, Message, MetadataSnapshot, PartitionInfo,
    PartitionStream, StartOffset,
};
pub use config::{FetchOptions, GroupConfig, GroupConfigBuilder};
pub use consumer::{pick, Ack, ConsumerGroup, LoopControl, PartitionConsumer, NO_PARTITION};
pub use coordinator::{
    Coordinator, CoordinatorError, CreateMode, GroupPaths, WatchCallback, WatchEvent, WatchHandle,
};
pub use error::{Result, ShepherdError};
pub use metadata::ClusterView;
