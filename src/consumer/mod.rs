//! Consumer group core
//!
//! This module implements the coordination subsystem: the deterministic
//! partition [`assignment`], the per-partition cursor in [`partition`], the
//! [`rebalance`] protocol with contended claims, and the [`group`] facade
//! with its round-robin checkout scheduler.

pub mod assignment;
pub mod group;
pub mod partition;
pub mod rebalance;

pub use assignment::pick;
pub use group::{Ack, ConsumerGroup, LoopControl, NO_PARTITION};
pub use partition::PartitionConsumer;
