//! Consumer group facade
//!
//! [`ConsumerGroup`] ties the pieces together: it registers the member in
//! the coordinator, keeps the claimed partition consumers, schedules
//! checkouts round-robin and persists offsets. One group-wide mutex
//! serializes rebalancing, checkouts and release-on-close; coordinator watch
//! callbacks run on the coordinator's dispatch thread and re-enter through
//! [`GroupCore::trigger_rebalance`](crate::consumer::rebalance).
//!
//! # Example
//!
//! ```ignore
//! use shepherd::{Ack, ConsumerGroup, GroupConfig};
//!
//! let group = ConsumerGroup::new("billing", brokers, session, "events", GroupConfig::default())?;
//! group.fetch(|partition, messages| {
//!     for message in messages {
//!         process(partition, message);
//!     }
//!     Ok(Ack::Commit)
//! })?;
//! ```

use crate::broker::{BrokerClient, BrokerInfo, Message, PartitionInfo};
use crate::config::{FetchOptions, GroupConfig};
use crate::consumer::partition::PartitionConsumer;
use crate::coordinator::{Coordinator, CoordinatorError, CreateMode, GroupPaths, WatchHandle};
use crate::error::{Result, ShepherdError};
use crate::guid;
use crate::metadata::ClusterView;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Partition id yielded by `fetch_loop` when nothing is claimed.
pub const NO_PARTITION: i32 = -1;

/// Verdict returned by checkout and fetch callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Commit the consumer's advanced offset, unless the call opted out.
    Commit,
    /// Leave the stored offset untouched.
    Skip,
}

/// Verdict returned by `fetch_loop` callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Keep looping; commit per the inner [`Ack`].
    Continue(Ack),
    /// Leave the loop without committing this iteration.
    Stop,
}

/// Mutable group state guarded by the group mutex.
#[derive(Default)]
pub(crate) struct GroupState {
    pub(crate) registered: bool,
    pub(crate) metadata: Option<ClusterView>,
    /// Claimed consumers in claim order; checkout rotates this list.
    pub(crate) consumers: Vec<PartitionConsumer>,
    /// Watches on contended owner nodes, by partition.
    pub(crate) claim_watches: HashMap<i32, Box<dyn WatchHandle>>,
}

/// Shared core behind the [`ConsumerGroup`] handle.
pub(crate) struct GroupCore {
    pub(crate) name: String,
    pub(crate) topic: String,
    pub(crate) member_id: String,
    pub(crate) config: GroupConfig,
    pub(crate) paths: GroupPaths,
    pub(crate) coordinator: Arc<dyn Coordinator>,
    pub(crate) brokers: Arc<dyn BrokerClient>,
    pub(crate) state: Mutex<GroupState>,
    /// Coalesces overlapping rebalance requests.
    pub(crate) pending: AtomicBool,
    pub(crate) closed: AtomicBool,
}

impl GroupCore {
    /// Cached metadata view, fetched on first use.
    pub(crate) fn view<'a>(&self, state: &'a mut GroupState) -> Result<&'a mut ClusterView> {
        if state.metadata.is_none() {
            state.metadata = Some(ClusterView::fetch(self.brokers.as_ref(), &self.topic)?);
        }
        Ok(state.metadata.get_or_insert_with(ClusterView::default))
    }

    /// Stored next offset for `partition`; absent or empty reads as 0.
    pub(crate) fn stored_offset(&self, partition: i32) -> Result<i64> {
        let path = self.paths.offset(partition);
        let payload = self.coordinator.get(&path)?;
        parse_offset(&path, payload.as_deref())
    }

    /// Persist `offset`, creating the offset node on first commit.
    pub(crate) fn commit_offset(&self, partition: i32, offset: i64) -> Result<()> {
        let path = self.paths.offset(partition);
        let payload = offset.to_string();
        match self.coordinator.set(&path, payload.as_bytes()) {
            Ok(()) => {}
            Err(CoordinatorError::NoNode(_)) => {
                self.coordinator.ensure_path(&self.paths.offsets())?;
                match self
                    .coordinator
                    .create(&path, payload.as_bytes(), CreateMode::Persistent)
                {
                    Ok(()) | Err(CoordinatorError::NodeExists(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            Err(err) => return Err(err.into()),
        }
        debug!(group = %self.name, partition, offset, "committed offset");
        Ok(())
    }
}

fn parse_offset(path: &str, payload: Option<&[u8]>) -> Result<i64> {
    let Some(payload) = payload else {
        return Ok(0);
    };
    let invalid = || ShepherdError::InvalidOffset {
        path: path.to_string(),
        payload: String::from_utf8_lossy(payload).into_owned(),
    };
    let text = std::str::from_utf8(payload).map_err(|_| invalid())?.trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse().map_err(|_| invalid())
}

/// Self-balancing consumer group member
///
/// A group is a named set of processes collectively consuming one topic:
/// each available partition is owned by exactly one live member, every
/// member tracks and persists its own per-partition offsets, and the
/// partition split is renegotiated whenever the member set changes.
///
/// The handle is cheap to clone; all clones drive the same member. Multiple
/// application threads may call [`fetch`](Self::fetch) /
/// [`checkout`](Self::checkout) concurrently; the group lock serializes
/// them and guarantees per-partition commit ordering.
#[derive(Clone)]
pub struct ConsumerGroup {
    core: Arc<GroupCore>,
}

impl ConsumerGroup {
    /// Join `name` as a new member consuming `topic`.
    ///
    /// Generates a process-unique member id, registers it in the
    /// coordinator and runs the initial rebalance, unless
    /// [`register`](GroupConfig::register) is disabled.
    pub fn new(
        name: impl Into<String>,
        brokers: Arc<dyn BrokerClient>,
        coordinator: Arc<dyn Coordinator>,
        topic: impl Into<String>,
        config: GroupConfig,
    ) -> Result<Self> {
        let name = name.into();
        let topic = topic.into();
        let member_id = config
            .member_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", name, guid::generate()));
        let register = config.register;

        let core = Arc::new(GroupCore {
            paths: GroupPaths::new(&name, &topic),
            name,
            topic,
            member_id,
            config,
            coordinator,
            brokers,
            state: Mutex::new(GroupState::default()),
            pending: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let group = ConsumerGroup { core };
        if register {
            group.register()?;
        }
        Ok(group)
    }

    /// Member id of this instance.
    pub fn id(&self) -> &str {
        &self.core.member_id
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Topic consumed by the group.
    pub fn topic(&self) -> &str {
        &self.core.topic
    }

    /// Whether this member currently appears in the registry.
    pub fn is_registered(&self) -> bool {
        self.core.state.lock().registered
    }

    /// Create the registry directories, register this member and run the
    /// initial rebalance.
    ///
    /// Idempotent: returns `Ok(false)` when already registered. The
    /// rebalance installs the members-directory watch that keeps the
    /// assignment current from then on.
    pub fn register(&self) -> Result<bool> {
        if self.core.closed.load(Ordering::SeqCst) {
            return Err(ShepherdError::Closed);
        }
        {
            let mut state = self.core.state.lock();
            if state.registered {
                return Ok(false);
            }
            let coordinator = &self.core.coordinator;
            coordinator.ensure_path(&self.core.paths.ids())?;
            coordinator.ensure_path(&self.core.paths.owners())?;
            coordinator.ensure_path(&self.core.paths.offsets())?;
            coordinator.create(
                &self.core.paths.member(&self.core.member_id),
                b"{}",
                CreateMode::Ephemeral,
            )?;
            state.registered = true;
        }
        self.core.rebalance()?;
        Ok(true)
    }

    /// Partition ids currently held, ascending.
    pub fn claimed(&self) -> Vec<i32> {
        let state = self.core.state.lock();
        let mut ids: Vec<i32> = state
            .consumers
            .iter()
            .map(PartitionConsumer::partition)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Available partitions of the topic, ascending by id.
    pub fn partitions(&self) -> Result<Vec<PartitionInfo>> {
        let mut state = self.core.state.lock();
        let view = self.core.view(&mut state)?;
        Ok(view.partitions().to_vec())
    }

    /// Leader broker for `partition`, or `None` when unknown.
    pub fn leader(&self, partition: i32) -> Result<Option<BrokerInfo>> {
        let mut state = self.core.state.lock();
        let view = self.core.view(&mut state)?;
        Ok(view.leader(partition).cloned())
    }

    /// Stored next offset for `partition`; an absent offset node reads as 0.
    pub fn offset(&self, partition: i32) -> Result<i64> {
        self.core.stored_offset(partition)
    }

    /// Persist `offset` as the next offset to read from `partition`,
    /// creating the offset node on first commit.
    pub fn commit(&self, partition: i32, offset: i64) -> Result<()> {
        self.core.commit_offset(partition, offset)
    }

    /// Borrow one claimed consumer for a single operation.
    ///
    /// Consumers are visited round-robin across calls. Returns `Ok(false)`
    /// without invoking the callback when nothing is claimed. The callback
    /// runs while the group lock is held; afterwards, unless it returned
    /// [`Ack::Skip`] or errored, the consumer's advanced offset is
    /// committed.
    pub fn checkout<F>(&self, callback: F) -> Result<bool>
    where
        F: FnOnce(&mut PartitionConsumer) -> Result<Ack>,
    {
        self.checkout_with(&FetchOptions::default(), callback)
    }

    /// [`checkout`](Self::checkout) with explicit per-call options.
    pub fn checkout_with<F>(&self, options: &FetchOptions, callback: F) -> Result<bool>
    where
        F: FnOnce(&mut PartitionConsumer) -> Result<Ack>,
    {
        let mut state = self.core.state.lock();
        if state.consumers.is_empty() {
            return Ok(false);
        }
        state.consumers.rotate_left(1);
        let ack = callback(&mut state.consumers[0])?;
        let partition = state.consumers[0].partition();
        let offset = state.consumers[0].offset();
        drop(state);

        if options.commit && ack == Ack::Commit {
            self.core.commit_offset(partition, offset)?;
        }
        Ok(true)
    }

    /// Fetch one batch from the next claimed partition and hand it to the
    /// callback as `(partition, messages)`.
    ///
    /// Returns `Ok(false)` without invoking the callback when nothing is
    /// claimed. Commit semantics follow [`checkout`](Self::checkout).
    pub fn fetch<F>(&self, callback: F) -> Result<bool>
    where
        F: FnOnce(i32, &[Message]) -> Result<Ack>,
    {
        self.fetch_with(&FetchOptions::default(), callback)
    }

    /// [`fetch`](Self::fetch) with explicit per-call options.
    pub fn fetch_with<F>(&self, options: &FetchOptions, callback: F) -> Result<bool>
    where
        F: FnOnce(i32, &[Message]) -> Result<Ack>,
    {
        self.checkout_with(options, |consumer| {
            let batch = consumer.fetch()?;
            callback(consumer.partition(), &batch)
        })
    }

    /// Fetch in an endless loop.
    ///
    /// When nothing is claimed the callback is invoked with
    /// `(NO_PARTITION, &[])`; when nothing was claimed or the batch was
    /// empty the loop sleeps for the configured `loop_delay` before the
    /// next round. The loop only ends when the callback returns
    /// [`LoopControl::Stop`] (that iteration is not committed) or an error
    /// propagates.
    pub fn fetch_loop<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(i32, &[Message]) -> Result<LoopControl>,
    {
        self.fetch_loop_with(&FetchOptions::default(), callback)
    }

    /// [`fetch_loop`](Self::fetch_loop) with explicit per-call options.
    pub fn fetch_loop_with<F>(&self, options: &FetchOptions, mut callback: F) -> Result<()>
    where
        F: FnMut(i32, &[Message]) -> Result<LoopControl>,
    {
        let delay = options.loop_delay.unwrap_or(self.core.config.loop_delay);
        loop {
            let mut had_messages = false;
            let mut stopped = false;
            let claimed = self.fetch_with(options, |partition, messages| {
                had_messages = !messages.is_empty();
                match callback(partition, messages)? {
                    LoopControl::Continue(ack) => Ok(ack),
                    LoopControl::Stop => {
                        stopped = true;
                        Ok(Ack::Skip)
                    }
                }
            })?;
            if stopped {
                return Ok(());
            }
            if !claimed {
                match callback(NO_PARTITION, &[])? {
                    LoopControl::Stop => return Ok(()),
                    LoopControl::Continue(_) => {}
                }
            }
            if !claimed || !had_messages {
                thread::sleep(delay);
            }
        }
    }

    /// Drop the cached cluster metadata and fetch a fresh view.
    pub fn reload(&self) -> Result<()> {
        let mut state = self.core.state.lock();
        state.metadata = None;
        self.core.view(&mut state)?;
        Ok(())
    }

    /// Release every held partition and close the coordinator session.
    ///
    /// The member's ephemeral nodes disappear with the session; remaining
    /// members observe the change and rebalance. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.core.state.lock();
        let released = self.core.release_all(&mut state);
        state.registered = false;
        drop(state);
        self.core.coordinator.close();
        released
    }
}
