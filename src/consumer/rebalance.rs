//! Membership-driven rebalancing and the contended-claim protocol
//!
//! A rebalance recomputes this member's slice of the partition list and
//! reconciles it against the claims currently held: revoked partitions are
//! released (owner node deleted, local consumer dropped) and newly owned
//! ones are claimed. Claims contend through ephemeral owner nodes: the
//! loser of a create race installs a watch on the winner's node and retries
//! when it disappears.
//!
//! Watch callbacks arrive on the coordinator's dispatch thread and funnel
//! through [`GroupCore::trigger_rebalance`], which coalesces bursts of
//! membership changes into at most one running rebalance plus one queued
//! follow-up.

use crate::broker::{FetchSpec, StartOffset};
use crate::consumer::assignment::pick;
use crate::consumer::group::{GroupCore, GroupState};
use crate::consumer::partition::PartitionConsumer;
use crate::coordinator::{CoordinatorError, CreateMode, WatchCallback};
use crate::error::{Result, ShepherdError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl GroupCore {
    /// Request a rebalance from a watch callback.
    ///
    /// Returns immediately when one is already pending; errors are logged
    /// because there is no caller to surface them to.
    pub(crate) fn trigger_rebalance(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.pending.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(error) = self.rebalance() {
            warn!(
                group = %self.name,
                member = %self.member_id,
                %error,
                "rebalance failed"
            );
        }
    }

    /// Recompute the assignment and reconcile claims.
    pub(crate) fn rebalance(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock();
        self.pending.store(false, Ordering::SeqCst);

        state.metadata = None;
        self.view(&mut state)?;
        // re-arms the members watch for the next membership change
        let members = self
            .coordinator
            .children(&self.paths.ids(), Some(self.members_watch()))?;
        let partition_ids: Vec<i32> = match &state.metadata {
            Some(view) => view.partitions().iter().map(|info| info.id).collect(),
            None => Vec::new(),
        };

        match pick(partition_ids.len(), &members, &self.member_id) {
            None => {
                info!(
                    group = %self.name,
                    member = %self.member_id,
                    members = members.len(),
                    "no partitions assigned"
                );
                self.release_all(&mut state)?;
            }
            Some(range) => {
                let desired: Vec<i32> = partition_ids[range].to_vec();
                let held: Vec<i32> = state
                    .consumers
                    .iter()
                    .map(PartitionConsumer::partition)
                    .collect();
                debug!(
                    group = %self.name,
                    member = %self.member_id,
                    members = members.len(),
                    ?held,
                    ?desired,
                    "rebalancing"
                );

                let abandoned: Vec<i32> = state
                    .claim_watches
                    .keys()
                    .copied()
                    .filter(|partition| !desired.contains(partition))
                    .collect();
                for partition in abandoned {
                    if let Some(handle) = state.claim_watches.remove(&partition) {
                        handle.unsubscribe();
                    }
                }

                for partition in held.iter().copied() {
                    if !desired.contains(&partition) {
                        self.release(&mut state, partition)?;
                    }
                }
                for partition in desired {
                    if !held.contains(&partition) {
                        self.claim(&mut state, partition)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn members_watch(self: &Arc<Self>) -> WatchCallback {
        let core = Arc::downgrade(self);
        Box::new(move |_event| {
            if let Some(core) = core.upgrade() {
                core.trigger_rebalance();
            }
        })
    }

    /// Claim `partition`, contending with other members via the ephemeral
    /// owner node. Idempotent while the partition is held or a claim watch
    /// is already pending.
    pub(crate) fn claim(self: &Arc<Self>, state: &mut GroupState, partition: i32) -> Result<()> {
        loop {
            let held = state
                .consumers
                .iter()
                .any(|consumer| consumer.partition() == partition);
            if held || state.claim_watches.contains_key(&partition) {
                return Ok(());
            }
            let path = self.paths.owner(partition);
            match self
                .coordinator
                .create(&path, self.member_id.as_bytes(), CreateMode::Ephemeral)
            {
                Ok(()) => {
                    let consumer = self.open_partition(state, partition)?;
                    state.consumers.push(consumer);
                    info!(
                        group = %self.name,
                        member = %self.member_id,
                        partition,
                        "claimed partition"
                    );
                    return Ok(());
                }
                Err(CoordinatorError::NodeExists(_)) => {
                    debug!(
                        group = %self.name,
                        partition,
                        "partition contended, watching owner node"
                    );
                    let handle = self.coordinator.register(&path, self.claim_watch(partition))?;
                    if self.coordinator.exists(&path)? {
                        state.claim_watches.insert(partition, handle);
                        return Ok(());
                    }
                    // owner vanished between the create race and the watch
                    handle.unsubscribe();
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn claim_watch(self: &Arc<Self>, partition: i32) -> WatchCallback {
        let core = Arc::downgrade(self);
        Box::new(move |event| {
            if !event.is_node_deleted() {
                return;
            }
            if let Some(core) = core.upgrade() {
                core.retry_claim(partition);
            }
        })
    }

    /// Watch-driven retry after a contending owner released `partition`.
    fn retry_claim(self: &Arc<Self>, partition: i32) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock();
        // no tracked watch means the claim was abandoned by a rebalance
        let Some(handle) = state.claim_watches.remove(&partition) else {
            return;
        };
        handle.unsubscribe();
        match self.claim(&mut state, partition) {
            Ok(()) => {}
            Err(error) => {
                warn!(
                    group = %self.name,
                    member = %self.member_id,
                    partition,
                    %error,
                    "claim retry failed"
                );
            }
        }
    }

    /// Release a held partition: delete the owner node (missing nodes are
    /// fine) and drop the local consumer.
    pub(crate) fn release(&self, state: &mut GroupState, partition: i32) -> Result<()> {
        if let Some(handle) = state.claim_watches.remove(&partition) {
            handle.unsubscribe();
        }
        match self.coordinator.delete(&self.paths.owner(partition)) {
            Ok(()) | Err(CoordinatorError::NoNode(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let before = state.consumers.len();
        state
            .consumers
            .retain(|consumer| consumer.partition() != partition);
        if state.consumers.len() != before {
            info!(
                group = %self.name,
                member = %self.member_id,
                partition,
                "released partition"
            );
        }
        Ok(())
    }

    /// Release every held partition and cancel pending claims.
    pub(crate) fn release_all(&self, state: &mut GroupState) -> Result<()> {
        for (_, handle) in state.claim_watches.drain() {
            handle.unsubscribe();
        }
        let held: Vec<i32> = state
            .consumers
            .iter()
            .map(PartitionConsumer::partition)
            .collect();
        for partition in held {
            self.release(state, partition)?;
        }
        Ok(())
    }

    /// Open a partition consumer against the partition's current leader.
    ///
    /// The start position comes from the stored offset when one exists;
    /// otherwise `trail` selects the tail, the head by default.
    fn open_partition(&self, state: &mut GroupState, partition: i32) -> Result<PartitionConsumer> {
        let stored = self.stored_offset(partition)?;
        let start = if stored > 0 {
            StartOffset::At(stored)
        } else if self.config.trail {
            StartOffset::Latest
        } else {
            StartOffset::Earliest
        };

        let view = self.view(state)?;
        let leader = view
            .leader(partition)
            .ok_or_else(|| ShepherdError::NoLeader {
                topic: self.topic.clone(),
                partition,
            })?;
        let spec = FetchSpec {
            client_id: self.name.clone(),
            host: leader.host.clone(),
            port: leader.port,
            topic: self.topic.clone(),
            partition,
            start,
            max_bytes: self.config.max_bytes,
            min_bytes: self.config.min_bytes,
            max_wait_ms: self.config.max_wait_ms,
            socket_timeout_ms: self.config.socket_timeout_ms,
        };
        let stream = self.brokers.partition_stream(&spec)?;
        debug!(group = %self.name, partition, ?start, "opened partition consumer");
        Ok(PartitionConsumer::new(partition, stream))
    }
}
