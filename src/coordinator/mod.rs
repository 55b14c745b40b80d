//! Coordinator abstraction
//!
//! The group talks to a hierarchical, sessioned metadata store with
//! ephemeral nodes and watches (the ZooKeeper model) through the
//! [`Coordinator`] trait. Implementations must deliver watch callbacks from
//! their own dispatch thread, never from inside the mutating call that
//! produced the event: group callbacks acquire the group lock and may issue
//! further coordinator calls.
//!
//! [`memory`] provides an in-process implementation with real session and
//! watch semantics, used as the crate's test double.

pub mod memory;

use thiserror::Error;

/// Errors surfaced by a [`Coordinator`] implementation
///
/// The consumer group core reacts only to [`NodeExists`](Self::NodeExists)
/// (contended claims) and [`NoNode`](Self::NoNode) (create-on-commit,
/// ignore-on-release); everything else propagates.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Create raced with an existing node.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// Operation against a missing node.
    #[error("no node: {0}")]
    NoNode(String),

    /// Delete against a node that still has children.
    #[error("node has children: {0}")]
    NotEmpty(String),

    /// The session backing this handle was closed.
    #[error("coordinator session closed")]
    SessionClosed,

    /// Implementation-specific failure.
    #[error("coordinator failure: {0}")]
    Other(String),
}

/// Event delivered to a watch callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched node was created.
    NodeCreated,
    /// The watched node was deleted.
    NodeDeleted,
    /// The watched node's payload changed.
    NodeDataChanged,
    /// The watched node's child set changed.
    ChildrenChanged,
}

impl WatchEvent {
    /// True when the watched node was deleted.
    pub fn is_node_deleted(self) -> bool {
        matches!(self, WatchEvent::NodeDeleted)
    }
}

/// Callback invoked from the coordinator's dispatch thread.
pub type WatchCallback = Box<dyn Fn(WatchEvent) + Send + Sync>;

/// Handle for a watch installed with [`Coordinator::register`].
///
/// Dropping the handle does not unsubscribe; callers that abandon a watch
/// early must call [`unsubscribe`](Self::unsubscribe).
pub trait WatchHandle: Send {
    /// Remove the watch; pending deliveries may still arrive.
    fn unsubscribe(&self);
}

/// Node creation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Outlives the creating session.
    Persistent,
    /// Dies with the creating session.
    Ephemeral,
}

/// Client session against the coordinator
///
/// All paths are absolute, `/`-separated. Ephemeral nodes created through a
/// session disappear when that session closes or is lost.
pub trait Coordinator: Send + Sync {
    /// Create `path` and any missing ancestors as persistent nodes.
    /// Idempotent.
    fn ensure_path(&self, path: &str) -> std::result::Result<(), CoordinatorError>;

    /// Create a node with the given payload. Fails with
    /// [`CoordinatorError::NodeExists`] when present and
    /// [`CoordinatorError::NoNode`] when the parent is missing.
    fn create(
        &self,
        path: &str,
        payload: &[u8],
        mode: CreateMode,
    ) -> std::result::Result<(), CoordinatorError>;

    /// Read a node payload; `Ok(None)` when the node does not exist.
    fn get(&self, path: &str) -> std::result::Result<Option<Vec<u8>>, CoordinatorError>;

    /// Overwrite a node payload. Fails with [`CoordinatorError::NoNode`]
    /// when absent.
    fn set(&self, path: &str, payload: &[u8]) -> std::result::Result<(), CoordinatorError>;

    /// Delete a node. Fails with [`CoordinatorError::NoNode`] when absent.
    fn delete(&self, path: &str) -> std::result::Result<(), CoordinatorError>;

    /// List direct child names of `path`, optionally arming a one-shot watch
    /// fired as [`WatchEvent::ChildrenChanged`] on the next child-set change.
    fn children(
        &self,
        path: &str,
        watch: Option<WatchCallback>,
    ) -> std::result::Result<Vec<String>, CoordinatorError>;

    /// Install a long-lived node watch on `path`. Fires on create, delete
    /// and payload change until unsubscribed; the node need not exist yet.
    fn register(
        &self,
        path: &str,
        callback: WatchCallback,
    ) -> std::result::Result<Box<dyn WatchHandle>, CoordinatorError>;

    /// Whether a node exists at `path`.
    fn exists(&self, path: &str) -> std::result::Result<bool, CoordinatorError>;

    /// Close the session; ephemeral nodes created by it are removed and the
    /// corresponding watches fire on other sessions.
    fn close(&self);
}

/// Registry layout for one group consuming one topic
///
/// ```text
/// /consumers/<group>/ids/<member_id>            ephemeral, "{}"
/// /consumers/<group>/owners/<topic>/<partition> ephemeral, member id
/// /consumers/<group>/offsets/<topic>/<partition> persistent, decimal offset
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPaths {
    group: String,
    topic: String,
}

impl GroupPaths {
    /// Layout for `group` consuming `topic`.
    pub fn new(group: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            topic: topic.into(),
        }
    }

    /// Directory of live member nodes.
    pub fn ids(&self) -> String {
        format!("/consumers/{}/ids", self.group)
    }

    /// Ephemeral node for one member.
    pub fn member(&self, member_id: &str) -> String {
        format!("/consumers/{}/ids/{}", self.group, member_id)
    }

    /// Directory of partition owner nodes.
    pub fn owners(&self) -> String {
        format!("/consumers/{}/owners/{}", self.group, self.topic)
    }

    /// Ephemeral owner node for one partition.
    pub fn owner(&self, partition: i32) -> String {
        format!("/consumers/{}/owners/{}/{}", self.group, self.topic, partition)
    }

    /// Directory of persisted offsets.
    pub fn offsets(&self) -> String {
        format!("/consumers/{}/offsets/{}", self.group, self.topic)
    }

    /// Persistent offset node for one partition.
    pub fn offset(&self, partition: i32) -> String {
        format!("/consumers/{}/offsets/{}/{}", self.group, self.topic, partition)
    }
}
