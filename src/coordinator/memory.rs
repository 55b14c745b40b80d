//! In-process coordinator with ZooKeeper-style semantics
//!
//! [`MemoryCoordinator`] owns a shared node tree; every client connects a
//! [`MemorySession`] whose ephemeral nodes disappear when the session closes.
//! Watch callbacks are delivered from a dedicated dispatcher thread, so a
//! callback can safely take locks and issue further coordinator calls.
//!
//! This is the crate's reference coordinator and test double. Production
//! deployments implement [`Coordinator`] over a real ensemble instead.
//!
//! # Example
//!
//! ```
//! use shepherd::coordinator::memory::MemoryCoordinator;
//! use shepherd::coordinator::{Coordinator, CreateMode};
//!
//! let coordinator = MemoryCoordinator::new();
//! let session = coordinator.connect();
//! session.ensure_path("/consumers/demo/ids").unwrap();
//! session
//!     .create("/consumers/demo/ids/m1", b"{}", CreateMode::Ephemeral)
//!     .unwrap();
//! assert_eq!(
//!     session.children("/consumers/demo/ids", None).unwrap(),
//!     vec!["m1".to_string()]
//! );
//! ```

use super::{Coordinator, CoordinatorError, CreateMode, WatchCallback, WatchEvent, WatchHandle};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

type SharedCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

enum Job {
    Notify(SharedCallback, WatchEvent),
    Barrier(Sender<()>),
}

struct Node {
    payload: Vec<u8>,
    ephemeral_owner: Option<u64>,
}

#[derive(Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    /// One-shot child watches keyed by parent path.
    child_watches: HashMap<String, Vec<SharedCallback>>,
    /// Long-lived node watches keyed by path, with subscription ids.
    node_watches: HashMap<String, Vec<(u64, SharedCallback)>>,
}

struct Hub {
    tree: Mutex<Tree>,
    jobs: Sender<Job>,
    dispatched: AtomicU64,
    next_session: AtomicU64,
    next_watch: AtomicU64,
}

impl Hub {
    fn enqueue(&self, callback: SharedCallback, event: WatchEvent) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        let _ = self.jobs.send(Job::Notify(callback, event));
    }

    fn fire_node_watches(&self, tree: &Tree, path: &str, event: WatchEvent) {
        if let Some(watches) = tree.node_watches.get(path) {
            for (_, callback) in watches {
                self.enqueue(Arc::clone(callback), event);
            }
        }
    }

    fn fire_child_watches(&self, tree: &mut Tree, parent: &str) {
        if let Some(callbacks) = tree.child_watches.remove(parent) {
            for callback in callbacks {
                self.enqueue(callback, WatchEvent::ChildrenChanged);
            }
        }
    }

    fn create(
        &self,
        session: u64,
        path: &str,
        payload: &[u8],
        mode: CreateMode,
    ) -> Result<(), CoordinatorError> {
        let parent = valid_parent(path)?;
        let mut tree = self.tree.lock();
        if tree.nodes.contains_key(path) {
            return Err(CoordinatorError::NodeExists(path.to_string()));
        }
        if parent != "/" && !tree.nodes.contains_key(parent) {
            return Err(CoordinatorError::NoNode(parent.to_string()));
        }
        tree.nodes.insert(
            path.to_string(),
            Node {
                payload: payload.to_vec(),
                ephemeral_owner: (mode == CreateMode::Ephemeral).then_some(session),
            },
        );
        self.fire_node_watches(&tree, path, WatchEvent::NodeCreated);
        self.fire_child_watches(&mut tree, parent);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), CoordinatorError> {
        let parent = valid_parent(path)?;
        let mut tree = self.tree.lock();
        if !tree.nodes.contains_key(path) {
            return Err(CoordinatorError::NoNode(path.to_string()));
        }
        if has_children(&tree, path) {
            return Err(CoordinatorError::NotEmpty(path.to_string()));
        }
        tree.nodes.remove(path);
        self.fire_node_watches(&tree, path, WatchEvent::NodeDeleted);
        self.fire_child_watches(&mut tree, parent);
        Ok(())
    }

    fn set(&self, path: &str, payload: &[u8]) -> Result<(), CoordinatorError> {
        let mut tree = self.tree.lock();
        match tree.nodes.get_mut(path) {
            Some(node) => {
                node.payload = payload.to_vec();
            }
            None => return Err(CoordinatorError::NoNode(path.to_string())),
        }
        self.fire_node_watches(&tree, path, WatchEvent::NodeDataChanged);
        Ok(())
    }

    fn close_session(&self, session: u64) {
        let mut tree = self.tree.lock();
        let expired: Vec<String> = tree
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in expired {
            tree.nodes.remove(&path);
            self.fire_node_watches(&tree, &path, WatchEvent::NodeDeleted);
            if let Ok(parent) = valid_parent(&path) {
                self.fire_child_watches(&mut tree, parent);
            }
        }
    }
}

fn valid_parent(path: &str) -> Result<&str, CoordinatorError> {
    if path.len() < 2 || !path.starts_with('/') || path.ends_with('/') {
        return Err(CoordinatorError::Other(format!("invalid path: {path:?}")));
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Ok("/"),
        Some((parent, _)) => Ok(parent),
        None => Err(CoordinatorError::Other(format!("invalid path: {path:?}"))),
    }
}

fn has_children(tree: &Tree, path: &str) -> bool {
    let prefix = format!("{path}/");
    tree.nodes
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .next()
        .is_some()
}

fn dispatch_loop(jobs: Receiver<Job>) {
    for job in jobs {
        match job {
            Job::Notify(callback, event) => callback(event),
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// Shared in-process coordinator
///
/// Cheap to clone; all clones and their sessions share one node tree and one
/// watch dispatcher thread.
#[derive(Clone)]
pub struct MemoryCoordinator {
    hub: Arc<Hub>,
}

impl MemoryCoordinator {
    /// Create an empty coordinator and start its watch dispatcher.
    pub fn new() -> Self {
        let (jobs, receiver) = crossbeam_channel::unbounded();
        thread::spawn(move || dispatch_loop(receiver));
        Self {
            hub: Arc::new(Hub {
                tree: Mutex::new(Tree::default()),
                jobs,
                dispatched: AtomicU64::new(0),
                next_session: AtomicU64::new(1),
                next_watch: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new session.
    pub fn connect(&self) -> Arc<MemorySession> {
        Arc::new(MemorySession {
            hub: Arc::clone(&self.hub),
            id: self.hub.next_session.fetch_add(1, Ordering::SeqCst),
            closed: AtomicBool::new(false),
        })
    }

    /// Block until every queued watch event has been delivered and no new
    /// events were produced while draining. Intended for tests.
    pub fn flush(&self) {
        loop {
            let seen = self.hub.dispatched.load(Ordering::SeqCst);
            let (done, wait) = crossbeam_channel::bounded(1);
            if self.hub.jobs.send(Job::Barrier(done)).is_err() {
                return;
            }
            let _ = wait.recv();
            if self.hub.dispatched.load(Ordering::SeqCst) == seen {
                return;
            }
        }
    }
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// One client session against a [`MemoryCoordinator`]
///
/// Ephemeral nodes created through this session are removed when it closes
/// (explicitly or on drop), firing the corresponding watches.
pub struct MemorySession {
    hub: Arc<Hub>,
    id: u64,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), CoordinatorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoordinatorError::SessionClosed);
        }
        Ok(())
    }

    fn close_session(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.hub.close_session(self.id);
    }
}

impl Coordinator for MemorySession {
    fn ensure_path(&self, path: &str) -> Result<(), CoordinatorError> {
        self.ensure_open()?;
        let mut ancestor = String::new();
        for segment in path.trim_start_matches('/').split('/') {
            if segment.is_empty() {
                continue;
            }
            ancestor.push('/');
            ancestor.push_str(segment);
            match self.hub.create(self.id, &ancestor, b"", CreateMode::Persistent) {
                Ok(()) | Err(CoordinatorError::NodeExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn create(
        &self,
        path: &str,
        payload: &[u8],
        mode: CreateMode,
    ) -> Result<(), CoordinatorError> {
        self.ensure_open()?;
        self.hub.create(self.id, path, payload, mode)
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinatorError> {
        self.ensure_open()?;
        let tree = self.hub.tree.lock();
        Ok(tree.nodes.get(path).map(|node| node.payload.clone()))
    }

    fn set(&self, path: &str, payload: &[u8]) -> Result<(), CoordinatorError> {
        self.ensure_open()?;
        self.hub.set(path, payload)
    }

    fn delete(&self, path: &str) -> Result<(), CoordinatorError> {
        self.ensure_open()?;
        self.hub.delete(path)
    }

    fn children(
        &self,
        path: &str,
        watch: Option<WatchCallback>,
    ) -> Result<Vec<String>, CoordinatorError> {
        self.ensure_open()?;
        let mut tree = self.hub.tree.lock();
        if path != "/" && !tree.nodes.contains_key(path) {
            return Err(CoordinatorError::NoNode(path.to_string()));
        }
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let mut names = Vec::new();
        for (key, _) in tree.nodes.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            if !rest.is_empty() && !rest.contains('/') {
                names.push(rest.to_string());
            }
        }
        if let Some(callback) = watch {
            tree.child_watches
                .entry(path.to_string())
                .or_default()
                .push(Arc::from(callback));
        }
        Ok(names)
    }

    fn register(
        &self,
        path: &str,
        callback: WatchCallback,
    ) -> Result<Box<dyn WatchHandle>, CoordinatorError> {
        self.ensure_open()?;
        let id = self.hub.next_watch.fetch_add(1, Ordering::SeqCst);
        let mut tree = self.hub.tree.lock();
        tree.node_watches
            .entry(path.to_string())
            .or_default()
            .push((id, Arc::from(callback)));
        Ok(Box::new(MemoryWatchHandle {
            hub: Arc::clone(&self.hub),
            path: path.to_string(),
            id,
        }))
    }

    fn exists(&self, path: &str) -> Result<bool, CoordinatorError> {
        self.ensure_open()?;
        Ok(self.hub.tree.lock().nodes.contains_key(path))
    }

    fn close(&self) {
        self.close_session();
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close_session();
    }
}

struct MemoryWatchHandle {
    hub: Arc<Hub>,
    path: String,
    id: u64,
}

impl WatchHandle for MemoryWatchHandle {
    fn unsubscribe(&self) {
        let mut tree = self.hub.tree.lock();
        if let Some(watches) = tree.node_watches.get_mut(&self.path) {
            watches.retain(|(id, _)| *id != self.id);
            if watches.is_empty() {
                tree.node_watches.remove(&self.path);
            }
        }
    }
}
