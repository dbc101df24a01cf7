//! Graph Nodes
//!
//! This module defines the runtime node behind every property and signal
//! of a component instance. A node owns its [`ValueCell`], the connectors
//! for its dependency paths, and weak links to the nodes that depend on it.
//!
//! # Freshness
//!
//! Derived nodes remember the highest upstream timestamp they have seen.
//! A node is stale when any bound upstream carries a newer timestamp than
//! that, when it has never been computed, or when a rebind forced it.
//!
//! Sources with dependencies (the members of a cycle) use a stricter test:
//! they only recompute from upstream when the upstream change originated
//! after their own last explicit write. Every stamped value carries such an
//! origin, so a change travelling around a cycle does not overwrite the
//! value that started it.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::connector::{self, Connector};
use super::scheduler::WeakLoop;
use crate::cell::{next_timestamp, ValueCell};
use crate::error::{Error, Result};
use crate::reactive::component::ComponentInner;
use crate::reactive::{Component, EvaluationContext, Inputs, SignalDecl, SignalMode};
use crate::Value;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A property cell, written only through mutators.
    Property,

    /// A declared signal in one of the three evaluation modes.
    Signal(SignalMode),
}

/// Connection state of a node's dependency paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No resolution has been attempted yet.
    Uninitialized,

    /// Every dependency path is bound.
    Connected,

    /// At least one path is unbound; carries the diagnostic.
    NotConnected(String),
}

/// Outcome of processing a queued push node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reaction {
    Ran,
    UpToDate,
    Skipped,
}

/// Upstream value captured before an evaluation.
struct Snapshot {
    value: Option<Value>,
    timestamp: u64,
    origin: u64,
}

struct NodeState {
    cell: ValueCell,

    /// Last explicit input of a source, before transformation.
    explicit: Option<Value>,
    explicit_stamp: u64,

    /// Stamp of the external write this value ultimately derives from.
    origin: u64,

    /// Highest upstream timestamp seen at the last computation.
    seen: u64,

    computed: bool,
    force: bool,
    connectors: SmallVec<[Connector; 4]>,
    connection: ConnectionState,
}

/// A property or signal of one component instance.
pub(crate) struct Node {
    id: NodeId,
    name: String,
    kind: NodeKind,
    decl: Option<Arc<SignalDecl>>,
    owner: Weak<ComponentInner>,
    event_loop: WeakLoop,
    state: Mutex<NodeState>,
    dependents: Mutex<Vec<Weak<Node>>>,
}

impl Node {
    fn with_kind(
        name: String,
        kind: NodeKind,
        decl: Option<Arc<SignalDecl>>,
        owner: Weak<ComponentInner>,
        event_loop: WeakLoop,
    ) -> Self {
        let connectors: SmallVec<[Connector; 4]> = decl
            .iter()
            .flat_map(|decl| decl.paths().iter().cloned())
            .map(Connector::new)
            .collect();
        let connection = if connectors.is_empty() {
            ConnectionState::Connected
        } else {
            ConnectionState::Uninitialized
        };
        Self {
            id: NodeId::new(),
            kind,
            decl,
            owner,
            event_loop,
            state: Mutex::new(NodeState {
                cell: ValueCell::new(name.clone()),
                explicit: None,
                explicit_stamp: 0,
                origin: 0,
                seen: 0,
                computed: false,
                force: false,
                connectors,
                connection,
            }),
            dependents: Mutex::new(Vec::new()),
            name,
        }
    }

    /// Create the node for a property.
    pub(crate) fn property(name: &str, owner: Weak<ComponentInner>, event_loop: WeakLoop) -> Self {
        Self::with_kind(name.to_string(), NodeKind::Property, None, owner, event_loop)
    }

    /// Create the node for a signal declaration.
    pub(crate) fn signal(
        decl: Arc<SignalDecl>,
        owner: Weak<ComponentInner>,
        event_loop: WeakLoop,
    ) -> Self {
        Self::with_kind(
            decl.name().to_string(),
            NodeKind::Signal(decl.mode()),
            Some(decl),
            owner,
            event_loop,
        )
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn mode(&self) -> Option<SignalMode> {
        match self.kind {
            NodeKind::Property => None,
            NodeKind::Signal(mode) => Some(mode),
        }
    }

    pub(crate) fn decl(&self) -> Option<&Arc<SignalDecl>> {
        self.decl.as_ref()
    }

    pub(crate) fn is_push(&self) -> bool {
        self.kind == NodeKind::Signal(SignalMode::Push)
    }

    pub(crate) fn cell(&self) -> ValueCell {
        self.state.lock().cell.clone()
    }

    /// The cached value, without evaluating.
    pub(crate) fn cached(&self) -> Option<Value> {
        self.state.lock().cell.value().cloned()
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.state.lock().computed
    }

    pub(crate) fn connection(&self) -> ConnectionState {
        self.state.lock().connection.clone()
    }

    /// The `not_connected` diagnostic, or `None` when connected.
    pub(crate) fn not_connected(&self) -> Option<String> {
        match &self.state.lock().connection {
            ConnectionState::Connected => None,
            ConnectionState::Uninitialized => Some(format!("signal '{}' is not connected yet", self.name)),
            ConnectionState::NotConnected(reason) => Some(reason.clone()),
        }
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            value: state.cell.value().cloned(),
            timestamp: state.cell.timestamp(),
            origin: state.origin,
        }
    }

    // ------------------------------------------------------------------
    // Dependents
    // ------------------------------------------------------------------

    pub(crate) fn add_dependent(&self, node: &Arc<Node>) {
        let mut dependents = self.dependents.lock();
        let known = dependents
            .iter()
            .filter_map(Weak::upgrade)
            .any(|existing| existing.id == node.id);
        if !known {
            dependents.push(Arc::downgrade(node));
        }
    }

    pub(crate) fn remove_dependent(&self, id: NodeId) {
        self.dependents
            .lock()
            .retain(|weak| weak.upgrade().is_some_and(|node| node.id != id));
    }

    fn live_dependents(&self) -> Vec<Arc<Node>> {
        let mut dependents = self.dependents.lock();
        dependents.retain(|weak| weak.strong_count() > 0);
        dependents.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn dependent_count(&self) -> usize {
        self.live_dependents().len()
    }

    /// Queue every push node downstream of this one.
    ///
    /// Pull nodes are not touched; they notice staleness when read. The
    /// walk still passes through them to reach the push nodes beyond.
    pub(crate) fn invalidate_downstream(&self) {
        let mut visited = HashSet::new();
        visited.insert(self.id);
        let mut queue: VecDeque<Arc<Node>> = self.live_dependents().into();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node.id) {
                continue;
            }
            if node.is_push() {
                node.event_loop.schedule(Arc::clone(&node));
            }
            queue.extend(node.live_dependents());
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Mutator write into a property cell.
    pub(crate) fn mutate(&self, value: Value) {
        let stamp = next_timestamp();
        {
            let mut state = self.state.lock();
            state.cell.write(value, stamp);
            state.origin = stamp;
            state.computed = true;
        }
        trace!(property = %self.name, stamp, "property mutated");
        self.invalidate_downstream();
    }

    fn source_decl(&self, operation: &'static str) -> Result<&Arc<SignalDecl>> {
        match (&self.decl, self.kind) {
            (Some(decl), NodeKind::Signal(SignalMode::Source)) => Ok(decl),
            (_, NodeKind::Signal(mode)) => Err(Error::UnsupportedCall {
                signal: self.name.clone(),
                mode,
                operation,
            }),
            (_, NodeKind::Property) => Err(Error::ReadOnly {
                name: self.name.clone(),
            }),
        }
    }

    /// Write a source's default value at construction time.
    pub(crate) fn initialize(&self, stamp: u64) -> Result<()> {
        let Some(decl) = self.decl.as_ref() else {
            return Ok(());
        };
        let Some(default) = decl.default_value() else {
            return Ok(());
        };
        let value = decl.transform(default)?;
        let mut state = self.state.lock();
        state.explicit = Some(default.clone());
        state.explicit_stamp = stamp;
        state.origin = stamp;
        state.computed = true;
        state.cell.write(value, stamp);
        Ok(())
    }

    /// The dedicated setter of a source node.
    pub(crate) fn set_explicit(&self, value: Value) -> Result<()> {
        let decl = self.source_decl("set")?;
        let transformed = decl.transform(&value)?;
        let stamp = next_timestamp();
        {
            let mut state = self.state.lock();
            state.explicit = Some(value);
            state.explicit_stamp = stamp;
            state.origin = stamp;
            state.computed = true;
            state.cell.write(transformed, stamp);
        }
        debug!(signal = %self.name, stamp, "source set");
        self.invalidate_downstream();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    fn owner(&self) -> Option<Component> {
        self.owner.upgrade().map(Component::from_inner)
    }

    /// Resolve every dependency path and bind to the nodes found.
    ///
    /// A path that no longer resolves keeps its existing live binding.
    /// Returns the bound upstream nodes in declaration order.
    pub(crate) fn connect(self: &Arc<Self>) -> Result<SmallVec<[Arc<Node>; 4]>> {
        let Some(owner) = self.owner() else {
            let err = Error::OwnerDropped {
                signal: self.name.clone(),
            };
            self.state.lock().connection = ConnectionState::NotConnected(err.to_string());
            return Err(err);
        };

        let paths: SmallVec<[_; 4]> = self
            .state
            .lock()
            .connectors
            .iter()
            .map(|c| c.path().clone())
            .collect();
        let outcomes: SmallVec<[Result<Arc<Node>>; 4]> = paths
            .iter()
            .map(|path| connector::resolve(&owner, path, self))
            .collect();

        let mut targets = SmallVec::new();
        let mut subscribe: SmallVec<[Arc<Node>; 4]> = SmallVec::new();
        let mut unsubscribe: SmallVec<[Weak<Node>; 4]> = SmallVec::new();
        let mut failure = None;
        {
            let mut state = self.state.lock();
            let mut rebound = false;
            for (connector, outcome) in state.connectors.iter_mut().zip(outcomes) {
                match outcome {
                    Ok(node) => {
                        let current = connector.live_target();
                        if !current.is_some_and(|current| Arc::ptr_eq(&current, &node)) {
                            if let Some(old) = connector.bind(&node) {
                                rebound |= old.strong_count() > 0;
                                unsubscribe.push(old);
                            }
                            subscribe.push(Arc::clone(&node));
                        }
                        targets.push(node);
                    }
                    Err(err) => match connector.live_target() {
                        Some(node) => targets.push(node),
                        None => {
                            failure.get_or_insert(err);
                        }
                    },
                }
            }
            if rebound {
                state.force = true;
            }
            state.connection = match &failure {
                None => ConnectionState::Connected,
                Some(err) => ConnectionState::NotConnected(err.to_string()),
            };
        }

        for old in unsubscribe.iter().filter_map(Weak::upgrade) {
            old.remove_dependent(self.id);
        }
        for node in &subscribe {
            node.add_dependent(self);
            debug!(signal = %self.name, upstream = %node.name, "bound dependency");
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(targets),
        }
    }

    /// Drop every binding. Push nodes reconnect immediately.
    pub(crate) fn disconnect(self: &Arc<Self>) {
        let old: SmallVec<[Weak<Node>; 4]> = {
            let mut state = self.state.lock();
            let old = state.connectors.iter_mut().filter_map(Connector::unbind).collect();
            state.connection =
                ConnectionState::NotConnected(format!("signal '{}' was disconnected", self.name));
            if self.mode() != Some(SignalMode::Source) {
                state.force = true;
            }
            old
        };
        for node in old.iter().filter_map(Weak::upgrade) {
            node.remove_dependent(self.id);
        }
        debug!(signal = %self.name, "disconnected");

        if self.is_push() {
            match self.connect() {
                Ok(_) => self.event_loop.schedule(Arc::clone(self)),
                Err(err) => debug!(signal = %self.name, %err, "reconnect failed"),
            }
        }
    }

    /// Called when an attribute crossed by one of our paths changes.
    pub(crate) fn path_changed(self: &Arc<Self>) {
        trace!(signal = %self.name, "dependency path changed");
        if self.is_push() {
            self.event_loop.schedule(Arc::clone(self));
        }
        self.invalidate_downstream();
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Bring this node up to date and return its value.
    pub(crate) fn read(self: &Arc<Self>) -> Result<Option<Value>> {
        self.refresh()?;
        Ok(self.cached())
    }

    /// Recompute this node if it is stale. Returns whether it recomputed.
    pub(crate) fn refresh(self: &Arc<Self>) -> Result<bool> {
        let Some(decl) = self.decl.as_ref() else {
            return Ok(false);
        };
        if decl.paths().is_empty() {
            let mut state = self.state.lock();
            if state.connection != ConnectionState::Connected {
                state.connection = ConnectionState::Connected;
            }
            return Ok(false);
        }
        if EvaluationContext::is_evaluating(self.id) {
            trace!(signal = %self.name, "re-entrant read returns cached value");
            return Ok(false);
        }
        let _frame = EvaluationContext::enter(self.id);

        let upstream = self.connect()?;
        for node in &upstream {
            if let Err(err) = node.refresh() {
                if err.is_unconnected() {
                    return Err(Error::UpstreamNotConnected {
                        signal: self.name.clone(),
                        upstream: node.name.clone(),
                    });
                }
                return Err(err);
            }
        }

        let snapshots: SmallVec<[Snapshot; 4]> = upstream.iter().map(|n| n.snapshot()).collect();
        let explicit = {
            let state = self.state.lock();
            let stale = match decl.mode() {
                SignalMode::Source => {
                    state.force
                        || snapshots
                            .iter()
                            .any(|s| s.timestamp > state.seen && s.origin > state.explicit_stamp)
                }
                SignalMode::Pull | SignalMode::Push => {
                    !state.computed
                        || state.force
                        || snapshots.iter().any(|s| s.timestamp > state.seen)
                }
            };
            if !stale {
                return Ok(false);
            }
            state.explicit.clone()
        };

        let evaluator = decl.evaluator().ok_or_else(|| Error::NotCallable {
            name: self.name.clone(),
            reason: "signal has dependencies but no evaluator".into(),
        })?;
        let values: SmallVec<[Option<Value>; 4]> =
            snapshots.iter().map(|s| s.value.clone()).collect();
        let inputs = Inputs::new(&self.name, explicit.as_ref(), &values, true);
        let value = evaluator(&inputs)?;

        let seen = snapshots.iter().map(|s| s.timestamp).max().unwrap_or(0);
        let origin = snapshots.iter().map(|s| s.origin).max().unwrap_or(0);
        let changed = {
            let mut state = self.state.lock();
            state.seen = seen;
            state.origin = origin;
            state.computed = true;
            state.force = false;
            let changed = state.cell.value() != Some(&value);
            if changed {
                state.cell.write(value, next_timestamp());
            }
            changed
        };
        debug!(
            signal = %self.name,
            mode = %decl.mode(),
            changed,
            depth = EvaluationContext::depth(),
            "recomputed"
        );
        Ok(true)
    }

    /// Process this node as a queued push reaction.
    pub(crate) fn react(self: &Arc<Self>) -> Result<Reaction> {
        match self.refresh() {
            Ok(true) => Ok(Reaction::Ran),
            Ok(false) => Ok(Reaction::UpToDate),
            Err(err) if err.is_unconnected() => {
                debug!(signal = %self.name, %err, "skipping unconnected reaction");
                Ok(Reaction::Skipped)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("connection", &self.connection())
            .finish()
    }
}
