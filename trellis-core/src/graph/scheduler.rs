//! Event Loop
//!
//! The loop is the only place where queued work becomes visible state.
//! It holds two FIFO queues: actions waiting to run, and push nodes that
//! were invalidated since the last flush.
//!
//! # Algorithm
//!
//! Each call to [`Loop::iterate`] runs passes until both queues are empty:
//!
//! 1. Apply every queued action, in the order they were invoked. Their
//!    mutators stamp cells and queue the push nodes downstream.
//! 2. Recompute queued push nodes in the order they became invalid. A node
//!    invalidated again while the pass runs is appended to the same pass.
//! 3. If reactions queued new actions, start another pass.
//!
//! Nothing is flushed implicitly. An error from an action body or an
//! evaluator stops the flush and leaves the rest of the queue in place.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, debug_span, trace};

use super::node::{Node, NodeId, Reaction};
use crate::config::LoopConfig;
use crate::error::{Error, Result};
use crate::reactive::{ActionDecl, Component};
use crate::Value;

/// Work queued by an action invocation or by construction.
pub(crate) enum PendingAction {
    /// Run an action body with arguments.
    Invoke {
        component: Component,
        action: Arc<ActionDecl>,
        args: Vec<Value>,
    },

    /// Apply an initial property value given at construction.
    Initialize {
        component: Component,
        property: String,
        value: Value,
    },
}

impl PendingAction {
    fn apply(self, config: &LoopConfig) -> Result<()> {
        match self {
            Self::Invoke {
                component,
                action,
                args,
            } => {
                debug!(action = %action.name(), component = %component, "applying action");
                action.run(&component, &args, config.warn_on_action_result)
            }
            Self::Initialize {
                component,
                property,
                value,
            } => {
                debug!(%property, component = %component, "applying initial value");
                component.mutate(&property, value)
            }
        }
    }
}

#[derive(Default)]
struct LoopQueue {
    actions: VecDeque<PendingAction>,
    reactions: VecDeque<Arc<Node>>,
    queued: HashSet<NodeId>,
}

struct LoopInner {
    config: LoopConfig,
    queue: Mutex<LoopQueue>,
    ticks: AtomicU64,
}

/// What one call to [`Loop::iterate`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Queued actions and initial values applied.
    pub actions_applied: usize,

    /// Push nodes whose evaluator ran.
    pub reactions_run: usize,

    /// Push nodes skipped because a dependency is not connected.
    pub reactions_skipped: usize,
}

impl IterationReport {
    /// Whether the flush had nothing to do.
    pub fn is_idle(&self) -> bool {
        self.actions_applied == 0 && self.reactions_run == 0 && self.reactions_skipped == 0
    }
}

/// The discrete-event scheduler.
///
/// Cloning a `Loop` yields another handle to the same queues. Components
/// are bound to one loop at construction but only hold it weakly: queued
/// work keeps components alive, never the other way round. Once the last
/// `Loop` handle is gone, the queued work is dropped with it.
#[derive(Clone)]
pub struct Loop {
    inner: Arc<LoopInner>,
}

impl Loop {
    /// Create an empty loop with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Create an empty loop with explicit limits.
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            inner: Arc::new(LoopInner {
                config,
                queue: Mutex::new(LoopQueue::default()),
                ticks: AtomicU64::new(0),
            }),
        }
    }

    /// The limits this loop was created with.
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Number of completed or attempted flushes.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Relaxed)
    }

    /// Actions waiting for the next flush.
    pub fn pending_actions(&self) -> usize {
        self.inner.queue.lock().actions.len()
    }

    /// Push nodes waiting to recompute.
    pub fn pending_reactions(&self) -> usize {
        self.inner.queue.lock().reactions.len()
    }

    /// Whether [`Loop::iterate`] has anything to do.
    pub fn has_pending(&self) -> bool {
        let queue = self.inner.queue.lock();
        !queue.actions.is_empty() || !queue.reactions.is_empty()
    }

    /// Whether two handles refer to the same loop.
    pub fn same_loop(&self, other: &Loop) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakLoop {
        WeakLoop {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn enqueue(&self, action: PendingAction) {
        self.inner.queue.lock().actions.push_back(action);
    }

    /// Queue a push node unless it is already waiting.
    pub(crate) fn schedule(&self, node: Arc<Node>) {
        let mut queue = self.inner.queue.lock();
        if queue.queued.insert(node.id()) {
            queue.reactions.push_back(node);
        }
    }

    fn pop_action(&self) -> Option<PendingAction> {
        self.inner.queue.lock().actions.pop_front()
    }

    fn pop_reaction(&self) -> Option<Arc<Node>> {
        let mut queue = self.inner.queue.lock();
        let node = queue.reactions.pop_front()?;
        queue.queued.remove(&node.id());
        Some(node)
    }

    fn requeue_front(&self, node: Arc<Node>) {
        let mut queue = self.inner.queue.lock();
        if queue.queued.insert(node.id()) {
            queue.reactions.push_front(node);
        }
    }

    /// Flush all queued work to a fixed point.
    pub fn iterate(&self) -> Result<IterationReport> {
        let tick = self.inner.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let _span = debug_span!("iterate", tick).entered();
        let config = &self.inner.config;
        let mut report = IterationReport::default();

        for _ in 0..config.max_passes {
            while let Some(action) = self.pop_action() {
                action.apply(config)?;
                report.actions_applied += 1;
            }

            while let Some(node) = self.pop_reaction() {
                if report.reactions_run + report.reactions_skipped
                    >= config.max_reactions_per_iteration
                {
                    self.requeue_front(node);
                    return Err(Error::Runaway {
                        limit: config.max_reactions_per_iteration,
                        unit: "reactions",
                    });
                }
                match node.react()? {
                    Reaction::Ran => report.reactions_run += 1,
                    Reaction::Skipped => report.reactions_skipped += 1,
                    Reaction::UpToDate => {}
                }
            }

            if self.pending_actions() == 0 {
                debug!(?report, "flush complete");
                return Ok(report);
            }
        }

        Err(Error::Runaway {
            limit: config.max_passes,
            unit: "passes",
        })
    }
}

/// Non-owning handle held by components and their nodes.
#[derive(Clone, Default)]
pub(crate) struct WeakLoop {
    inner: Weak<LoopInner>,
}

impl WeakLoop {
    pub(crate) fn upgrade(&self) -> Option<Loop> {
        self.inner.upgrade().map(|inner| Loop { inner })
    }

    /// Queue a push node on the loop, if it still exists.
    pub(crate) fn schedule(&self, node: Arc<Node>) {
        match self.upgrade() {
            Some(event_loop) => event_loop.schedule(node),
            None => trace!(signal = %node.name(), "loop dropped, reaction discarded"),
        }
    }
}

impl Default for Loop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Loop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loop")
            .field("ticks", &self.ticks())
            .field("pending_actions", &self.pending_actions())
            .field("pending_reactions", &self.pending_reactions())
            .finish()
    }
}
