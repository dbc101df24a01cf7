//! Evaluation Context
//!
//! The evaluation context tracks which nodes are currently being
//! recomputed on this thread. A node that is asked to refresh while it is
//! already on the stack returns its cached value instead of recursing,
//! which is what lets a cycle of dependencies settle in one pass.
//!
//! # Implementation
//!
//! A thread-local stack of node IDs. Entering pushes, and the returned
//! guard pops on drop, so the stack stays balanced even when an evaluator
//! returns an error or panics.

use std::cell::RefCell;

use crate::graph::NodeId;

thread_local! {
    static EVALUATION_STACK: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one frame of the evaluation stack.
#[derive(Debug)]
pub struct EvaluationContext {
    node: NodeId,
}

impl EvaluationContext {
    /// Push `node` onto the evaluation stack.
    ///
    /// The frame is popped when the returned guard is dropped.
    pub fn enter(node: NodeId) -> Self {
        EVALUATION_STACK.with(|stack| stack.borrow_mut().push(node));
        Self { node }
    }

    /// Whether `node` is currently being evaluated on this thread.
    pub fn is_evaluating(node: NodeId) -> bool {
        EVALUATION_STACK.with(|stack| stack.borrow().contains(&node))
    }

    /// The innermost node being evaluated, if any.
    pub fn current() -> Option<NodeId> {
        EVALUATION_STACK.with(|stack| stack.borrow().last().copied())
    }

    /// Number of evaluations running on this thread.
    pub fn depth() -> usize {
        EVALUATION_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for EvaluationContext {
    fn drop(&mut self) {
        EVALUATION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.node),
                "EvaluationContext mismatch: expected {:?}, got {:?}",
                self.node,
                popped
            );
        });
    }
}
