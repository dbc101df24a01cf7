//! Dependency Graph
//!
//! This module implements the runtime side of the reactive model: the
//! nodes behind properties and signals, the connectors that bind them to
//! each other through dotted paths, and the loop that flushes queued work.
//!
//! # Overview
//!
//! - Nodes hold a value cell and weak links to their dependents. Edges
//!   point from a dependency to its dependents, so a write can find every
//!   push node it affects.
//! - Connectors resolve dependency paths lazily and keep resolved
//!   bindings until they are explicitly broken.
//! - The loop applies queued actions first, then recomputes the push nodes
//!   those actions invalidated, until nothing is left.
//!
//! The graph may contain cycles. Evaluation follows declared dependency
//! order and stops at any node already being evaluated on this thread.

mod connector;
pub(crate) mod node;
pub(crate) mod scheduler;

pub use connector::DependencyPath;
pub(crate) use connector::is_identifier;
pub use node::{ConnectionState, NodeId, NodeKind};
pub use scheduler::{IterationReport, Loop};
