//! Reactive Model
//!
//! This module holds the user-facing half of the engine: component classes
//! and their members, and the handles used to drive live instances.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A property is a value slot that only the component's own actions may
//! write. Reading one before any action wrote it yields `None`.
//!
//! ## Actions
//!
//! An action is a named unit of intent. Invoking it queues the call; the
//! body runs on the next flush of the loop and changes properties through
//! [`ActionContext::mutate`]. A subclass may override an action and
//! delegate to the base implementation with [`ActionContext::invoke_super`].
//!
//! ## Signals
//!
//! A signal is a value computed from dependency paths such as
//! `"button.title"`. Sources are the input boundary and are set directly;
//! pull signals recompute when read; push signals recompute on every flush
//! after a dependency changed.
//!
//! # Implementation Notes
//!
//! Declarations ([`ComponentClass`], [`SignalDecl`], [`ActionDecl`]) are
//! immutable and shared by all instances. Runtime state lives in graph
//! nodes owned by each [`Component`], see [`crate::graph`].

mod action;
mod class;
pub(crate) mod component;
mod context;
mod property;
mod signal;

pub use action::{Action, ActionBody, ActionContext, ActionDecl, ActionKind, ActionResult};
pub use class::{ClassBuilder, ComponentClass};
pub use component::{Attribute, Component, WeakComponent};
pub use context::EvaluationContext;
pub use property::Property;
pub use signal::{Evaluator, Inputs, Signal, SignalDecl, SignalMode};
