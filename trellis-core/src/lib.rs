//! Trellis Core
//!
//! This crate provides the runtime for Trellis, a reactive component model.
//! It implements:
//!
//! - Components with properties that only their own actions may change
//! - Actions, queued on invocation and applied in batches
//! - Signals in three modes (source, pull and push) wired by dotted
//!   dependency paths that rebind when the objects along them change
//! - An explicit event loop that flushes queued work to a fixed point,
//!   cycles included
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: classes, components, actions and signal declarations
//! - `graph`: runtime nodes, path resolution and the event loop
//! - `describe`: structural class descriptions for code generators
//! - `config`: loop limits
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{Component, ComponentClass, Loop, SignalDecl};
//!
//! let person = ComponentClass::builder("Person")
//!     .signal(SignalDecl::input("first_name").with_default(json!("john")))
//!     .signal(SignalDecl::input("last_name").with_default(json!("doe")))
//!     .signal(
//!         SignalDecl::pull("full_name", ["first_name", "last_name"]).evaluate(|inputs| {
//!             Ok(json!(format!("{} {}", inputs.str(0)?, inputs.str(1)?)))
//!         }),
//!     )
//!     .build()?;
//!
//! let lp = Loop::new();
//! let john = Component::new(&person, &lp)?;
//! assert_eq!(john.get("full_name")?, Some(json!("john doe")));
//!
//! john.signal("first_name")?.set(json!("almar"))?;
//! lp.iterate()?;
//! assert_eq!(john.get("full_name")?, Some(json!("almar doe")));
//! # Ok::<(), trellis_core::Error>(())
//! ```

pub mod cell;
pub mod config;
pub mod describe;
pub mod error;
pub mod graph;
pub mod reactive;

pub use cell::ValueCell;
pub use config::LoopConfig;
pub use describe::{ActionDescription, ClassDescription, PropertyDescription, SignalDescription};
pub use error::{Error, ErrorKind, Result};
pub use graph::{ConnectionState, DependencyPath, IterationReport, Loop, NodeId, NodeKind};
pub use reactive::{
    Action, ActionContext, ActionDecl, ActionKind, ActionResult, Attribute, ClassBuilder, Component,
    ComponentClass, Evaluator, Inputs, Property, Signal, SignalDecl, SignalMode, WeakComponent,
};

/// Dynamic value carried by properties and signals.
pub use serde_json::Value;
