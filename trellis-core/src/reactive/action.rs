//! Actions
//!
//! An action is the only way to change a component's properties. Invoking
//! an action from outside queues it on the component's loop; the body runs
//! on the next [`Loop::iterate`](crate::Loop::iterate) with an
//! [`ActionContext`] that grants access to the component's mutators.
//!
//! Whatever a body returns is discarded. Callers observe the effects of an
//! action through the properties and signals it changes, never through a
//! return value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::component::Component;
use crate::error::{Error, Result};
use crate::graph::scheduler::PendingAction;
use crate::Value;

/// Values an action body may return. The returned value is dropped.
pub trait ActionResult {
    fn into_action_result(self) -> Result<Option<Value>>;
}

impl ActionResult for () {
    fn into_action_result(self) -> Result<Option<Value>> {
        Ok(None)
    }
}

impl ActionResult for Value {
    fn into_action_result(self) -> Result<Option<Value>> {
        Ok(Some(self))
    }
}

impl<T: ActionResult> ActionResult for Result<T> {
    fn into_action_result(self) -> Result<Option<Value>> {
        self.and_then(ActionResult::into_action_result)
    }
}

/// Type-erased action body.
pub type ActionBody = Arc<dyn Fn(&ActionContext<'_>, &[Value]) -> Result<Option<Value>> + Send + Sync>;

/// How an action came to exist on its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Declared with a body in the class.
    Explicit,

    /// Generated `set_<property>` for a settable property.
    Synthesized { property: String },

    /// Another name for an existing action.
    Alias { target: String },
}

/// Declaration of an action on a component class.
pub struct ActionDecl {
    name: String,
    class_name: String,
    kind: ActionKind,
    body: ActionBody,
    parent: Option<Arc<ActionDecl>>,
    property: Option<String>,
    doc: Option<String>,
}

impl ActionDecl {
    pub(crate) fn explicit(
        name: String,
        class_name: String,
        body: ActionBody,
        parent: Option<Arc<ActionDecl>>,
        property: Option<String>,
        doc: Option<String>,
    ) -> Self {
        Self {
            name,
            class_name,
            kind: ActionKind::Explicit,
            body,
            parent,
            property,
            doc,
        }
    }

    /// The generated setter for `property`.
    pub(crate) fn synthesized(property: &str, class_name: String) -> Self {
        let target = property.to_string();
        let body: ActionBody = Arc::new(move |ctx, args| match args {
            [value] => {
                ctx.mutate(&target, value.clone())?;
                Ok(None)
            }
            _ => Err(Error::InvalidArguments {
                action: ctx.action().name().to_string(),
                reason: format!("expected exactly one argument, got {}", args.len()),
            }),
        });
        Self {
            name: format!("set_{property}"),
            class_name,
            kind: ActionKind::Synthesized {
                property: property.to_string(),
            },
            body,
            parent: None,
            property: Some(property.to_string()),
            doc: Some(format!("Set the value of property '{property}'.")),
        }
    }

    /// A new name for `target`, sharing its body and base chain.
    pub(crate) fn alias(name: String, class_name: String, target: &Arc<ActionDecl>) -> Self {
        Self {
            name,
            class_name,
            kind: ActionKind::Alias {
                target: target.name.clone(),
            },
            body: Arc::clone(&target.body),
            parent: target.parent.clone(),
            property: target.property.clone(),
            doc: target.doc.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the class that declared this action.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// How this action came to exist.
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// The inherited action this one overrides, if any.
    pub fn parent(&self) -> Option<&Arc<ActionDecl>> {
        self.parent.as_ref()
    }

    /// The property this action sets, for setters.
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Doc text given at declaration.
    pub fn documentation(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Run the body against `component`, discarding any returned value.
    pub(crate) fn run(&self, component: &Component, args: &[Value], warn_on_result: bool) -> Result<()> {
        let ctx = ActionContext {
            component,
            action: self,
            warn_on_result,
        };
        let returned = (self.body)(&ctx, args)?;
        if let (Some(value), true) = (returned, warn_on_result) {
            warn!(
                action = %self.name,
                component = %component,
                %value,
                "action returned a value, which is discarded"
            );
        }
        Ok(())
    }
}

impl std::fmt::Display for ActionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<action '{}' of class {}", self.name, self.class_name)?;
        if let Some(property) = &self.property {
            write!(f, " (property '{property}')")?;
        }
        f.write_str(">")
    }
}

impl std::fmt::Debug for ActionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDecl")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("kind", &self.kind)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// What an action body can reach while it runs.
///
/// Only the loop creates contexts, so [`ActionContext::mutate`] cannot be
/// called from outside an action.
pub struct ActionContext<'a> {
    component: &'a Component,
    action: &'a ActionDecl,
    warn_on_result: bool,
}

impl<'a> ActionContext<'a> {
    /// The component the action runs on.
    pub fn component(&self) -> &Component {
        self.component
    }

    /// The action being run.
    pub fn action(&self) -> &ActionDecl {
        self.action
    }

    /// Read a property or signal of the component.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.component.get(name)
    }

    /// Write a property. Downstream push signals are queued, not run.
    pub fn mutate(&self, property: &str, value: Value) -> Result<()> {
        self.component.mutate(property, value)
    }

    /// Call another action of this component right away.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<()> {
        let action = self.component.class().resolve_action(name).ok_or_else(|| {
            Error::NoSuchMember {
                owner: self.component.to_string(),
                name: name.to_string(),
            }
        })?;
        action.run(self.component, args, self.warn_on_result)
    }

    /// Call the implementation this action overrides.
    pub fn invoke_super(&self, args: &[Value]) -> Result<()> {
        let parent = self.action.parent().ok_or_else(|| Error::NoBaseAction {
            action: self.action.name.clone(),
        })?;
        parent.run(self.component, args, self.warn_on_result)
    }
}

/// An action bound to a component instance.
#[derive(Clone)]
pub struct Action {
    component: Component,
    decl: Arc<ActionDecl>,
}

impl Action {
    pub(crate) fn new(component: Component, decl: Arc<ActionDecl>) -> Self {
        Self { component, decl }
    }

    pub fn name(&self) -> &str {
        self.decl.name()
    }

    /// The class-level declaration behind this handle.
    pub fn decl(&self) -> &Arc<ActionDecl> {
        &self.decl
    }

    /// The property this action sets, when known.
    pub fn property(&self) -> Option<&str> {
        self.decl.property()
    }

    /// Queue the action. It runs on the next flush of the component's loop.
    pub fn invoke(&self, args: &[Value]) -> Result<()> {
        let event_loop = self.component.event_loop().ok_or_else(|| Error::LoopDropped {
            component: self.component.to_string(),
        })?;
        event_loop.enqueue(PendingAction::Invoke {
            component: self.component.clone(),
            action: Arc::clone(&self.decl),
            args: args.to_vec(),
        });
        Ok(())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<action '{}' of {}", self.decl.name, self.component)?;
        if let Some(property) = &self.decl.property {
            write!(f, " (property '{property}')")?;
        }
        f.write_str(">")
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.decl.name)
            .field("component", &self.component.to_string())
            .finish()
    }
}
