//! Component Classes
//!
//! A [`ComponentClass`] is the immutable definition shared by all instances
//! of a component type: its properties, actions and signal declarations,
//! in declaration order, with inherited members merged in.
//!
//! Classes are assembled with a [`ClassBuilder`]. Every check happens in
//! [`ClassBuilder::build`], so a class that builds is well formed:
//!
//! - member names are identifiers and unique within one class body;
//! - properties, actions and signals never share a name;
//! - aliases point at actions;
//! - each settable property has a `set_<name>` action, synthesized unless
//!   one is already visible.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use super::action::{ActionBody, ActionContext, ActionDecl, ActionResult};
use super::property::Property;
use super::signal::SignalDecl;
use crate::error::{Error, Result};
use crate::graph::is_identifier;
use crate::Value;

/// An immutable component type.
#[derive(Debug)]
pub struct ComponentClass {
    name: String,
    base: Option<Arc<ComponentClass>>,
    properties: IndexMap<String, Property>,
    actions: IndexMap<String, Arc<ActionDecl>>,
    signals: IndexMap<String, Arc<SignalDecl>>,
}

impl ComponentClass {
    /// Start declaring a class called `name`.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            base: None,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class this one extends.
    pub fn base(&self) -> Option<&Arc<ComponentClass>> {
        self.base.as_ref()
    }

    /// Look up a property, inherited ones included.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// All properties, inherited ones first.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    /// Look up an action, inherited ones included.
    pub fn action(&self, name: &str) -> Option<&Arc<ActionDecl>> {
        self.actions.get(name)
    }

    /// All actions in declaration order.
    pub fn actions(&self) -> impl Iterator<Item = &Arc<ActionDecl>> {
        self.actions.values()
    }

    /// Look up a signal, inherited ones included.
    pub fn signal(&self, name: &str) -> Option<&Arc<SignalDecl>> {
        self.signals.get(name)
    }

    /// All signals in declaration order.
    pub fn signals(&self) -> impl Iterator<Item = &Arc<SignalDecl>> {
        self.signals.values()
    }

    /// Signal names in sorted order.
    pub fn signal_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.signals.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `name` is a property, action or signal of this class.
    pub fn has_member(&self, name: &str) -> bool {
        self.properties.contains_key(name)
            || self.actions.contains_key(name)
            || self.signals.contains_key(name)
    }

    /// The most derived action called `name`.
    pub fn resolve_action(&self, name: &str) -> Option<Arc<ActionDecl>> {
        self.actions.get(name).cloned()
    }

    /// Whether this class is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &ComponentClass) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.base
            .as_deref()
            .is_some_and(|base| base.is_subclass_of(other))
    }
}

enum Member {
    Property(Property),
    Action {
        name: String,
        body: ActionBody,
        doc: Option<String>,
    },
    Alias {
        name: String,
        target: String,
    },
    Signal(SignalDecl),
}

impl Member {
    fn name(&self) -> &str {
        match self {
            Member::Property(prop) => prop.name(),
            Member::Action { name, .. } | Member::Alias { name, .. } => name,
            Member::Signal(decl) => decl.name(),
        }
    }

    fn category(&self) -> &'static str {
        match self {
            Member::Property(_) => "property",
            Member::Action { .. } | Member::Alias { .. } => "action",
            Member::Signal(_) => "signal",
        }
    }
}

/// Builder for [`ComponentClass`].
pub struct ClassBuilder {
    name: String,
    base: Option<Arc<ComponentClass>>,
    members: Vec<Member>,
}

impl ClassBuilder {
    /// Inherit every member of `base`.
    pub fn extends(mut self, base: &Arc<ComponentClass>) -> Self {
        self.base = Some(Arc::clone(base));
        self
    }

    /// Declare a property.
    pub fn property(mut self, property: Property) -> Self {
        self.members.push(Member::Property(property));
        self
    }

    /// Declare an action with a body.
    ///
    /// Declaring an action that the base class already has overrides it;
    /// the body can still reach the base with
    /// [`ActionContext::invoke_super`].
    pub fn action<F, R>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ActionContext<'_>, &[Value]) -> R + Send + Sync + 'static,
        R: ActionResult,
    {
        self.documented_action(name, None, body)
    }

    /// Like [`ClassBuilder::action`], with doc text for descriptions.
    pub fn documented_action<F, R>(mut self, name: impl Into<String>, doc: Option<&str>, body: F) -> Self
    where
        F: Fn(&ActionContext<'_>, &[Value]) -> R + Send + Sync + 'static,
        R: ActionResult,
    {
        let body: ActionBody = Arc::new(move |ctx, args| body(ctx, args).into_action_result());
        self.members.push(Member::Action {
            name: name.into(),
            body,
            doc: doc.map(str::to_string),
        });
        self
    }

    /// Expose the action `target` under a second name.
    pub fn action_alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.members.push(Member::Alias {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    /// Declare a signal.
    pub fn signal(mut self, decl: SignalDecl) -> Self {
        self.members.push(Member::Signal(decl));
        self
    }

    /// Validate the declarations and produce the class.
    pub fn build(self) -> Result<Arc<ComponentClass>> {
        let ClassBuilder {
            name: class_name,
            base,
            members,
        } = self;
        let invalid = |name: &str, reason: String| Error::InvalidDeclaration {
            class: class_name.clone(),
            name: name.to_string(),
            reason,
        };

        if !is_identifier(&class_name) {
            return Err(invalid(&class_name, "class names must be identifiers".into()));
        }

        let (mut properties, mut actions, mut signals) = match &base {
            Some(base) => (
                base.properties.clone(),
                base.actions.clone(),
                base.signals.clone(),
            ),
            None => Default::default(),
        };

        // Names declared in this body, with their category.
        let mut declared: IndexMap<String, &'static str> = IndexMap::new();
        for member in &members {
            let name = member.name();
            if !is_identifier(name) {
                return Err(invalid(name, "member names must be identifiers".into()));
            }
            if let Some(previous) = declared.insert(name.to_string(), member.category()) {
                return Err(invalid(
                    name,
                    format!("already declared as a {previous} in this class"),
                ));
            }
        }

        // An inherited member may only be overridden by one of its own kind.
        for (name, category) in &declared {
            let inherited = if properties.contains_key(name) {
                Some("property")
            } else if actions.contains_key(name) {
                Some("action")
            } else if signals.contains_key(name) {
                Some("signal")
            } else {
                None
            };
            if let Some(inherited) = inherited.filter(|inherited| inherited != category) {
                return Err(invalid(
                    name,
                    format!("{category} would shadow an inherited {inherited}"),
                ));
            }
        }

        let mut aliases = Vec::new();
        for member in members {
            match member {
                Member::Property(prop) => {
                    properties.insert(prop.name().to_string(), prop);
                }
                Member::Signal(mut decl) => {
                    decl.finalize(&class_name)?;
                    signals.insert(decl.name().to_string(), Arc::new(decl));
                }
                Member::Action { name, body, doc } => {
                    let parent = base.as_ref().and_then(|base| base.resolve_action(&name));
                    let property = parent
                        .as_ref()
                        .and_then(|parent| parent.property().map(str::to_string))
                        .or_else(|| setter_target(&name, &declared, base.as_deref()));
                    let decl = ActionDecl::explicit(
                        name.clone(),
                        class_name.clone(),
                        body,
                        parent,
                        property,
                        doc,
                    );
                    actions.insert(name, Arc::new(decl));
                }
                Member::Alias { name, target } => aliases.push((name, target)),
            }
        }

        // Setters for the settable properties of this body, unless visible.
        let settable: Vec<String> = properties
            .values()
            .filter(|prop| prop.is_settable() && declared.contains_key(prop.name()))
            .map(|prop| prop.name().to_string())
            .collect();
        for prop in settable {
            let setter = format!("set_{prop}");
            if actions.contains_key(&setter) {
                trace!(class = %class_name, %setter, "explicit setter wins");
                continue;
            }
            if properties.contains_key(&setter) || signals.contains_key(&setter) {
                return Err(invalid(
                    &setter,
                    format!("name is needed for the setter of property '{prop}'"),
                ));
            }
            let decl = ActionDecl::synthesized(&prop, class_name.clone());
            actions.insert(setter, Arc::new(decl));
        }

        for (name, target) in aliases {
            let resolved = if let Some(action) = actions.get(&target) {
                Arc::clone(action)
            } else if properties.contains_key(&target) {
                return Err(Error::NotCallable {
                    name: target,
                    reason: "a property cannot be wrapped as an action".into(),
                });
            } else if signals.contains_key(&target) {
                return Err(Error::CallIncompatible {
                    name: target,
                    reason: "signals are read or set, not invoked".into(),
                });
            } else {
                return Err(Error::NotCallable {
                    reason: format!("class {class_name} has no member of that name"),
                    name: target,
                });
            };
            let decl = ActionDecl::alias(name.clone(), class_name.clone(), &resolved);
            actions.insert(name, Arc::new(decl));
        }

        trace!(
            class = %class_name,
            properties = properties.len(),
            actions = actions.len(),
            signals = signals.len(),
            "class built"
        );
        Ok(Arc::new(ComponentClass {
            name: class_name,
            base,
            properties,
            actions,
            signals,
        }))
    }
}

/// The property an explicitly declared `set_<name>` action would set.
fn setter_target(
    action: &str,
    declared: &IndexMap<String, &'static str>,
    base: Option<&ComponentClass>,
) -> Option<String> {
    let property = action.strip_prefix("set_")?;
    let own = declared.get(property) == Some(&"property");
    let inherited = base.is_some_and(|base| base.property(property).is_some());
    (own || inherited).then(|| property.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::reactive::ActionKind;
    use serde_json::json;

    fn settable_foo() -> Arc<ComponentClass> {
        ComponentClass::builder("AutoAction")
            .property(Property::new("foo").settable())
            .build()
            .unwrap()
    }

    #[test]
    fn settable_property_gets_a_setter() {
        let class = settable_foo();
        let setter = class.action("set_foo").unwrap();
        assert!(matches!(setter.kind(), ActionKind::Synthesized { .. }));
        assert_eq!(setter.property(), Some("foo"));
    }

    #[test]
    fn explicit_setter_is_not_duplicated() {
        let class = ComponentClass::builder("Clash")
            .property(Property::new("foo").settable())
            .action("set_foo", |ctx, args| ctx.mutate("foo", args[0].clone()))
            .build()
            .unwrap();
        let setter = class.action("set_foo").unwrap();
        assert_eq!(setter.kind(), &ActionKind::Explicit);
        assert_eq!(setter.property(), Some("foo"));
        assert_eq!(class.actions().count(), 1);
    }

    #[test]
    fn override_links_to_the_base_action() {
        let base = settable_foo();
        let derived = ComponentClass::builder("Derived")
            .extends(&base)
            .action("set_foo", |ctx, args| ctx.invoke_super(args))
            .build()
            .unwrap();
        let setter = derived.action("set_foo").unwrap();
        assert_eq!(setter.class_name(), "Derived");
        assert_eq!(setter.parent().unwrap().class_name(), "AutoAction");
        assert!(derived.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&derived));
    }

    #[test]
    fn duplicate_and_colliding_names_are_rejected() {
        let err = ComponentClass::builder("Dup")
            .property(Property::new("foo"))
            .signal(SignalDecl::input("foo"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDeclaration { .. }));

        let base = settable_foo();
        let err = ComponentClass::builder("Shadow")
            .extends(&base)
            .signal(SignalDecl::input("set_foo"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);

        let err = ComponentClass::builder("Bad")
            .action("not an identifier", |_, _| ())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDeclaration { .. }));
    }

    #[test]
    fn aliases_must_point_at_actions() {
        let ok = ComponentClass::builder("Aliased")
            .property(Property::new("foo").settable())
            .action_alias("assign_foo", "set_foo")
            .build()
            .unwrap();
        let alias = ok.action("assign_foo").unwrap();
        assert_eq!(
            alias.kind(),
            &ActionKind::Alias {
                target: "set_foo".into()
            }
        );

        let err = ComponentClass::builder("ToProperty")
            .property(Property::new("foo"))
            .action_alias("call_foo", "foo")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NotCallable { .. }));

        let err = ComponentClass::builder("ToMissing")
            .action_alias("call_it", "nothing")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NotCallable { .. }));

        let err = ComponentClass::builder("ToSignal")
            .signal(SignalDecl::input("title").with_default(json!("")))
            .action_alias("call_title", "title")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::CallIncompatible { .. }));
    }

    #[test]
    fn signal_names_are_sorted() {
        let class = ComponentClass::builder("Person")
            .signal(SignalDecl::input("last_name"))
            .signal(SignalDecl::input("first_name"))
            .signal(
                SignalDecl::pull("full_name", ["first_name", "last_name"])
                    .evaluate(|_| Ok(json!(""))),
            )
            .build()
            .unwrap();
        assert_eq!(
            class.signal_names(),
            ["first_name", "full_name", "last_name"]
        );
    }
}
