//! Components
//!
//! A [`Component`] is one live instance of a [`ComponentClass`]. It owns a
//! graph node per property and per signal, and a map of plain attributes
//! that dependency paths can hop through.
//!
//! `Component` is a cheap handle; clones refer to the same instance. The
//! instance is destroyed when the last handle is dropped. Nodes on other
//! components only ever hold weak references to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::action::Action;
use super::class::ComponentClass;
use super::signal::Signal;
use crate::cell::{next_timestamp, ValueCell};
use crate::error::{Error, Result};
use crate::graph::node::Node;
use crate::graph::scheduler::{PendingAction, WeakLoop};
use crate::graph::{Loop, NodeKind};
use crate::Value;

/// A plain (non-member) attribute of a component.
#[derive(Debug, Clone)]
pub enum Attribute {
    Value(Value),
    Component(Component),
}

impl Attribute {
    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Attribute::Component(component) => Some(component),
            Attribute::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attribute::Value(value) => Some(value),
            Attribute::Component(_) => None,
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Value(value)
    }
}

impl From<Component> for Attribute {
    fn from(component: Component) -> Self {
        Attribute::Component(component)
    }
}

impl From<&Component> for Attribute {
    fn from(component: &Component) -> Self {
        Attribute::Component(component.clone())
    }
}

pub(crate) struct ComponentInner {
    id: u64,
    class: Arc<ComponentClass>,
    event_loop: WeakLoop,
    nodes: IndexMap<String, Arc<Node>>,
    attrs: Mutex<IndexMap<String, Attribute>>,
    watchers: Mutex<HashMap<String, Vec<Weak<Node>>>>,
}

/// Handle to a component instance.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl Component {
    /// Instantiate `class` on `event_loop`.
    ///
    /// Source defaults are applied at once. Push signals are queued and run
    /// on the first flush.
    pub fn new(class: &Arc<ComponentClass>, event_loop: &Loop) -> Result<Self> {
        Self::with_values(class, event_loop, std::iter::empty::<(String, Value)>())
    }

    /// Instantiate `class` with initial property values.
    ///
    /// The values are queued as mutations and become visible after the next
    /// [`Loop::iterate`].
    pub fn with_values<I, K>(class: &Arc<ComponentClass>, event_loop: &Loop, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        // Unknown names are rejected before anything reaches the loop.
        let values: Vec<(String, Value)> = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some((name, _)) = values.iter().find(|(name, _)| class.property(name).is_none()) {
            return Err(Error::NoSuchMember {
                owner: class.name().to_string(),
                name: name.clone(),
            });
        }

        let inner = Arc::new_cyclic(|owner: &Weak<ComponentInner>| {
            let mut nodes = IndexMap::new();
            for prop in class.properties() {
                let node = Node::property(prop.name(), owner.clone(), event_loop.downgrade());
                nodes.insert(prop.name().to_string(), Arc::new(node));
            }
            for decl in class.signals() {
                let node = Node::signal(Arc::clone(decl), owner.clone(), event_loop.downgrade());
                nodes.insert(decl.name().to_string(), Arc::new(node));
            }
            ComponentInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                class: Arc::clone(class),
                event_loop: event_loop.downgrade(),
                nodes,
                attrs: Mutex::new(IndexMap::new()),
                watchers: Mutex::new(HashMap::new()),
            }
        });
        let component = Self { inner };

        // One stamp for all defaults, so cycle members start out agreeing.
        let stamp = next_timestamp();
        for node in component.inner.nodes.values() {
            node.initialize(stamp)?;
        }
        for node in component.inner.nodes.values() {
            let has_paths = node.decl().is_some_and(|decl| !decl.paths().is_empty());
            if has_paths {
                if let Err(err) = node.connect() {
                    debug!(signal = %node.name(), %err, "not connected at construction");
                }
            }
            if node.is_push() {
                event_loop.schedule(Arc::clone(node));
            }
        }

        for (property, value) in values {
            event_loop.enqueue(PendingAction::Initialize {
                component: component.clone(),
                property,
                value,
            });
        }

        debug!(component = %component, "component created");
        Ok(component)
    }

    pub(crate) fn from_inner(inner: Arc<ComponentInner>) -> Self {
        Self { inner }
    }

    /// Process-unique instance number.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The class this component instantiates.
    pub fn class(&self) -> &Arc<ComponentClass> {
        &self.inner.class
    }

    /// The loop this component was created on, unless it was dropped.
    pub fn event_loop(&self) -> Option<Loop> {
        self.inner.event_loop.upgrade()
    }

    /// A handle that does not keep the instance alive.
    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn node(&self, name: &str) -> Option<&Arc<Node>> {
        self.inner.nodes.get(name)
    }

    fn no_such_member(&self, name: &str) -> Error {
        Error::NoSuchMember {
            owner: self.to_string(),
            name: name.to_string(),
        }
    }

    /// Read a property, or read (and if stale, evaluate) a signal.
    ///
    /// Returns `None` for a member that has never been set.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.node(name)
            .ok_or_else(|| self.no_such_member(name))?
            .read()
    }

    /// The cell behind a property, with its timestamps.
    pub fn property_cell(&self, name: &str) -> Option<ValueCell> {
        self.node(name)
            .filter(|node| node.kind() == NodeKind::Property)
            .map(|node| node.cell())
    }

    /// The mutator. Reachable only through an action context or the loop.
    pub(crate) fn mutate(&self, property: &str, value: Value) -> Result<()> {
        let node = self
            .node(property)
            .filter(|node| node.kind() == NodeKind::Property)
            .ok_or_else(|| self.no_such_member(property))?;
        node.mutate(value);
        Ok(())
    }

    /// Bound handle to the signal `name`.
    pub fn signal(&self, name: &str) -> Result<Signal> {
        let node = self.node(name).ok_or_else(|| self.no_such_member(name))?;
        match node.mode() {
            Some(mode) => Ok(Signal::new(self.clone(), Arc::clone(node), mode)),
            None => Err(self.no_such_member(name)),
        }
    }

    /// Signal names in sorted order.
    pub fn signal_names(&self) -> Vec<String> {
        self.inner.class.signal_names()
    }

    /// Bound handle to the action `name`.
    pub fn action(&self, name: &str) -> Result<Action> {
        let decl = self
            .inner
            .class
            .resolve_action(name)
            .ok_or_else(|| self.no_such_member(name))?;
        Ok(Action::new(self.clone(), decl))
    }

    /// Queue the action `name`. It runs on the next flush.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<()> {
        self.action(name)?.invoke(args)
    }

    // ------------------------------------------------------------------
    // Plain attributes
    // ------------------------------------------------------------------

    /// Set a plain attribute.
    ///
    /// Member names are protected and fail with [`Error::ReadOnly`]. Nodes
    /// whose dependency paths cross `name` are woken up.
    pub fn set_attr(&self, name: &str, value: impl Into<Attribute>) -> Result<()> {
        if self.inner.class.has_member(name) {
            return Err(Error::ReadOnly {
                name: name.to_string(),
            });
        }
        self.inner.attrs.lock().insert(name.to_string(), value.into());
        trace!(component = %self, attr = %name, "attribute set");
        self.notify_watchers(name);
        Ok(())
    }

    /// Remove a plain attribute, returning its old value.
    pub fn del_attr(&self, name: &str) -> Result<Option<Attribute>> {
        if self.inner.class.has_member(name) {
            return Err(Error::ReadOnly {
                name: name.to_string(),
            });
        }
        let removed = self.inner.attrs.lock().shift_remove(name);
        if removed.is_some() {
            trace!(component = %self, attr = %name, "attribute removed");
            self.notify_watchers(name);
        }
        Ok(removed)
    }

    /// A plain attribute, if set.
    pub fn attr(&self, name: &str) -> Option<Attribute> {
        self.inner.attrs.lock().get(name).cloned()
    }

    /// Register `node` to be told when attribute `name` changes.
    pub(crate) fn watch_attr(&self, name: &str, node: &Arc<Node>) {
        let mut watchers = self.inner.watchers.lock();
        let list = watchers.entry(name.to_string()).or_default();
        list.retain(|weak| weak.strong_count() > 0);
        let known = list
            .iter()
            .filter_map(Weak::upgrade)
            .any(|existing| existing.id() == node.id());
        if !known {
            list.push(Arc::downgrade(node));
        }
    }

    fn notify_watchers(&self, name: &str) {
        let watchers: Vec<Arc<Node>> = {
            let mut all = self.inner.watchers.lock();
            match all.get_mut(name) {
                Some(list) => {
                    list.retain(|weak| weak.strong_count() > 0);
                    list.iter().filter_map(Weak::upgrade).collect()
                }
                None => Vec::new(),
            }
        };
        for node in watchers {
            node.path_changed();
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.inner.class.name(), self.inner.id)
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("class", &self.inner.class.name())
            .field("id", &self.inner.id)
            .field("members", &self.inner.nodes.len())
            .finish()
    }
}

/// Non-owning handle to a component.
#[derive(Clone, Debug, Default)]
pub struct WeakComponent {
    inner: Weak<ComponentInner>,
}

impl WeakComponent {
    /// The instance, unless it was dropped.
    pub fn upgrade(&self) -> Option<Component> {
        self.inner.upgrade().map(Component::from_inner)
    }

    /// Whether the component has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::reactive::{Property, SignalDecl};
    use serde_json::json;

    fn class() -> Arc<ComponentClass> {
        ComponentClass::builder("Thing")
            .property(Property::new("foo").settable())
            .signal(SignalDecl::input("title").with_default(json!("")))
            .build()
            .unwrap()
    }

    #[test]
    fn properties_start_unset() {
        let lp = Loop::new();
        let thing = Component::new(&class(), &lp).unwrap();
        assert_eq!(thing.get("foo").unwrap(), None);
        assert_eq!(thing.property_cell("foo").unwrap().timestamp(), 0);
        assert!(thing.property_cell("title").is_none());
    }

    #[test]
    fn members_are_read_only_slots() {
        let lp = Loop::new();
        let thing = Component::new(&class(), &lp).unwrap();
        for name in ["foo", "set_foo", "title"] {
            assert!(matches!(
                thing.set_attr(name, json!(3)),
                Err(Error::ReadOnly { .. })
            ));
            assert!(matches!(thing.del_attr(name), Err(Error::ReadOnly { .. })));
        }
    }

    #[test]
    fn plain_attributes_are_free() {
        let lp = Loop::new();
        let thing = Component::new(&class(), &lp).unwrap();
        thing.set_attr("color", json!("red")).unwrap();
        assert_eq!(thing.attr("color").unwrap().as_value(), Some(&json!("red")));
        assert!(thing.del_attr("color").unwrap().is_some());
        assert!(thing.attr("color").is_none());
        assert!(thing.del_attr("color").unwrap().is_none());
    }

    #[test]
    fn unknown_initial_values_are_rejected() {
        let lp = Loop::new();
        let err = Component::with_values(&class(), &lp, [("bar", json!(1))]).unwrap_err();
        assert!(matches!(err, Error::NoSuchMember { .. }));
    }

    #[test]
    fn rejected_construction_queues_nothing() {
        let lp = Loop::new();
        let err = Component::with_values(&class(), &lp, [("foo", json!(1)), ("bar", json!(2))])
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchMember { ref name, .. } if name == "bar"));
        assert!(!lp.has_pending());
        assert!(lp.iterate().unwrap().is_idle());
    }

    #[test]
    fn queued_work_does_not_outlive_the_loop() {
        let lp = Loop::new();
        let thing = Component::new(&class(), &lp).unwrap();
        thing.invoke("set_foo", &[json!(1)]).unwrap();
        assert!(thing.event_loop().unwrap().same_loop(&lp));

        drop(lp);
        assert!(thing.event_loop().is_none());
        let err = thing.invoke("set_foo", &[json!(2)]).unwrap_err();
        assert!(matches!(err, Error::LoopDropped { .. }));
        assert_eq!(err.kind(), ErrorKind::Scheduling);
    }

    #[test]
    fn weak_handle_tracks_lifetime() {
        let lp = Loop::new();
        let thing = Component::new(&class(), &lp).unwrap();
        let weak = thing.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&thing));
        drop(thing);
        assert!(weak.is_dropped());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn display_names_class_and_instance() {
        let lp = Loop::new();
        let thing = Component::new(&class(), &lp).unwrap();
        assert_eq!(thing.to_string(), format!("Thing#{}", thing.id()));
    }
}
