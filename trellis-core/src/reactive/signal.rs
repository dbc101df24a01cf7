//! Signals
//!
//! A signal is a named value on a component that is either set from
//! outside or computed from other members.
//!
//! # Modes
//!
//! - **source**: the input boundary of the graph. Written through the
//!   dedicated setter [`Signal::set`]. Sources declared with
//!   [`SignalDecl::input`] may also be called with one argument.
//! - **pull**: recomputed lazily, when read and stale.
//! - **push**: recomputed by the loop whenever a dependency changed,
//!   whether or not anyone reads it. Meant for side-effecting observers.
//!
//! # Declaring Signals
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::SignalDecl;
//!
//! let first = SignalDecl::input("first_name").with_default(json!("john"));
//! let last = SignalDecl::input("last_name").with_default(json!("doe"));
//! let full = SignalDecl::pull("full_name", ["first_name", "last_name"]).evaluate(|inputs| {
//!     Ok(json!(format!("{} {}", inputs.str(0)?, inputs.str(1)?)))
//! });
//! # let _ = (first, last, full);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::component::Component;
use crate::cell::ValueCell;
use crate::error::{Error, Result};
use crate::graph::node::Node;
use crate::graph::{is_identifier, ConnectionState, DependencyPath};
use crate::Value;

/// Evaluation mode of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalMode {
    Source,
    Pull,
    Push,
}

impl std::fmt::Display for SignalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SignalMode::Source => "source",
            SignalMode::Pull => "pull",
            SignalMode::Push => "push",
        })
    }
}

/// Computation run to produce a signal's value.
pub type Evaluator = Arc<dyn Fn(&Inputs<'_>) -> Result<Value> + Send + Sync>;

/// The values an evaluator works from.
///
/// Upstream values are indexed in declared dependency order. A source
/// evaluator also sees its last explicit input; when the source itself was
/// just set, every upstream slot is `None`.
pub struct Inputs<'a> {
    signal: &'a str,
    explicit: Option<&'a Value>,
    upstream: &'a [Option<Value>],
    from_upstream: bool,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(
        signal: &'a str,
        explicit: Option<&'a Value>,
        upstream: &'a [Option<Value>],
        from_upstream: bool,
    ) -> Self {
        Self {
            signal,
            explicit,
            upstream,
            from_upstream,
        }
    }

    /// Name of the signal being evaluated.
    pub fn signal(&self) -> &str {
        self.signal
    }

    /// The source's last explicit input (its default until first set).
    pub fn explicit(&self) -> Option<&Value> {
        self.explicit
    }

    /// Whether this evaluation was triggered by an upstream change.
    pub fn from_upstream(&self) -> bool {
        self.from_upstream
    }

    /// Number of upstream values, one per dependency path.
    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }

    /// Upstream value `index`, or `None` if it is unset.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.upstream.get(index).and_then(Option::as_ref)
    }

    /// Upstream value `index`, failing if it is unset.
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.get(index).ok_or_else(|| {
            Error::evaluation(self.signal, format!("input {index} is unset"))
        })
    }

    /// The upstream value at `index` as a string.
    pub fn str(&self, index: usize) -> Result<&str> {
        self.value(index)?.as_str().ok_or_else(|| {
            Error::evaluation(self.signal, format!("input {index} is not a string"))
        })
    }

    /// The upstream value at `index` as an integer.
    pub fn i64(&self, index: usize) -> Result<i64> {
        self.value(index)?.as_i64().ok_or_else(|| {
            Error::evaluation(self.signal, format!("input {index} is not an integer"))
        })
    }

    /// All upstream values in declared order.
    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.upstream.iter().map(Option::as_ref)
    }
}

/// Declaration of one signal on a component class.
#[derive(Clone)]
pub struct SignalDecl {
    name: String,
    mode: SignalMode,
    dependencies: Vec<String>,
    paths: Vec<DependencyPath>,
    default: Option<Value>,
    evaluator: Option<Evaluator>,
    accepts_call: bool,
    declared_in: String,
    doc: Option<String>,
}

impl SignalDecl {
    fn with_mode(name: String, mode: SignalMode, dependencies: Vec<String>) -> Self {
        Self {
            name,
            mode,
            dependencies,
            paths: Vec::new(),
            default: None,
            evaluator: None,
            accepts_call: false,
            declared_in: String::new(),
            doc: None,
        }
    }

    /// A source that can also be set by calling it with one argument.
    pub fn input(name: impl Into<String>) -> Self {
        let mut decl = Self::with_mode(name.into(), SignalMode::Source, Vec::new());
        decl.accepts_call = true;
        decl
    }

    /// A source settable only through [`Signal::set`].
    pub fn source(name: impl Into<String>) -> Self {
        Self::with_mode(name.into(), SignalMode::Source, Vec::new())
    }

    /// A lazily recomputed signal.
    pub fn pull<I, S>(name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deps = dependencies.into_iter().map(Into::into).collect();
        Self::with_mode(name.into(), SignalMode::Pull, deps)
    }

    /// An eagerly recomputed signal.
    pub fn push<I, S>(name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deps = dependencies.into_iter().map(Into::into).collect();
        Self::with_mode(name.into(), SignalMode::Push, deps)
    }

    /// Add dependency expressions. On a source this forms a cycle member.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Initial explicit input of a source, applied at construction.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Set the function that computes the value from its inputs.
    pub fn evaluate<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&Inputs<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Attach doc text.
    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.doc = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the signal is a source, pull or push signal.
    pub fn mode(&self) -> SignalMode {
        self.mode
    }

    /// Dependency expressions as declared.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Value applied at construction, before any transform.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The evaluator, if one was given.
    pub fn evaluator(&self) -> Option<&Evaluator> {
        self.evaluator.as_ref()
    }

    /// Whether calling with one argument sets the value.
    pub fn accepts_call(&self) -> bool {
        self.accepts_call
    }

    /// Name of the class whose body declared this signal.
    pub fn declared_in(&self) -> &str {
        &self.declared_in
    }

    /// Doc text given at declaration.
    pub fn documentation(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub(crate) fn paths(&self) -> &[DependencyPath] {
        &self.paths
    }

    /// Run a source's evaluator on a freshly set explicit value.
    pub(crate) fn transform(&self, value: &Value) -> Result<Value> {
        match &self.evaluator {
            Some(evaluator) => {
                let upstream = vec![None; self.paths.len()];
                evaluator(&Inputs::new(&self.name, Some(value), &upstream, false))
            }
            None => Ok(value.clone()),
        }
    }

    /// Validate the declaration and parse its dependency paths.
    pub(crate) fn finalize(&mut self, class: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidDeclaration {
            class: class.to_string(),
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if !is_identifier(&self.name) {
            return Err(invalid("signal names must be identifiers"));
        }
        match self.mode {
            SignalMode::Pull | SignalMode::Push => {
                if self.dependencies.is_empty() {
                    return Err(invalid("derived signals need at least one dependency"));
                }
                if self.default.is_some() {
                    return Err(invalid("only sources take a default value"));
                }
                if self.evaluator.is_none() {
                    return Err(Error::NotCallable {
                        name: self.name.clone(),
                        reason: format!("{} signal declared without an evaluator", self.mode),
                    });
                }
            }
            SignalMode::Source => {
                if !self.dependencies.is_empty() && self.evaluator.is_none() {
                    return Err(Error::NotCallable {
                        name: self.name.clone(),
                        reason: "source with dependencies declared without an evaluator".into(),
                    });
                }
            }
        }

        let mut paths = Vec::with_capacity(self.dependencies.len());
        for dependency in &self.dependencies {
            paths.push(DependencyPath::parse(dependency).map_err(|reason| invalid(reason))?);
        }
        self.paths = paths;
        self.declared_in = class.to_string();
        Ok(())
    }
}

impl std::fmt::Debug for SignalDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalDecl")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("dependencies", &self.dependencies)
            .field("default", &self.default)
            .field("accepts_call", &self.accepts_call)
            .finish()
    }
}

/// Handle to a signal of one component instance.
#[derive(Clone)]
pub struct Signal {
    component: Component,
    node: Arc<Node>,
    mode: SignalMode,
}

impl Signal {
    pub(crate) fn new(component: Component, node: Arc<Node>, mode: SignalMode) -> Self {
        Self {
            component,
            node,
            mode,
        }
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Mode of the underlying declaration.
    pub fn mode(&self) -> SignalMode {
        self.mode
    }

    /// The component this signal belongs to.
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Dependency expressions as declared.
    pub fn dependencies(&self) -> &[String] {
        self.node
            .decl()
            .map(|decl| decl.dependencies())
            .unwrap_or_default()
    }

    /// Read the signal, recomputing it first if it is stale.
    ///
    /// Fails if this signal or anything upstream of it is not connected.
    pub fn get(&self) -> Result<Option<Value>> {
        self.node.read()
    }

    /// Call the signal the way a caller of the declared function would.
    ///
    /// With no arguments this reads. With one argument it sets an input;
    /// any other combination is rejected.
    pub fn call(&self, args: &[Value]) -> Result<Option<Value>> {
        let accepts_call = self.node.decl().is_some_and(|decl| decl.accepts_call());
        match args {
            [] => self.get(),
            [value] if accepts_call => {
                self.set(value.clone())?;
                self.get()
            }
            _ => Err(Error::UnsupportedCall {
                signal: self.name().to_string(),
                mode: self.mode,
                operation: "calling with arguments",
            }),
        }
    }

    /// The dedicated setter of source signals.
    pub fn set(&self, value: Value) -> Result<()> {
        self.node.set_explicit(value)
    }

    /// Break every binding of this signal.
    ///
    /// Push signals reconnect at once and re-run on the next flush.
    pub fn disconnect(&self) {
        self.node.disconnect();
    }

    /// Diagnostic for an unresolved dependency, or `None` when connected.
    pub fn not_connected(&self) -> Option<String> {
        self.node.not_connected()
    }

    /// Current binding state of the dependency paths.
    pub fn connection(&self) -> ConnectionState {
        self.node.connection()
    }

    /// The cached value, without evaluating.
    pub fn value(&self) -> Option<Value> {
        self.node.cached()
    }

    /// Clock value of the last change, or 0.
    pub fn timestamp(&self) -> u64 {
        self.node.cell().timestamp()
    }

    /// The value before the last change.
    pub fn last_value(&self) -> Option<Value> {
        self.node.cell().last_value().cloned()
    }

    /// Clock value of the change before the last one.
    pub fn last_timestamp(&self) -> u64 {
        self.node.cell().last_timestamp()
    }

    /// Snapshot of the underlying cell.
    pub fn cell(&self) -> ValueCell {
        self.node.cell()
    }

    /// Whether the signal has been computed (or set) at least once.
    pub fn is_computed(&self) -> bool {
        self.node.is_computed()
    }

    /// Number of live nodes bound to this signal.
    pub fn dependent_count(&self) -> usize {
        self.node.dependent_count()
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} signal '{}' of {}>", self.mode, self.name(), self.component)
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name())
            .field("mode", &self.mode)
            .field("value", &self.value())
            .field("connection", &self.connection())
            .finish()
    }
}
