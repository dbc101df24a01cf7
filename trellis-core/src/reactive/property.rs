//! Properties
//!
//! A property is a named value slot on a component. Readable by anyone,
//! writable only by a mutator running inside one of the component's own
//! actions.

use serde::{Deserialize, Serialize};

/// Declaration of a property on a component class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    settable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doc: Option<String>,
}

impl Property {
    /// Declare a property without a setter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settable: false,
            doc: None,
        }
    }

    /// Request a synthesized `set_<name>` action for this property.
    pub fn settable(mut self) -> Self {
        self.settable = true;
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

    /// Whether a `set_<name>` action is synthesized.
    pub fn is_settable(&self) -> bool {
        self.settable
    }

    /// Doc text given at declaration.
    pub fn documentation(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Name of the synthesized setter action.
    pub fn setter_name(&self) -> String {
        format!("set_{}", self.name)
    }
}
