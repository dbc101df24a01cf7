//! Class Descriptions
//!
//! A [`ClassDescription`] is the structural summary of a component class
//! that an external code generator needs to rebuild the class on another
//! runtime: member names, how each action came to exist, each signal's
//! mode, dependency paths and default.
//!
//! Bodies are opaque closures and are not described; the generator is
//! expected to pair each description with its own implementations.
//!
//! Descriptions encode to JSON for inspection and to MessagePack for
//! transport.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reactive::{ActionKind, ComponentClass, SignalMode};
use crate::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescription {
    pub name: String,
    pub settable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescription {
    pub name: String,
    /// Class whose body declared the action.
    pub declared_in: String,
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Whether the action overrides an inherited one.
    pub overrides: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescription {
    pub name: String,
    pub declared_in: String,
    pub mode: SignalMode,
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub callable: bool,
    pub has_evaluator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Structural description of a [`ComponentClass`], inherited members
/// included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub properties: Vec<PropertyDescription>,
    pub actions: Vec<ActionDescription>,
    pub signals: Vec<SignalDescription>,
}

impl ClassDescription {
    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as MessagePack, with field names.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Find a signal by name.
    pub fn signal(&self, name: &str) -> Option<&SignalDescription> {
        self.signals.iter().find(|signal| signal.name == name)
    }

    /// Find an action by name.
    pub fn action(&self, name: &str) -> Option<&ActionDescription> {
        self.actions.iter().find(|action| action.name == name)
    }
}

impl ComponentClass {
    /// Describe this class for code generation.
    pub fn describe(&self) -> ClassDescription {
        ClassDescription {
            name: self.name().to_string(),
            base: self.base().map(|base| base.name().to_string()),
            properties: self
                .properties()
                .map(|prop| PropertyDescription {
                    name: prop.name().to_string(),
                    settable: prop.is_settable(),
                    doc: prop.documentation().map(str::to_string),
                })
                .collect(),
            actions: self
                .actions()
                .map(|action| ActionDescription {
                    name: action.name().to_string(),
                    declared_in: action.class_name().to_string(),
                    kind: action.kind().clone(),
                    overrides: action.parent().is_some(),
                    doc: action.documentation().map(str::to_string),
                })
                .collect(),
            signals: self
                .signals()
                .map(|signal| SignalDescription {
                    name: signal.name().to_string(),
                    declared_in: signal.declared_in().to_string(),
                    mode: signal.mode(),
                    dependencies: signal.dependencies().to_vec(),
                    default: signal.default_value().cloned(),
                    callable: signal.accepts_call(),
                    has_evaluator: signal.evaluator().is_some(),
                    doc: signal.documentation().map(str::to_string),
                })
                .collect(),
        }
    }
}
