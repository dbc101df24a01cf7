//! Connectors
//!
//! A connector turns a dependency expression such as `"button.title"` into
//! a subscription on a live node. Every segment but the last is an
//! attribute hop from one component to another; the last segment names a
//! property or signal on the component reached.
//!
//! Resolution is lazy and repeatable. A node re-walks its paths each time
//! it is evaluated, and every hop leaves a watcher on the attribute it
//! crossed, so assigning that attribute later wakes the node up.

use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::node::Node;
use crate::error::{Error, Result};
use crate::reactive::{Attribute, Component};

/// A parsed dotted dependency path, rooted at the owning component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyPath {
    text: String,
    segments: SmallVec<[String; 2]>,
}

impl DependencyPath {
    /// Parse a dotted path. Every segment must be a valid identifier.
    pub fn parse(text: &str) -> std::result::Result<Self, &'static str> {
        if text.is_empty() {
            return Err("dependency path is empty");
        }
        let mut segments = SmallVec::new();
        for segment in text.split('.') {
            if segment.is_empty() {
                return Err("dependency path has an empty segment");
            }
            if !is_identifier(segment) {
                return Err("dependency path segments must be identifiers");
            }
            segments.push(segment.to_string());
        }
        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    /// The path as written in the declaration.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Attribute names to walk, ending with the signal name.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The attribute hops leading to the target (all segments but the last).
    pub fn hops(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// The member named by the final segment.
    pub fn target(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }
}

impl std::fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Whether `name` is usable as a member or path segment.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One dependency of a node: its path and the node it is bound to, if any.
#[derive(Debug)]
pub(crate) struct Connector {
    path: DependencyPath,
    target: Option<Weak<Node>>,
}

impl Connector {
    pub(crate) fn new(path: DependencyPath) -> Self {
        Self { path, target: None }
    }

    pub(crate) fn path(&self) -> &DependencyPath {
        &self.path
    }

    /// The bound node, if the binding exists and its owner is still alive.
    pub(crate) fn live_target(&self) -> Option<Arc<Node>> {
        self.target.as_ref().and_then(Weak::upgrade)
    }

    /// Replace the binding, returning the previous one.
    pub(crate) fn bind(&mut self, node: &Arc<Node>) -> Option<Weak<Node>> {
        self.target.replace(Arc::downgrade(node))
    }

    pub(crate) fn unbind(&mut self) -> Option<Weak<Node>> {
        self.target.take()
    }
}

/// Walk `path` from `root` and return the node it names.
///
/// `watcher` is registered on every attribute the walk crosses or stops
/// at, so that it is notified when that attribute changes.
pub(crate) fn resolve(
    root: &Component,
    path: &DependencyPath,
    watcher: &Arc<Node>,
) -> Result<Arc<Node>> {
    let mut current = root.clone();
    for hop in path.hops() {
        current.watch_attr(hop, watcher);
        match current.attr(hop) {
            Some(Attribute::Component(next)) => current = next,
            _ => {
                return Err(Error::Unresolved {
                    path: path.to_string(),
                    missing: hop.clone(),
                })
            }
        }
    }
    current
        .node(path.target())
        .cloned()
        .ok_or_else(|| Error::NoSuchSignal {
            path: path.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_segment() {
        let path = DependencyPath::parse("title").unwrap();
        assert_eq!(path.as_str(), "title");
        assert!(path.hops().is_empty());
        assert_eq!(path.target(), "title");
    }

    #[test]
    fn parses_dotted_path() {
        let path = DependencyPath::parse("window.button.title").unwrap();
        assert_eq!(path.hops(), ["window".to_string(), "button".to_string()]);
        assert_eq!(path.target(), "title");
        assert_eq!(path.to_string(), "window.button.title");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(DependencyPath::parse("").is_err());
        assert!(DependencyPath::parse("a..b").is_err());
        assert!(DependencyPath::parse("a.").is_err());
        assert!(DependencyPath::parse("a.1b").is_err());
        assert!(DependencyPath::parse("a b").is_err());
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("first_name"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("s2"));
        assert!(!is_identifier("2s"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
