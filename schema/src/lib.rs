//! Declarative schema validation and field capture for TLV trees.
//!
//! A [`Schema`] describes the expected shape of a parsed [`tlv::Node`]:
//! tag class, tag number, and constructed flag (each optionally a
//! wildcard), an ordered child list, and named capture slots. Validation
//! walks the tree, tolerates missing `optional` entries, collects
//! human-readable diagnostics for mismatches, and stores captured values
//! in a map keyed by the declared names.
//!
//! ```
//! use schema::Schema;
//! use tlv::{from_der, universal, ParseOptions, TagClass};
//!
//! let schema = Schema::new("example")
//!     .tag_class(TagClass::Universal)
//!     .tag_number(universal::SEQUENCE)
//!     .constructed(true)
//!     .children(vec![
//!         Schema::new("version")
//!             .tag_class(TagClass::Universal)
//!             .tag_number(universal::INTEGER)
//!             .constructed(false)
//!             .capture("v"),
//!     ]);
//!
//! let node = from_der(&[0x30, 0x03, 0x02, 0x01, 0x05], ParseOptions::default()).unwrap();
//! let report = schema.validate(&node).unwrap();
//! assert!(report.matched());
//! assert_eq!(Some(&[0x05][..]), report.capture("v").and_then(|c| c.as_bytes()));
//! ```

pub mod error;

use std::collections::HashMap;

use error::Error;
use tlv::{Node, TagClass, Value};

/// A value stored in the capture map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    /// A node's value: raw bytes or its child list
    Value(Value),
    /// A whole subtree
    Node(Node),
}

impl Captured {
    /// Captured raw bytes, if this capture holds a primitive value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Captured::Value(value) => value.data(),
            Captured::Node(_) => None,
        }
    }

    /// Captured child list, if this capture holds a composed value.
    pub fn as_children(&self) -> Option<&[Node]> {
        match self {
            Captured::Value(value) => value.children(),
            Captured::Node(_) => None,
        }
    }

    /// The captured subtree, if this capture holds a whole node.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Captured::Value(_) => None,
            Captured::Node(node) => Some(node),
        }
    }
}

/// Outcome of a validation run: the overall verdict, the capture map, and
/// the mismatch diagnostics.
#[derive(Debug, Default)]
pub struct Report {
    matched: bool,
    captures: HashMap<String, Captured>,
    diagnostics: Vec<String>,
}

impl Report {
    /// True only if the top-level node and all required children matched.
    pub fn matched(&self) -> bool {
        self.matched
    }

    pub fn captures(&self) -> &HashMap<String, Captured> {
        &self.captures
    }

    pub fn capture(&self, key: &str) -> Option<&Captured> {
        self.captures.get(key)
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

/// A schema entry. Unset tag fields are wildcards that match anything.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    tag_class: Option<TagClass>,
    tag_number: Option<u8>,
    constructed: Option<bool>,
    optional: bool,
    children: Vec<Schema>,
    capture: Option<String>,
    capture_node: Option<String>,
    capture_bit_string_contents: Option<String>,
    capture_bit_string_value: Option<String>,
}

impl Schema {
    /// Creates a wildcard entry named `name` (the name appears in
    /// diagnostics).
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            ..Schema::default()
        }
    }

    /// Requires the given tag class.
    pub fn tag_class(mut self, tag_class: TagClass) -> Self {
        self.tag_class = Some(tag_class);
        self
    }

    /// Requires the given tag number.
    pub fn tag_number(mut self, tag_number: u8) -> Self {
        self.tag_number = Some(tag_number);
        self
    }

    /// Requires the constructed flag to equal `constructed`.
    pub fn constructed(mut self, constructed: bool) -> Self {
        self.constructed = Some(constructed);
        self
    }

    /// Marks this entry as skippable: a mismatch neither consumes an
    /// actual child nor fails the parent.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Ordered child entries matched against the node's children.
    pub fn children(mut self, children: Vec<Schema>) -> Self {
        self.children = children;
        self
    }

    /// On match, stores the node's value under `key`.
    pub fn capture(mut self, key: impl Into<String>) -> Self {
        self.capture = Some(key.into());
        self
    }

    /// On match, stores the whole node under `key`.
    pub fn capture_node(mut self, key: impl Into<String>) -> Self {
        self.capture_node = Some(key.into());
        self
    }

    /// On match, stores the raw BIT STRING contents (including the
    /// unused-bits counter) under `key`.
    pub fn capture_bit_string_contents(mut self, key: impl Into<String>) -> Self {
        self.capture_bit_string_contents = Some(key.into());
        self
    }

    /// On match, stores the BIT STRING contents minus the counter byte
    /// under `key`. Fails hard if the counter is nonzero.
    pub fn capture_bit_string_value(mut self, key: impl Into<String>) -> Self {
        self.capture_bit_string_value = Some(key.into());
        self
    }

    /// Matches `node` against this schema.
    ///
    /// Mismatches are non-fatal: the report carries the verdict and the
    /// diagnostics. The only hard failure is a BIT STRING value capture
    /// with a nonzero unused-bits counter.
    pub fn validate(&self, node: &Node) -> Result<Report, Error> {
        let mut report = Report::default();
        report.matched = self.validate_inner(node, &mut report.captures, &mut report.diagnostics)?;
        Ok(report)
    }

    fn validate_inner(
        &self,
        node: &Node,
        captures: &mut HashMap<String, Captured>,
        diagnostics: &mut Vec<String>,
    ) -> Result<bool, Error> {
        let mut tag_mismatch = false;
        if let Some(expected) = self.tag_class {
            if expected != node.tag_class() {
                diagnostics.push(format!(
                    "[{}] expected tag class {}, got {}",
                    self.name,
                    expected,
                    node.tag_class()
                ));
                tag_mismatch = true;
            }
        }
        if let Some(expected) = self.tag_number {
            if expected != node.tag_number() {
                diagnostics.push(format!(
                    "[{}] expected tag number {}, got {}",
                    self.name,
                    expected,
                    node.tag_number()
                ));
                tag_mismatch = true;
            }
        }
        if tag_mismatch {
            return Ok(false);
        }
        if let Some(expected) = self.constructed {
            if expected != node.is_constructed() {
                diagnostics.push(format!(
                    "[{}] expected constructed {}, got {}",
                    self.name,
                    expected,
                    node.is_constructed()
                ));
                return Ok(false);
            }
        }

        let mut matched = true;
        if !self.children.is_empty() {
            let actual = node.children().unwrap_or(&[]);
            let mut j = 0;
            for child_schema in &self.children {
                let child_matched = match actual.get(j) {
                    Some(child) => {
                        let ok = child_schema.validate_inner(child, captures, diagnostics)?;
                        if ok {
                            j += 1;
                        }
                        ok
                    }
                    None => false,
                };
                if !child_matched && !child_schema.optional {
                    // required child failed; keep walking so diagnostics
                    // cover the remaining entries
                    diagnostics.push(format!(
                        "[{}] required child [{}] did not match at position {}",
                        self.name, child_schema.name, j
                    ));
                    matched = false;
                }
            }
        }

        if matched {
            self.apply_captures(node, captures)?;
        }
        Ok(matched)
    }

    fn apply_captures(
        &self,
        node: &Node,
        captures: &mut HashMap<String, Captured>,
    ) -> Result<(), Error> {
        if let Some(key) = &self.capture {
            captures.insert(key.clone(), Captured::Value(node.value().clone()));
        }
        if let Some(key) = &self.capture_node {
            captures.insert(key.clone(), Captured::Node(node.clone()));
        }
        if let Some(contents) = node.bit_string_contents() {
            if let Some(key) = &self.capture_bit_string_contents {
                captures.insert(
                    key.clone(),
                    Captured::Value(Value::Primitive(contents.to_vec())),
                );
            }
            if let Some(key) = &self.capture_bit_string_value {
                let value = if contents.len() < 2 {
                    Vec::new()
                } else {
                    if contents[0] != 0 {
                        return Err(Error::UnsupportedBitAlignment {
                            unused_bits: contents[0],
                        });
                    }
                    contents[1..].to_vec()
                };
                captures.insert(key.clone(), Captured::Value(Value::Primitive(value)));
            }
        }
        Ok(())
    }
}
