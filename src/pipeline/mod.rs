//! Pipeline definition types.
//!
//! The serialized pipeline shape (`version: 1`): an ordered sequence of
//! nodes and edges. Unknown fields on nodes and edges are ignored so that
//! newer editors can round-trip extra metadata through older runtimes.
//!
//! The engine treats node `position` and edge handles as opaque — positions
//! belong to the visual editor, handles are labels kept for debugging.
//! Routing is by `(source, target)` pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};

/// Node identifier. Opaque to the engine.
pub type NodeId = String;

/// The closed set of node kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Input,
    Output,
    RemoveBg,
    Normalize,
    Outline,
    Upscale,
}

impl NodeKind {
    /// Whether this kind is a processing stage (neither source nor sink).
    #[must_use]
    pub fn is_processing(self) -> bool {
        !matches!(self, NodeKind::Input | NodeKind::Output)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::RemoveBg => "remove-bg",
            NodeKind::Normalize => "normalize",
            NodeKind::Outline => "outline",
            NodeKind::Upscale => "upscale",
        };
        f.write_str(name)
    }
}

/// A single node parameter value: primitive only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Node parameters. `BTreeMap` keeps keys sorted so that serialization and
/// cache-key hashing are order-independent by construction.
pub type Params = BTreeMap<String, ParamValue>;

/// Editor-owned canvas position. Opaque to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A typed processing stage in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NodeDef {
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            params: Params::new(),
            label: None,
        }
    }

    /// Builder-style parameter insertion, used mostly by tests and tools.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub id: String,
    pub source: NodeId,
    #[serde(default, rename = "sourceHandle")]
    pub source_handle: String,
    pub target: NodeId,
    #[serde(default, rename = "targetHandle")]
    pub target_handle: String,
}

impl EdgeDef {
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_handle: String::new(),
            target: target.into(),
            target_handle: String::new(),
        }
    }
}

/// The complete serialized pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default = "default_version")]
    pub version: u32,
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
}

fn default_version() -> u32 {
    1
}

impl PipelineDefinition {
    #[must_use]
    pub fn new(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> Self {
        Self {
            version: 1,
            nodes,
            edges,
        }
    }

    /// Parses a pipeline from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::Decode(e.to_string()))
    }

    /// Serializes the pipeline to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PipelineError::Encode(e.to_string()))
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
