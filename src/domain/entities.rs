//! Domain entities: core data structures

use std::collections::BTreeMap;
use serde::Deserialize;

/// Unique identifier of a response within one optimization run.
pub type ResponseId = String;

/// Opaque key of a design point (a mesh node id).
pub type PointKey = u64;

/// Three-component vector attached to a design point.
pub type Vector3 = [f64; 3];

/// Per-point gradient of a response. Ordered by key so folds are reproducible.
pub type GradientField = BTreeMap<PointKey, Vector3>;

/// Current design handed to the analyzers: point key to coordinates.
pub type DesignSnapshot = BTreeMap<PointKey, Vector3>;

/// Node of the weighted response dependency tree.
///
/// A composite always has at least one child; a leaf is evaluated by an
/// analyzer and never combined.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseNode {
    Leaf {
        id: ResponseId,
        weight: f64,
    },
    Composite {
        id: ResponseId,
        weight: f64,
        children: Vec<ResponseNode>,
    },
}

impl ResponseNode {
    pub fn leaf(id: impl Into<ResponseId>, weight: f64) -> Self {
        Self::Leaf {
            id: id.into(),
            weight,
        }
    }

    pub fn composite(id: impl Into<ResponseId>, weight: f64, children: Vec<ResponseNode>) -> Self {
        Self::Composite {
            id: id.into(),
            weight,
            children,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Leaf { id, .. } | Self::Composite { id, .. } => id,
        }
    }

    /// Weight relative to the parent.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Leaf { weight, .. } | Self::Composite { weight, .. } => *weight,
        }
    }

    pub fn children(&self) -> &[ResponseNode] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Composite { children, .. } => children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// This node followed by all descendants, parents before children.
    pub fn pre_order(&self) -> Vec<&ResponseNode> {
        let mut nodes = vec![self];
        for child in self.children() {
            nodes.extend(child.pre_order());
        }
        nodes
    }

    /// Leaf descendants in configuration order (the node itself if it is a leaf).
    pub fn leaves(&self) -> Vec<&ResponseNode> {
        self.pre_order()
            .into_iter()
            .filter(|node| node.is_leaf())
            .collect()
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(ResponseNode::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Top-level composite responses in configuration order.
///
/// Childless top-level responses are atomic and never appear here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    roots: Vec<ResponseNode>,
}

impl DependencyGraph {
    pub fn new(roots: Vec<ResponseNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[ResponseNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Every node of every tree, pre-order.
    pub fn pre_order(&self) -> Vec<&ResponseNode> {
        self.roots.iter().flat_map(ResponseNode::pre_order).collect()
    }

    /// Identifiers in pre-order; position `i` carries the report label `f{i}`.
    pub fn identifiers(&self) -> Vec<&str> {
        self.pre_order().into_iter().map(ResponseNode::id).collect()
    }

    pub fn find(&self, id: &str) -> Option<&ResponseNode> {
        self.pre_order().into_iter().find(|node| node.id() == id)
    }
}

/// A response evaluated natively by the internal analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalResponse {
    pub id: ResponseId,
    /// Solver-specific settings, passed through untouched.
    pub settings: serde_json::Value,
}

/// Optimization direction or constraint kind of a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ResponseType {
    #[default]
    #[serde(rename = "minimization")]
    Minimization,
    #[serde(rename = "maximization")]
    Maximization,
    #[serde(rename = "=")]
    Equality,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl ResponseType {
    /// Sign applied to values and gradients so that every response is minimized
    /// or bounded from above.
    pub fn standardization_factor(self) -> f64 {
        match self {
            Self::Maximization | Self::GreaterThan | Self::GreaterOrEqual => -1.0,
            _ => 1.0,
        }
    }
}

/// Euclidean length of a point vector.
pub fn vector_norm(v: &Vector3) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
