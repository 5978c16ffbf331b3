//! Type-safe indices into a network's arenas.
//!
//! Templates, locations and edges reference each other by stable index, never
//! by owning pointer. The newtypes below keep the three index spaces apart so
//! that a location index can never be used to look up an edge.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a template inside a [`Network`][crate::network::Network].
///
/// Templates are only ever appended, so an id stays valid for the lifetime of
/// the network (and of every clone of it).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TemplateId(usize);

impl TemplateId {
    pub fn new(index: usize) -> Self {
        TemplateId(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Index of a location inside its [`Template`][crate::network::Template].
///
/// # Invariants
///
/// - A location id is only meaningful together with the template that issued it.
/// - Locations are never removed, so ids are stable across instrumentation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LocationId(usize);

impl LocationId {
    pub fn new(index: usize) -> Self {
        LocationId(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Index of an edge inside its template.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn new(index: usize) -> Self {
        EdgeId(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Network-wide reference to an edge: the owning template plus the edge index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub template: TemplateId,
    pub edge: EdgeId,
}

impl EdgeRef {
    pub fn new(template: TemplateId, edge: EdgeId) -> Self {
        EdgeRef { template, edge }
    }
}

impl fmt::Display for EdgeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.template, self.edge)
    }
}

impl From<usize> for TemplateId {
    fn from(index: usize) -> Self {
        TemplateId(index)
    }
}

impl From<usize> for LocationId {
    fn from(index: usize) -> Self {
        LocationId(index)
    }
}

impl From<usize> for EdgeId {
    fn from(index: usize) -> Self {
        EdgeId(index)
    }
}
