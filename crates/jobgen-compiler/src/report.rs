//! What a compilation decided, beyond the graph itself.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use jobgen_core::id::{NodeId, VertexId};

/// Non-fatal findings of one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// The plan names no instance type; the anchor is left without one.
    MissingInstanceType { anchor: VertexId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingInstanceType { anchor } => {
                write!(f, "no instance type set; anchor {anchor} has none")
            }
        }
    }
}

/// Where a plan node ended up in the job graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placement {
    Vertex(VertexId),
    /// Fused into `host`; `position` is its index in the host's chain list.
    Chained { host: VertexId, position: usize },
    /// A union, which maps to nothing.
    Spliced,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompileReport {
    pub diagnostics: Vec<Diagnostic>,
    pub placements: BTreeMap<NodeId, Placement>,
    /// The vertex every other vertex shares instances with.
    pub anchor: Option<VertexId>,
}

impl CompileReport {
    pub fn placement(&self, node: NodeId) -> Option<Placement> {
        self.placements.get(&node).copied()
    }

    /// Number of nodes fused into other vertices.
    pub fn chained_count(&self) -> usize {
        self.placements
            .values()
            .filter(|p| matches!(p, Placement::Chained { .. }))
            .count()
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
