//! Per-compilation state.
//!
//! One `CompileContext` is created at the start of `compile` and consumed at
//! its end. The generator itself keeps nothing between calls.

use std::collections::HashMap;

use jobgen_core::id::{ChainId, NodeId, VertexId};
use jobgen_core::job::JobGraph;
use jobgen_core::plan::OptimizedPlan;
use jobgen_core::task_config::TaskConfig;

use crate::error::GenerationError;

/// A node fused into another vertex's thread instead of getting its own.
#[derive(Debug, Clone)]
pub(crate) struct ChainRecord {
    /// Push-chain driver identifier.
    pub driver: &'static str,
    pub config: TaskConfig,
    pub name: String,
    /// The real vertex hosting the chain; set once during the node's
    /// post-visit and never changed afterwards.
    pub host: Option<VertexId>,
}

/// Which configuration a wiring step writes its output entries into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigTarget {
    Vertex(VertexId),
    Chain(ChainId),
}

/// The producing end of a wire: the physical vertex the wire leaves from and
/// the config that records the output slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceEndpoint {
    pub vertex: VertexId,
    pub config: ConfigTarget,
}

pub(crate) struct CompileContext {
    pub graph: JobGraph,
    vertices: HashMap<NodeId, VertexId>,
    chains: HashMap<NodeId, ChainId>,
    records: Vec<ChainRecord>,
    /// Chains in resolution order; decides execution order inside hosts.
    sequence: Vec<ChainId>,
    /// Highest-parallelism vertex seen so far (first seen wins ties).
    anchor: Option<VertexId>,
}

impl CompileContext {
    pub fn new(plan: &OptimizedPlan) -> Self {
        let mut graph = JobGraph::new(plan.job_name());
        graph.config_mut().merge_from(plan.config());
        Self {
            graph,
            vertices: HashMap::new(),
            chains: HashMap::new(),
            records: Vec::new(),
            sequence: Vec::new(),
            anchor: None,
        }
    }

    pub fn is_translated(&self, node: NodeId) -> bool {
        self.vertices.contains_key(&node) || self.chains.contains_key(&node)
    }

    pub fn vertex_of(&self, node: NodeId) -> Option<VertexId> {
        self.vertices.get(&node).copied()
    }

    pub fn chain_of(&self, node: NodeId) -> Option<ChainId> {
        self.chains.get(&node).copied()
    }

    pub fn register_vertex(&mut self, node: NodeId, vertex: VertexId) {
        self.vertices.insert(node, vertex);
    }

    pub fn register_chain(&mut self, node: NodeId, record: ChainRecord) -> ChainId {
        let id = ChainId::new(self.records.len() as u64);
        self.records.push(record);
        self.chains.insert(node, id);
        id
    }

    pub fn chain(&self, id: ChainId) -> Result<&ChainRecord, GenerationError> {
        self.records
            .get(id.index())
            .ok_or_else(|| GenerationError::contract(format!("unknown chain {id}")))
    }

    pub fn chain_mut(&mut self, id: ChainId) -> Result<&mut ChainRecord, GenerationError> {
        self.records
            .get_mut(id.index())
            .ok_or_else(|| GenerationError::contract(format!("unknown chain {id}")))
    }

    pub fn push_resolved_chain(&mut self, id: ChainId) {
        self.sequence.push(id);
    }

    /// Offer a freshly materialized vertex as parallelism anchor.
    pub fn offer_anchor(&mut self, vertex: VertexId, parallelism: u32) -> bool {
        let replace = match self.anchor {
            None => true,
            Some(current) => self
                .graph
                .vertex(current)
                .map(|v| v.parallelism < parallelism)
                .unwrap_or(true),
        };
        if replace {
            self.anchor = Some(vertex);
        }
        replace
    }

    pub fn config_mut(&mut self, target: ConfigTarget) -> Result<&mut TaskConfig, GenerationError> {
        match target {
            ConfigTarget::Vertex(v) => Ok(&mut self.graph.vertex_mut(v)?.config),
            ConfigTarget::Chain(c) => Ok(&mut self.chain_mut(c)?.config),
        }
    }

    /// Resolve the physical producer for a plan node that feeds a wire.
    pub fn resolve_source(&self, node: NodeId) -> Result<SourceEndpoint, GenerationError> {
        if let Some(vertex) = self.vertex_of(node) {
            return Ok(SourceEndpoint {
                vertex,
                config: ConfigTarget::Vertex(vertex),
            });
        }
        let chain = self.chain_of(node).ok_or_else(|| {
            GenerationError::contract(format!("predecessor {node} was not translated before its consumer"))
        })?;
        let host = self.chain(chain)?.host.ok_or_else(|| {
            GenerationError::contract(format!(
                "chained predecessor {node} has no containing vertex when connecting"
            ))
        })?;
        Ok(SourceEndpoint {
            vertex: host,
            config: ConfigTarget::Chain(chain),
        })
    }

    /// Split the context into the parts finalization needs.
    pub fn into_parts(self) -> ContextParts {
        ContextParts {
            graph: self.graph,
            vertices: self.vertices,
            chains: self.chains,
            records: self.records,
            sequence: self.sequence,
            anchor: self.anchor,
        }
    }
}

pub(crate) struct ContextParts {
    pub graph: JobGraph,
    pub vertices: HashMap<NodeId, VertexId>,
    pub chains: HashMap<NodeId, ChainId>,
    pub records: Vec<ChainRecord>,
    pub sequence: Vec<ChainId>,
    pub anchor: Option<VertexId>,
}
