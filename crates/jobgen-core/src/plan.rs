//! The optimizer's output: an immutable DAG of annotated plan nodes.
//!
//! Nodes and channels live in arenas owned by `OptimizedPlan` and reference
//! each other by id. Children of a node are the sources of its input
//! channels; the sinks are the traversal roots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::descriptor::{ComparatorDescriptor, PairComparatorDescriptor, SerializerDescriptor, UserCode};
use crate::error::{Error, Result};
use crate::id::{ChannelId, NodeId};
use crate::strategy::{DriverStrategy, LocalStrategy, ShipStrategy, TempMode};

/// Variant-specific part of a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Source {
        serializer: SerializerDescriptor,
    },
    Sink,
    SingleInput {
        driver: DriverStrategy,
        comparator: Option<ComparatorDescriptor>,
    },
    DualInput {
        driver: DriverStrategy,
        comparator1: Option<ComparatorDescriptor>,
        comparator2: Option<ComparatorDescriptor>,
        pair_comparator: Option<PairComparatorDescriptor>,
    },
    /// Transparent fan-in splice; never becomes a vertex of its own.
    Union,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Source { .. } => "Source",
            NodeKind::Sink => "Sink",
            NodeKind::SingleInput { .. } => "SingleInput",
            NodeKind::DualInput { .. } => "DualInput",
            NodeKind::Union => "Union",
        }
    }

    /// Number of input channels the variant expects (`None` = any, at least one).
    pub fn expected_inputs(&self) -> Option<usize> {
        match self {
            NodeKind::Source { .. } => Some(0),
            NodeKind::Sink | NodeKind::SingleInput { .. } => Some(1),
            NodeKind::DualInput { .. } => Some(2),
            NodeKind::Union => None,
        }
    }
}

/// A node of the optimized plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Degree of parallelism (number of subtasks).
    pub parallelism: u32,
    /// Subtasks per instance; `None` leaves the runtime default.
    pub subtasks_per_instance: Option<u32>,
    /// Memory per subtask in bytes; zero means no dedicated memory.
    pub memory_per_subtask: u64,
    pub user_code: UserCode,
    /// Input channels in slot order.
    pub inputs: Vec<ChannelId>,
    /// Outgoing channels (fan-out bookkeeping).
    pub outgoing: Vec<ChannelId>,
}

impl PlanNode {
    pub fn is_union(&self) -> bool {
        matches!(self.kind, NodeKind::Union)
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' ({}, dop={})",
            self.kind.label(),
            self.name,
            self.id,
            self.parallelism
        )
    }
}

/// A directed edge between two plan nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub source: NodeId,
    pub target: NodeId,
    pub ship_strategy: ShipStrategy,
    pub ship_comparator: Option<ComparatorDescriptor>,
    pub local_strategy: LocalStrategy,
    pub local_comparator: Option<ComparatorDescriptor>,
    pub serializer: SerializerDescriptor,
    pub temp_mode: TempMode,
    /// Buffer memory in bytes; only meaningful when `temp_mode` is not `None`.
    pub temp_memory: u64,
    /// Memory in bytes for the local strategy (e.g. the sorter).
    pub local_strategy_memory: u64,
}

/// Everything about a node except its arena wiring.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub parallelism: u32,
    pub subtasks_per_instance: Option<u32>,
    pub memory_per_subtask: u64,
    pub user_code: UserCode,
}

impl NodeSpec {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        let name = name.into();
        Self {
            user_code: UserCode::new(format!("{name}Stub")),
            name,
            kind,
            parallelism: 1,
            subtasks_per_instance: None,
            memory_per_subtask: 0,
        }
    }

    pub fn source(name: impl Into<String>, serializer: SerializerDescriptor) -> Self {
        Self::with_kind(name, NodeKind::Source { serializer })
    }

    pub fn sink(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Sink)
    }

    pub fn single_input(name: impl Into<String>, driver: DriverStrategy) -> Self {
        Self::with_kind(
            name,
            NodeKind::SingleInput {
                driver,
                comparator: None,
            },
        )
    }

    pub fn dual_input(name: impl Into<String>, driver: DriverStrategy) -> Self {
        Self::with_kind(
            name,
            NodeKind::DualInput {
                driver,
                comparator1: None,
                comparator2: None,
                pair_comparator: None,
            },
        )
    }

    pub fn union(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Union)
    }

    pub fn parallelism(mut self, dop: u32) -> Self {
        self.parallelism = dop;
        self
    }

    pub fn subtasks_per_instance(mut self, n: u32) -> Self {
        self.subtasks_per_instance = Some(n);
        self
    }

    pub fn memory(mut self, bytes: u64) -> Self {
        self.memory_per_subtask = bytes;
        self
    }

    pub fn user_code(mut self, user_code: UserCode) -> Self {
        self.user_code = user_code;
        self
    }

    /// Set the driver comparator of a single-input node, or the first one of
    /// a dual-input node.
    pub fn comparator(mut self, c: ComparatorDescriptor) -> Self {
        match &mut self.kind {
            NodeKind::SingleInput { comparator, .. } => *comparator = Some(c),
            NodeKind::DualInput { comparator1, .. } => *comparator1 = Some(c),
            _ => {}
        }
        self
    }

    pub fn comparator2(mut self, c: ComparatorDescriptor) -> Self {
        if let NodeKind::DualInput { comparator2, .. } = &mut self.kind {
            *comparator2 = Some(c);
        }
        self
    }

    pub fn pair_comparator(mut self, c: PairComparatorDescriptor) -> Self {
        if let NodeKind::DualInput {
            pair_comparator, ..
        } = &mut self.kind
        {
            *pair_comparator = Some(c);
        }
        self
    }
}

/// Everything about a channel except its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub ship_strategy: ShipStrategy,
    pub ship_comparator: Option<ComparatorDescriptor>,
    pub local_strategy: LocalStrategy,
    pub local_comparator: Option<ComparatorDescriptor>,
    pub serializer: SerializerDescriptor,
    pub temp_mode: TempMode,
    pub temp_memory: u64,
    pub local_strategy_memory: u64,
}

impl ChannelSpec {
    pub fn new(ship_strategy: ShipStrategy, serializer: SerializerDescriptor) -> Self {
        Self {
            ship_strategy,
            ship_comparator: None,
            local_strategy: LocalStrategy::None,
            local_comparator: None,
            serializer,
            temp_mode: TempMode::None,
            temp_memory: 0,
            local_strategy_memory: 0,
        }
    }

    pub fn forward(serializer: SerializerDescriptor) -> Self {
        Self::new(ShipStrategy::Forward, serializer)
    }

    pub fn ship_comparator(mut self, c: ComparatorDescriptor) -> Self {
        self.ship_comparator = Some(c);
        self
    }

    pub fn local_strategy(mut self, strategy: LocalStrategy, c: Option<ComparatorDescriptor>) -> Self {
        self.local_strategy = strategy;
        self.local_comparator = c;
        self
    }

    pub fn local_memory(mut self, bytes: u64) -> Self {
        self.local_strategy_memory = bytes;
        self
    }

    pub fn temp(mut self, mode: TempMode, bytes: u64) -> Self {
        self.temp_mode = mode;
        self.temp_memory = bytes;
        self
    }
}

/// Callbacks for a depth-first walk over the plan.
///
/// `pre_visit` runs before a node's inputs are walked; returning `false`
/// skips both the inputs and the node's `post_visit`. `post_visit` runs after
/// all inputs have been post-visited.
pub trait PlanVisitor {
    type Error;

    fn pre_visit(&mut self, plan: &OptimizedPlan, node: &PlanNode) -> std::result::Result<bool, Self::Error>;

    fn post_visit(&mut self, plan: &OptimizedPlan, node: &PlanNode) -> std::result::Result<(), Self::Error>;
}

/// An optimized plan: node and channel arenas plus job-level settings.
///
/// Deserialization goes through `from_parts`, so a decoded plan carries the
/// same guarantees as a built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct OptimizedPlan {
    job_name: String,
    config: Configuration,
    instance_type: Option<String>,
    nodes: Vec<PlanNode>,
    channels: Vec<Channel>,
    sinks: Vec<NodeId>,
}

/// Wire form of `OptimizedPlan` before validation.
#[derive(Deserialize)]
struct RawPlan {
    job_name: String,
    config: Configuration,
    instance_type: Option<String>,
    nodes: Vec<PlanNode>,
    channels: Vec<Channel>,
    sinks: Vec<NodeId>,
}

impl TryFrom<RawPlan> for OptimizedPlan {
    type Error = Error;

    fn try_from(raw: RawPlan) -> Result<Self> {
        Self::from_parts(
            raw.job_name,
            raw.config,
            raw.instance_type,
            raw.nodes,
            raw.channels,
            raw.sinks,
        )
    }
}

impl OptimizedPlan {
    /// Assemble a plan from raw arenas.
    ///
    /// Only handle consistency and acyclicity are checked here; per-variant
    /// input arity is the optimizer's contract (see `PlanBuilder::build`).
    pub fn from_parts(
        job_name: impl Into<String>,
        config: Configuration,
        instance_type: Option<String>,
        nodes: Vec<PlanNode>,
        channels: Vec<Channel>,
        sinks: Vec<NodeId>,
    ) -> Result<Self> {
        let plan = Self {
            job_name: job_name.into(),
            config,
            instance_type,
            nodes,
            channels,
            sinks,
        };
        plan.check_handles()?;
        plan.check_acyclic()?;
        Ok(plan)
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn instance_type(&self) -> Option<&str> {
        self.instance_type.as_deref()
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn sinks(&self) -> &[NodeId] {
        &self.sinks
    }

    pub fn node(&self, id: NodeId) -> Result<&PlanNode> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| Error::Plan(format!("unknown node {id}")))
    }

    pub fn channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channels
            .get(id.index())
            .ok_or_else(|| Error::Plan(format!("unknown channel {id}")))
    }

    /// The node a channel reads from.
    pub fn channel_source(&self, id: ChannelId) -> Result<&PlanNode> {
        self.node(self.channel(id)?.source)
    }

    /// Walk the plan depth-first from every sink, in sink order.
    pub fn accept<V: PlanVisitor>(&self, visitor: &mut V) -> std::result::Result<(), V::Error> {
        for sink in &self.sinks {
            self.walk(sink.index(), visitor)?;
        }
        Ok(())
    }

    // Explicit stack of (node, next input slot); plans can be deeper than
    // the thread stack allows for recursion.
    fn walk<V: PlanVisitor>(&self, root: usize, visitor: &mut V) -> std::result::Result<(), V::Error> {
        let mut stack: Vec<(usize, usize)> = Vec::new();
        // Handles were checked at construction.
        if let Some(node) = self.nodes.get(root) {
            if visitor.pre_visit(self, node)? {
                stack.push((root, 0));
            }
        }
        while let Some(top) = stack.last_mut() {
            let (n, next) = *top;
            let node = &self.nodes[n];
            if next < node.inputs.len() {
                top.1 += 1;
                let child = self
                    .channels
                    .get(node.inputs[next].index())
                    .map(|c| c.source.index())
                    .and_then(|i| self.nodes.get(i).map(|child| (i, child)));
                if let Some((i, child)) = child {
                    if visitor.pre_visit(self, child)? {
                        stack.push((i, 0));
                    }
                }
            } else {
                stack.pop();
                visitor.post_visit(self, node)?;
            }
        }
        Ok(())
    }

    fn check_handles(&self) -> Result<()> {
        for (i, n) in self.nodes.iter().enumerate() {
            if n.id.index() != i {
                return Err(Error::Plan(format!("node {} stored at position {i}", n.id)));
            }
            for ch in n.inputs.iter().chain(n.outgoing.iter()) {
                if ch.index() >= self.channels.len() {
                    return Err(Error::Plan(format!("node {} references unknown channel {ch}", n.id)));
                }
            }
            for ch in &n.inputs {
                if self.channels[ch.index()].target != n.id {
                    return Err(Error::Plan(format!("input {ch} of node {} targets another node", n.id)));
                }
            }
            for ch in &n.outgoing {
                if self.channels[ch.index()].source != n.id {
                    return Err(Error::Plan(format!("outgoing {ch} of node {} starts at another node", n.id)));
                }
            }
        }
        for (i, c) in self.channels.iter().enumerate() {
            if c.id.index() != i {
                return Err(Error::Plan(format!("channel {} stored at position {i}", c.id)));
            }
            if c.source.index() >= self.nodes.len() || c.target.index() >= self.nodes.len() {
                return Err(Error::Plan(format!("channel {} has a dangling endpoint", c.id)));
            }
        }
        for s in &self.sinks {
            if s.index() >= self.nodes.len() {
                return Err(Error::Plan(format!("unknown sink {s}")));
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        // Iterative DFS so deep plans cannot overflow the stack here.
        let mut marks = vec![Mark::New; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::New {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Active;
            while let Some((n, next)) = stack.pop() {
                let inputs = &self.nodes[n].inputs;
                if next < inputs.len() {
                    stack.push((n, next + 1));
                    let child = self.channels[inputs[next].index()].source.index();
                    match marks[child] {
                        Mark::Active => {
                            return Err(Error::Plan(format!(
                                "cycle through node {}",
                                self.nodes[child].id
                            )))
                        }
                        Mark::New => {
                            marks[child] = Mark::Active;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[n] = Mark::Done;
                }
            }
        }
        Ok(())
    }
}

/// Incremental construction of an `OptimizedPlan`.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    job_name: String,
    config: Configuration,
    instance_type: Option<String>,
    nodes: Vec<PlanNode>,
    channels: Vec<Channel>,
}

impl PlanBuilder {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            ..Self::default()
        }
    }

    pub fn config(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    pub fn instance_type(mut self, name: impl Into<String>) -> Self {
        self.instance_type = Some(name.into());
        self
    }

    pub fn add(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u64);
        self.nodes.push(PlanNode {
            id,
            name: spec.name,
            kind: spec.kind,
            parallelism: spec.parallelism,
            subtasks_per_instance: spec.subtasks_per_instance,
            memory_per_subtask: spec.memory_per_subtask,
            user_code: spec.user_code,
            inputs: Vec::new(),
            outgoing: Vec::new(),
        });
        id
    }

    /// Add a channel `source -> target`; it becomes the next input slot of
    /// `target`.
    pub fn connect(&mut self, source: NodeId, target: NodeId, spec: ChannelSpec) -> Result<ChannelId> {
        if source.index() >= self.nodes.len() || target.index() >= self.nodes.len() {
            return Err(Error::Plan(format!("cannot connect {source} -> {target}: unknown node")));
        }
        if source == target {
            return Err(Error::Plan(format!("cannot connect {source} to itself")));
        }
        let id = ChannelId::new(self.channels.len() as u64);
        self.channels.push(Channel {
            id,
            source,
            target,
            ship_strategy: spec.ship_strategy,
            ship_comparator: spec.ship_comparator,
            local_strategy: spec.local_strategy,
            local_comparator: spec.local_comparator,
            serializer: spec.serializer,
            temp_mode: spec.temp_mode,
            temp_memory: spec.temp_memory,
            local_strategy_memory: spec.local_strategy_memory,
        });
        self.nodes[source.index()].outgoing.push(id);
        self.nodes[target.index()].inputs.push(id);
        Ok(id)
    }

    /// Validate arity and structure and freeze the plan. Sinks become the
    /// traversal roots in insertion order.
    pub fn build(self) -> Result<OptimizedPlan> {
        for n in &self.nodes {
            match n.kind.expected_inputs() {
                Some(expected) if n.inputs.len() != expected => {
                    return Err(Error::Plan(format!(
                        "{n} has {} inputs, expected {expected}",
                        n.inputs.len()
                    )));
                }
                None if n.inputs.is_empty() => {
                    return Err(Error::Plan(format!("{n} has no inputs")));
                }
                _ => {}
            }
            let driver = match n.kind {
                NodeKind::SingleInput { driver, .. } | NodeKind::DualInput { driver, .. } => Some(driver),
                _ => None,
            };
            if let Some(driver) = driver {
                if Some(driver.num_inputs()) != n.kind.expected_inputs() {
                    return Err(Error::Plan(format!(
                        "{n} runs {driver:?}, which takes {} inputs",
                        driver.num_inputs()
                    )));
                }
            }
            if n.parallelism == 0 {
                return Err(Error::Plan(format!("{n} has zero parallelism")));
            }
            if matches!(n.kind, NodeKind::Sink) && !n.outgoing.is_empty() {
                return Err(Error::Plan(format!("{n} has outgoing channels")));
            }
        }
        let sinks: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Sink))
            .map(|n| n.id)
            .collect();
        if sinks.is_empty() && !self.nodes.is_empty() {
            return Err(Error::Plan("plan has no sinks".to_string()));
        }
        OptimizedPlan::from_parts(
            self.job_name,
            self.config,
            self.instance_type,
            self.nodes,
            self.channels,
            sinks,
        )
    }
}
