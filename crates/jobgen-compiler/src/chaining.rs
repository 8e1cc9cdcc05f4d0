//! Chaining: fusing a single-input operator into its producer's thread.
//!
//! Eligibility is decided in pre-visit, before any vertex exists for the
//! node. The host is bound in the node's post-visit, and the chain
//! descriptors are appended to their hosts during finalization in the order
//! the chains were resolved.

use std::collections::HashMap;
use std::fmt;

use jobgen_core::id::{ChainId, VertexId};
use jobgen_core::job::JobGraph;
use jobgen_core::plan::{OptimizedPlan, PlanNode};
use jobgen_core::strategy::{DriverStrategy, LocalStrategy, ShipStrategy};

use crate::context::{ChainRecord, CompileContext};
use crate::error::GenerationError;

/// The first condition that keeps a single-input node from being chained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainBlocker {
    /// The driver has no push-based variant.
    NoPushDriver(DriverStrategy),
    PredecessorIsUnion,
    ShipStrategy(ShipStrategy),
    LocalStrategy(LocalStrategy),
    /// The predecessor feeds more than one consumer.
    PredecessorFanOut(usize),
    ParallelismMismatch { node: u32, predecessor: u32 },
    SubtasksPerInstanceMismatch {
        node: Option<u32>,
        predecessor: Option<u32>,
    },
}

impl fmt::Display for ChainBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainBlocker::NoPushDriver(d) => write!(f, "driver {d} cannot be chained"),
            ChainBlocker::PredecessorIsUnion => f.write_str("predecessor is a union"),
            ChainBlocker::ShipStrategy(s) => write!(f, "ship strategy {s}"),
            ChainBlocker::LocalStrategy(s) => write!(f, "local strategy {s}"),
            ChainBlocker::PredecessorFanOut(n) => write!(f, "predecessor has {n} consumers"),
            ChainBlocker::ParallelismMismatch { node, predecessor } => {
                write!(f, "parallelism {node} vs {predecessor}")
            }
            ChainBlocker::SubtasksPerInstanceMismatch { node, predecessor } => {
                write!(f, "subtasks per instance {node:?} vs {predecessor:?}")
            }
        }
    }
}

/// Why `node` (driven by `driver`) cannot be chained, or `None` if it can.
pub fn chaining_blocker(
    plan: &OptimizedPlan,
    node: &PlanNode,
    driver: DriverStrategy,
) -> Result<Option<ChainBlocker>, GenerationError> {
    if driver.push_chain_driver_id().is_none() {
        return Ok(Some(ChainBlocker::NoPushDriver(driver)));
    }
    let input = node
        .inputs
        .first()
        .ok_or_else(|| GenerationError::contract(format!("{node} has no input channel")))?;
    let channel = plan.channel(*input)?;
    let pred = plan.node(channel.source)?;

    let blocker = if pred.is_union() {
        Some(ChainBlocker::PredecessorIsUnion)
    } else if channel.ship_strategy != ShipStrategy::Forward {
        Some(ChainBlocker::ShipStrategy(channel.ship_strategy))
    } else if channel.local_strategy != LocalStrategy::None {
        Some(ChainBlocker::LocalStrategy(channel.local_strategy))
    } else if pred.outgoing.len() != 1 {
        Some(ChainBlocker::PredecessorFanOut(pred.outgoing.len()))
    } else if node.parallelism != pred.parallelism {
        Some(ChainBlocker::ParallelismMismatch {
            node: node.parallelism,
            predecessor: pred.parallelism,
        })
    } else if node.subtasks_per_instance != pred.subtasks_per_instance {
        Some(ChainBlocker::SubtasksPerInstanceMismatch {
            node: node.subtasks_per_instance,
            predecessor: pred.subtasks_per_instance,
        })
    } else {
        None
    };
    Ok(blocker)
}

pub fn can_chain(plan: &OptimizedPlan, node: &PlanNode, driver: DriverStrategy) -> Result<bool, GenerationError> {
    Ok(chaining_blocker(plan, node, driver)?.is_none())
}

/// Bind a chained node to its host vertex and record its input serializer.
///
/// The preconditions re-checked here held at eligibility time; failing them
/// now means the plan is malformed.
pub(crate) fn resolve_chained_node(
    ctx: &mut CompileContext,
    plan: &OptimizedPlan,
    node: &PlanNode,
    chain: ChainId,
) -> Result<VertexId, GenerationError> {
    if node.inputs.len() != 1 {
        return Err(GenerationError::contract(format!(
            "chained {node} has {} input channels",
            node.inputs.len()
        )));
    }
    let channel = plan.channel(node.inputs[0])?;
    if channel.local_strategy != LocalStrategy::None {
        return Err(GenerationError::contract(format!(
            "chained {node} has local strategy {} on its input",
            channel.local_strategy
        )));
    }
    if channel.ship_strategy != ShipStrategy::Forward {
        return Err(GenerationError::contract(format!(
            "chained {node} is fed by ship strategy {}",
            channel.ship_strategy
        )));
    }

    let pred = channel.source;
    let host = if let Some(vertex) = ctx.vertex_of(pred) {
        // Entry point of the chain in the producer's output list.
        ctx.graph
            .vertex_mut(vertex)?
            .config
            .add_output_ship_strategy(ShipStrategy::Forward);
        vertex
    } else if let Some(pred_chain) = ctx.chain_of(pred) {
        ctx.chain(pred_chain)?.host.ok_or_else(|| {
            GenerationError::contract(format!(
                "predecessor of chained {node} is chained but has no containing vertex"
            ))
        })?
    } else {
        return Err(GenerationError::contract(format!(
            "predecessor {pred} of chained {node} was not translated"
        )));
    };

    let record = ctx.chain_mut(chain)?;
    if record.host.is_some() {
        return Err(GenerationError::contract(format!("chain of {node} resolved twice")));
    }
    record.host = Some(host);
    record.config.set_input_serializer(channel.serializer.clone(), 0);
    ctx.push_resolved_chain(chain);

    #[cfg(feature = "tracing")]
    tracing::debug!(node = %node.id, chain = %chain, host = %host, "chain resolved");
    Ok(host)
}

/// Append every resolved chain to its host in resolution order. Returns the
/// host and position of each chain.
pub(crate) fn append_chains_to_hosts(
    graph: &mut JobGraph,
    records: Vec<ChainRecord>,
    sequence: &[ChainId],
) -> Result<HashMap<ChainId, (VertexId, usize)>, GenerationError> {
    let mut pending: Vec<Option<ChainRecord>> = records.into_iter().map(Some).collect();
    let mut placed = HashMap::with_capacity(sequence.len());

    for &id in sequence {
        let record = pending
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| GenerationError::contract(format!("chain {id} appended twice or unknown")))?;
        let host = record
            .host
            .ok_or_else(|| GenerationError::contract(format!("chain '{}' has no containing vertex", record.name)))?;
        let config = &mut graph.vertex_mut(host)?.config;
        config.add_chained_task(record.driver, record.config, record.name);
        placed.insert(id, (host, config.chained_tasks().len() - 1));
    }

    if let Some(orphan) = pending.into_iter().flatten().next() {
        return Err(GenerationError::contract(format!(
            "chain '{}' was never resolved",
            orphan.name
        )));
    }
    Ok(placed)
}
