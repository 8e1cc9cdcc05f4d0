//! Vertex materialization: one plan node becomes a vertex, a chain record or
//! nothing at all.

use jobgen_core::config::GeneratorConfig;
use jobgen_core::descriptor::{ComparatorDescriptor, PairComparatorDescriptor, SerializerDescriptor};
use jobgen_core::id::VertexId;
use jobgen_core::job::{TaskClass, VertexKind};
use jobgen_core::plan::{NodeKind, OptimizedPlan, PlanNode};
use jobgen_core::strategy::DriverStrategy;
use jobgen_core::task_config::TaskConfig;

use crate::chaining::chaining_blocker;
use crate::context::{ChainRecord, CompileContext};
use crate::error::GenerationError;
use crate::resources::assign_driver_resources;

/// Outcome of materializing one plan node.
#[derive(Debug)]
pub(crate) enum Materialized {
    Vertex(VertexId),
    /// Fused into a host that is bound later, in post-visit.
    Chain(ChainRecord),
    /// Unions splice their inputs into the consumer.
    Spliced,
}

pub(crate) fn materialize(
    ctx: &mut CompileContext,
    defaults: &GeneratorConfig,
    plan: &OptimizedPlan,
    node: &PlanNode,
) -> Result<Materialized, GenerationError> {
    match &node.kind {
        NodeKind::Source { serializer } => create_source_vertex(ctx, node, serializer).map(Materialized::Vertex),
        NodeKind::Sink => create_sink_vertex(ctx, node).map(Materialized::Vertex),
        NodeKind::SingleInput { driver, comparator } => {
            create_single_input(ctx, defaults, plan, node, *driver, comparator.as_ref())
        }
        NodeKind::DualInput {
            driver,
            comparator1,
            comparator2,
            pair_comparator,
        } => create_dual_input(
            ctx,
            defaults,
            node,
            *driver,
            [comparator1.as_ref(), comparator2.as_ref()],
            pair_comparator.as_ref(),
        )
        .map(Materialized::Vertex),
        NodeKind::Union => Ok(Materialized::Spliced),
    }
}

fn create_source_vertex(
    ctx: &mut CompileContext,
    node: &PlanNode,
    serializer: &SerializerDescriptor,
) -> Result<VertexId, GenerationError> {
    let id = ctx
        .graph
        .add_vertex(node.name.clone(), VertexKind::Input, TaskClass::DataSourceTask);
    let config = &mut ctx.graph.vertex_mut(id)?.config;
    config.set_user_code(node.user_code.clone());
    config.set_output_serializer(serializer.clone());
    Ok(id)
}

fn create_sink_vertex(ctx: &mut CompileContext, node: &PlanNode) -> Result<VertexId, GenerationError> {
    let id = ctx
        .graph
        .add_vertex(node.name.clone(), VertexKind::Output, TaskClass::DataSinkTask);
    let config = &mut ctx.graph.vertex_mut(id)?.config;
    config.set_user_code(node.user_code.clone());
    config.set_sink_parallelism(node.parallelism);
    Ok(id)
}

fn create_single_input(
    ctx: &mut CompileContext,
    defaults: &GeneratorConfig,
    plan: &OptimizedPlan,
    node: &PlanNode,
    driver: DriverStrategy,
    comparator: Option<&ComparatorDescriptor>,
) -> Result<Materialized, GenerationError> {
    let blocker = chaining_blocker(plan, node, driver)?;
    if let (None, Some(chain_driver)) = (blocker, driver.push_chain_driver_id()) {
        // The chain driver class lives on the record, not in the config.
        let mut config = TaskConfig::new();
        config.set_user_code(node.user_code.clone());
        config.set_driver_strategy(driver);
        if let Some(c) = comparator {
            config.set_driver_comparator(c.clone(), 0);
        }
        assign_driver_resources(&mut config, defaults, node.memory_per_subtask);
        return Ok(Materialized::Chain(ChainRecord {
            driver: chain_driver,
            config,
            name: node.name.clone(),
            host: None,
        }));
    }

    #[cfg(feature = "tracing")]
    {
        if let Some(reason) = blocker {
            tracing::trace!(node = %node.id, %reason, "not chained");
        }
    }

    let driver_id = driver
        .driver_id()
        .ok_or_else(|| GenerationError::contract(format!("{node} has no driver strategy")))?;
    let id = ctx
        .graph
        .add_vertex(node.name.clone(), VertexKind::Task, TaskClass::RegularTask);
    let config = &mut ctx.graph.vertex_mut(id)?.config;
    config.set_user_code(node.user_code.clone());
    config.set_driver(driver_id);
    config.set_driver_strategy(driver);
    if let Some(c) = comparator {
        config.set_driver_comparator(c.clone(), 0);
    }
    assign_driver_resources(config, defaults, node.memory_per_subtask);
    Ok(Materialized::Vertex(id))
}

fn create_dual_input(
    ctx: &mut CompileContext,
    defaults: &GeneratorConfig,
    node: &PlanNode,
    driver: DriverStrategy,
    comparators: [Option<&ComparatorDescriptor>; 2],
    pair_comparator: Option<&PairComparatorDescriptor>,
) -> Result<VertexId, GenerationError> {
    let driver_id = driver
        .driver_id()
        .ok_or_else(|| GenerationError::contract(format!("{node} has no driver strategy")))?;
    let id = ctx
        .graph
        .add_vertex(node.name.clone(), VertexKind::Task, TaskClass::RegularTask);
    let config = &mut ctx.graph.vertex_mut(id)?.config;
    config.set_user_code(node.user_code.clone());
    config.set_driver(driver_id);
    config.set_driver_strategy(driver);
    for (input, c) in comparators.into_iter().enumerate() {
        if let Some(c) = c {
            config.set_driver_comparator(c.clone(), input);
        }
    }
    if let Some(pc) = pair_comparator {
        config.set_driver_pair_comparator(pc.clone());
    }
    assign_driver_resources(config, defaults, node.memory_per_subtask);
    Ok(id)
}
