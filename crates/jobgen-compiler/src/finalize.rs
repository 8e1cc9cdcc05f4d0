//! Graph finalization: chain appends, instance type and instance sharing.

use jobgen_core::job::JobGraph;
use jobgen_core::plan::OptimizedPlan;

use crate::chaining::append_chains_to_hosts;
use crate::context::CompileContext;
use crate::error::{CompileError, GenerationError};
use crate::report::{CompileReport, Diagnostic, Placement};

/// Seal the graph built by the traversal.
///
/// Chains are appended to their hosts in resolution order. The anchor gets
/// the plan's instance type and every other vertex shares instances with it.
pub(crate) fn finalize(plan: &OptimizedPlan, ctx: CompileContext) -> Result<(JobGraph, CompileReport), CompileError> {
    let parts = ctx.into_parts();
    let mut graph = parts.graph;
    let anchor = parts.anchor.ok_or(CompileError::EmptyPlan)?;

    let chain_positions =
        append_chains_to_hosts(&mut graph, parts.records, &parts.sequence).map_err(CompileError::Finalize)?;

    let mut report = CompileReport {
        anchor: Some(anchor),
        ..CompileReport::default()
    };

    match plan.instance_type() {
        Some(instance_type) => {
            graph
                .vertex_mut(anchor)
                .map_err(|e| CompileError::Finalize(e.into()))?
                .instance_type = Some(instance_type.to_string());
        }
        None => {
            #[cfg(feature = "tracing")]
            tracing::warn!(job = graph.name(), anchor = %anchor, "no instance type set for the job");
            report.diagnostics.push(Diagnostic::MissingInstanceType { anchor });
        }
    }

    let others: Vec<_> = graph.vertex_ids().filter(|v| *v != anchor).collect();
    for id in others {
        graph
            .vertex_mut(id)
            .map_err(|e| CompileError::Finalize(e.into()))?
            .share_instances_with = anchor;
    }

    for node in plan.nodes() {
        let placement = if let Some(vertex) = parts.vertices.get(&node.id) {
            Placement::Vertex(*vertex)
        } else if let Some(chain) = parts.chains.get(&node.id) {
            let (host, position) = chain_positions.get(chain).copied().ok_or_else(|| {
                CompileError::Finalize(GenerationError::contract(format!("{node} was chained but never placed")))
            })?;
            Placement::Chained { host, position }
        } else if node.is_union() {
            Placement::Spliced
        } else {
            // Not reachable from any sink.
            continue;
        };
        report.placements.insert(node.id, placement);
    }

    #[cfg(feature = "tracing")]
    tracing::info!(
        job = graph.name(),
        vertices = graph.len(),
        chained = chain_positions.len(),
        anchor = %anchor,
        "job graph compiled"
    );
    Ok((graph, report))
}
