//! The depth-first translation pass.
//!
//! `Translator` is the `PlanVisitor` driven by `OptimizedPlan::accept`.
//! Pre-visit materializes a node, post-visit wires its inputs once all of its
//! predecessors are fully resolved. Every step failure is wrapped with the
//! node being processed at this boundary.

use jobgen_core::config::GeneratorConfig;
use jobgen_core::plan::{Channel, OptimizedPlan, PlanNode, PlanVisitor};

use crate::chaining::resolve_chained_node;
use crate::context::CompileContext;
use crate::error::{CompileError, GenerationError, VisitPhase};
use crate::materialize::{materialize, Materialized};
use crate::wiring::{add_local_info, connect_job_vertices};

pub(crate) struct Translator<'a> {
    ctx: CompileContext,
    defaults: &'a GeneratorConfig,
}

impl<'a> Translator<'a> {
    pub fn new(plan: &OptimizedPlan, defaults: &'a GeneratorConfig) -> Self {
        Self {
            ctx: CompileContext::new(plan),
            defaults,
        }
    }

    pub fn into_context(self) -> CompileContext {
        self.ctx
    }

    fn translate(&mut self, plan: &OptimizedPlan, node: &PlanNode) -> Result<(), GenerationError> {
        match materialize(&mut self.ctx, self.defaults, plan, node)? {
            Materialized::Vertex(id) => {
                let vertex = self.ctx.graph.vertex_mut(id)?;
                vertex.parallelism = node.parallelism;
                vertex.subtasks_per_instance = node.subtasks_per_instance.filter(|n| *n >= 1);
                self.ctx.register_vertex(node.id, id);
                let _anchored = self.ctx.offer_anchor(id, node.parallelism);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    node = %node.id,
                    vertex = %id,
                    dop = node.parallelism,
                    anchor = _anchored,
                    "vertex materialized"
                );
            }
            Materialized::Chain(record) => {
                let _chain = self.ctx.register_chain(node.id, record);

                #[cfg(feature = "tracing")]
                tracing::debug!(node = %node.id, chain = %_chain, "node chained");
            }
            Materialized::Spliced => {}
        }
        Ok(())
    }

    fn wire(&mut self, plan: &OptimizedPlan, node: &PlanNode) -> Result<(), GenerationError> {
        if node.is_union() || node.inputs.is_empty() {
            return Ok(());
        }
        if let Some(chain) = self.ctx.chain_of(node.id) {
            resolve_chained_node(&mut self.ctx, plan, node, chain)?;
            return Ok(());
        }
        let target = self
            .ctx
            .vertex_of(node.id)
            .ok_or_else(|| GenerationError::contract(format!("{node} has no vertex at wiring time")))?;

        for (input, channel_id) in node.inputs.iter().enumerate() {
            let channel = plan.channel(*channel_id)?;
            let branches = expand_union_inputs(plan, channel)?;
            if branches.is_empty() {
                return Err(GenerationError::contract(format!(
                    "input {input} of {node} is a union without inputs"
                )));
            }
            check_serializers(&branches)?;

            for branch in &branches {
                let source = self.ctx.resolve_source(branch.source)?;
                connect_job_vertices(&mut self.ctx, branch, source, target, input)?;
            }

            let config = &mut self.ctx.graph.vertex_mut(target)?.config;
            add_local_info(config, self.defaults, channel, input);
        }
        Ok(())
    }
}

impl PlanVisitor for Translator<'_> {
    type Error = CompileError;

    fn pre_visit(&mut self, plan: &OptimizedPlan, node: &PlanNode) -> Result<bool, CompileError> {
        // Reached again through fan-out: everything below is already done.
        if self.ctx.is_translated(node.id) {
            return Ok(false);
        }
        self.translate(plan, node)
            .map_err(|e| CompileError::translation(node, VisitPhase::Materialize, e))?;
        Ok(true)
    }

    fn post_visit(&mut self, plan: &OptimizedPlan, node: &PlanNode) -> Result<(), CompileError> {
        self.wire(plan, node)
            .map_err(|e| CompileError::translation(node, VisitPhase::Wire, e))
    }
}

/// The physical channels behind one consumer input: the input itself, or
/// every input of the union feeding it, flattened through nested unions.
pub(crate) fn expand_union_inputs<'p>(
    plan: &'p OptimizedPlan,
    channel: &'p Channel,
) -> Result<Vec<&'p Channel>, GenerationError> {
    let mut out = Vec::new();
    let mut stack = vec![channel];
    while let Some(ch) = stack.pop() {
        let source = plan.node(ch.source)?;
        if source.is_union() {
            // Reverse so branches come out in input order.
            for id in source.inputs.iter().rev() {
                stack.push(plan.channel(*id)?);
            }
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

fn check_serializers(branches: &[&Channel]) -> Result<(), GenerationError> {
    let Some((first, rest)) = branches.split_first() else {
        return Ok(());
    };
    match rest.iter().find(|c| c.serializer != first.serializer) {
        Some(other) => Err(GenerationError::SerializerMismatch {
            expected: first.serializer.clone(),
            found: other.serializer.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgen_core::descriptor::SerializerDescriptor;
    use jobgen_core::id::{ChannelId, NodeId};
    use jobgen_core::plan::{ChannelSpec, NodeSpec, PlanBuilder};
    use jobgen_core::strategy::{DriverStrategy, LocalStrategy, ShipStrategy, TempMode};

    fn ser(name: &str) -> SerializerDescriptor {
        SerializerDescriptor::new(name)
    }

    #[test]
    fn nested_unions_flatten_in_input_order() {
        let mut b = PlanBuilder::new("job");
        let s1 = b.add(NodeSpec::source("s1", ser("S")));
        let s2 = b.add(NodeSpec::source("s2", ser("S")));
        let s3 = b.add(NodeSpec::source("s3", ser("S")));
        let inner = b.add(NodeSpec::union("inner"));
        let outer = b.add(NodeSpec::union("outer"));
        let op = b.add(NodeSpec::single_input("op", DriverStrategy::SortedGroup));
        let sink = b.add(NodeSpec::sink("sink"));
        b.connect(s1, inner, ChannelSpec::forward(ser("S"))).expect("connect");
        b.connect(s2, inner, ChannelSpec::forward(ser("S"))).expect("connect");
        b.connect(inner, outer, ChannelSpec::forward(ser("S"))).expect("connect");
        b.connect(s3, outer, ChannelSpec::forward(ser("S"))).expect("connect");
        let top = b.connect(outer, op, ChannelSpec::forward(ser("S"))).expect("connect");
        b.connect(op, sink, ChannelSpec::forward(ser("S"))).expect("connect");
        let plan = b.build().expect("build");

        let channel = plan.channel(top).expect("channel");
        let sources: Vec<_> = expand_union_inputs(&plan, channel)
            .expect("expand")
            .into_iter()
            .map(|c| c.source)
            .collect();
        assert_eq!(sources, vec![s1, s2, s3]);
    }

    #[test]
    fn serializer_check_reports_first_difference() {
        let a = Channel {
            id: ChannelId::new(0),
            source: NodeId::new(0),
            target: NodeId::new(2),
            ship_strategy: ShipStrategy::Forward,
            ship_comparator: None,
            local_strategy: LocalStrategy::None,
            local_comparator: None,
            serializer: ser("A"),
            temp_mode: TempMode::None,
            temp_memory: 0,
            local_strategy_memory: 0,
        };
        let b = Channel {
            id: ChannelId::new(1),
            source: NodeId::new(1),
            serializer: ser("B"),
            ..a.clone()
        };
        assert!(check_serializers(&[&a, &a]).is_ok());
        match check_serializers(&[&a, &a, &b]) {
            Err(GenerationError::SerializerMismatch { expected, found }) => {
                assert_eq!(expected.class, "A");
                assert_eq!(found.class, "B");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
