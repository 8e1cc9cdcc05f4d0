//! Plan builders shared by the integration tests.

#![allow(dead_code)]

use jobgen_compiler::{CompileReport, JobGraphGenerator};
use jobgen_core::descriptor::{ComparatorDescriptor, SerializerDescriptor};
use jobgen_core::id::NodeId;
use jobgen_core::job::JobGraph;
use jobgen_core::plan::{ChannelSpec, NodeSpec, OptimizedPlan, PlanBuilder};
use jobgen_core::strategy::{DriverStrategy, ShipStrategy};

pub fn ser(class: &str) -> SerializerDescriptor {
    SerializerDescriptor::new(class)
}

pub fn cmp(class: &str) -> ComparatorDescriptor {
    ComparatorDescriptor::new(class).with_param("keys", "0")
}

pub fn record_ser() -> SerializerDescriptor {
    ser("RecordSerializer")
}

/// `source -> op -> sink`.
pub struct Linear {
    pub plan: OptimizedPlan,
    pub source: NodeId,
    pub op: NodeId,
    pub sink: NodeId,
}

/// Knobs of the linear plan; the defaults describe a chainable map.
#[derive(Clone)]
pub struct LinearOpts {
    pub driver: DriverStrategy,
    pub source_dop: u32,
    pub op_dop: u32,
    pub sink_dop: u32,
    pub ship: ShipStrategy,
    pub instance_type: Option<&'static str>,
}

impl Default for LinearOpts {
    fn default() -> Self {
        Self {
            driver: DriverStrategy::Map,
            source_dop: 4,
            op_dop: 4,
            sink_dop: 4,
            ship: ShipStrategy::Forward,
            instance_type: Some("standard"),
        }
    }
}

pub fn linear(opts: LinearOpts) -> Linear {
    let mut b = PlanBuilder::new("linear");
    if let Some(it) = opts.instance_type {
        b = b.instance_type(it);
    }
    let source = b.add(NodeSpec::source("source", record_ser()).parallelism(opts.source_dop));
    let op = b.add(
        NodeSpec::single_input("op", opts.driver)
            .parallelism(opts.op_dop)
            .comparator(cmp("OpKeyComparator")),
    );
    let sink = b.add(NodeSpec::sink("sink").parallelism(opts.sink_dop));
    b.connect(source, op, ChannelSpec::new(opts.ship, record_ser()))
        .expect("connect source");
    b.connect(op, sink, ChannelSpec::forward(record_ser()))
        .expect("connect sink");
    Linear {
        plan: b.build().expect("build linear plan"),
        source,
        op,
        sink,
    }
}

/// `k` sources with the given serializers, unioned into a sorted-group
/// operator (which never chains), then a sink.
pub struct UnionPlan {
    pub plan: OptimizedPlan,
    pub sources: Vec<NodeId>,
    pub union: NodeId,
    pub op: NodeId,
    pub sink: NodeId,
}

pub fn union_of(serializers: &[&str], consumer: ChannelSpec) -> UnionPlan {
    let mut b = PlanBuilder::new("union").instance_type("standard");
    let union = b.add(NodeSpec::union("union"));
    let sources: Vec<NodeId> = serializers
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let id = b.add(NodeSpec::source(format!("source{i}"), ser(s)));
            b.connect(id, union, ChannelSpec::new(ShipStrategy::PartitionHash, ser(s)))
                .expect("connect branch");
            id
        })
        .collect();
    let op = b.add(NodeSpec::single_input("op", DriverStrategy::SortedGroup));
    let sink = b.add(NodeSpec::sink("sink"));
    b.connect(union, op, consumer).expect("connect union");
    b.connect(op, sink, ChannelSpec::forward(record_ser()))
        .expect("connect sink");
    UnionPlan {
        plan: b.build().expect("build union plan"),
        sources,
        union,
        op,
        sink,
    }
}

pub fn compile(plan: &OptimizedPlan) -> JobGraph {
    JobGraphGenerator::new().compile(plan).expect("compile")
}

pub fn compile_with_report(plan: &OptimizedPlan) -> (JobGraph, CompileReport) {
    JobGraphGenerator::new()
        .compile_with_report(plan)
        .expect("compile")
}
