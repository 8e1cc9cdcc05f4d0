//! Determinism, fan-out safety and node coverage

mod plan_fixtures;

use std::collections::HashSet;

use jobgen_compiler::{JobGraphGenerator, Placement};
use jobgen_core::job::JobGraph;
use jobgen_core::plan::{ChannelSpec, NodeSpec, OptimizedPlan, PlanBuilder};
use jobgen_core::strategy::{DriverStrategy, ShipStrategy};
use plan_fixtures::{cmp, compile, compile_with_report, record_ser, union_of};

/// source feeds two reducers that meet again in a join (a diamond), plus a
/// chainable map on a separate branch.
fn diamond() -> OptimizedPlan {
    let mut b = PlanBuilder::new("diamond").instance_type("standard");
    let src = b.add(NodeSpec::source("source", record_ser()).parallelism(4));
    let left = b.add(NodeSpec::single_input("left", DriverStrategy::SortedGroup).parallelism(4));
    let right = b.add(NodeSpec::single_input("right", DriverStrategy::SortedGroup).parallelism(4));
    let join = b.add(
        NodeSpec::dual_input("join", DriverStrategy::HybridHashBuildFirst)
            .parallelism(8)
            .memory(1 << 16),
    );
    let other = b.add(NodeSpec::source("other", record_ser()).parallelism(6));
    let map = b.add(NodeSpec::single_input("map", DriverStrategy::Map).parallelism(6));
    let sink = b.add(NodeSpec::sink("sink").parallelism(6));
    let side = b.add(NodeSpec::sink("side").parallelism(6));
    let hash = || ChannelSpec::new(ShipStrategy::PartitionHash, record_ser()).ship_comparator(cmp("Key"));
    b.connect(src, left, hash()).expect("connect");
    b.connect(src, right, hash()).expect("connect");
    b.connect(left, join, hash()).expect("connect");
    b.connect(right, join, hash()).expect("connect");
    b.connect(join, sink, ChannelSpec::forward(record_ser())).expect("connect");
    b.connect(other, map, ChannelSpec::forward(record_ser())).expect("connect");
    b.connect(map, side, ChannelSpec::forward(record_ser())).expect("connect");
    b.build().expect("build diamond")
}

fn edge_list(graph: &JobGraph) -> Vec<(u64, u64)> {
    graph
        .edges()
        .map(|e| (e.source.get(), e.target.get()))
        .collect()
}

#[test]
fn test_compiling_twice_is_structurally_identical() {
    let plan = diamond();
    let generator = JobGraphGenerator::new();
    let first = generator.compile(&plan).expect("first compile");
    let second = generator.compile(&plan).expect("second compile");

    assert_ne!(first.id(), second.id(), "job ids are fresh per graph");
    assert_eq!(
        first.fingerprint().expect("hash"),
        second.fingerprint().expect("hash")
    );
    assert_eq!(edge_list(&first), edge_list(&second));
    assert_eq!(first.vertices(), second.vertices());
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_different_plans_have_different_fingerprints() {
    let a = compile(&diamond());
    let b = compile(&union_of(&["S", "S"], ChannelSpec::forward(plan_fixtures::ser("S"))).plan);
    assert_ne!(a.fingerprint().expect("hash"), b.fingerprint().expect("hash"));
}

#[test]
fn test_fan_out_materializes_once() {
    let plan = diamond();
    let (graph, report) = compile_with_report(&plan);

    let sources: Vec<_> = graph
        .vertices()
        .iter()
        .filter(|v| v.name == "source")
        .collect();
    assert_eq!(sources.len(), 1, "shared predecessor materialized once");
    let source = sources[0];
    assert_eq!(source.connections.len(), 2);
    let targets: HashSet<_> = source.connections.iter().map(|c| c.target).collect();
    assert_eq!(targets.len(), 2);

    let join = graph.vertex_by_name("join").expect("join");
    let join_sources: HashSet<_> = graph.incoming(join.id).iter().map(|e| e.source).collect();
    let left = graph.vertex_by_name("left").expect("left").id;
    let right = graph.vertex_by_name("right").expect("right").id;
    assert_eq!(join_sources, HashSet::from([left, right]));
    assert_eq!(report.anchor, Some(join.id));
}

#[test]
fn test_every_node_has_exactly_one_placement() {
    let plan = diamond();
    let (graph, report) = compile_with_report(&plan);

    let mut vertex_owners = HashSet::new();
    for node in plan.nodes() {
        match report.placement(node.id).expect("every node is placed") {
            Placement::Vertex(v) => {
                assert!(vertex_owners.insert(v), "vertex {v} owned by two nodes");
                assert_eq!(graph.vertex(v).expect("vertex").name, node.name);
            }
            Placement::Chained { host, position } => {
                let task = &graph.vertex(host).expect("host").config.chained_tasks()[position];
                assert_eq!(task.name, node.name);
            }
            Placement::Spliced => assert!(node.is_union()),
        }
    }
    assert_eq!(vertex_owners.len(), graph.len());
    assert_eq!(report.chained_count(), 1);

    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["placements"].as_object().map(|m| m.len()), Some(plan.nodes().len()));
}

#[test]
fn test_every_vertex_flattens() {
    let graph = compile(&diamond());
    for v in graph.vertices() {
        let kv = v.config.to_configuration().expect("flatten");
        assert_eq!(
            kv.get_integer("out.num", -1),
            v.config.num_outputs() as i64,
            "{}",
            v.name
        );
    }
}
