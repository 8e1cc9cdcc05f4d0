//! End-to-end compilation scenarios

mod plan_fixtures;

use jobgen_compiler::{CompileError, JobGraphGenerator, Placement, VisitPhase};
use jobgen_core::config::Configuration;
use jobgen_core::descriptor::{PairComparatorDescriptor, UserCode};
use jobgen_core::job::{ChannelType, DistributionPattern, TaskClass, VertexKind};
use jobgen_core::plan::{ChannelSpec, NodeSpec, PlanBuilder};
use jobgen_core::strategy::{DriverStrategy, LocalStrategy, ShipStrategy};
use plan_fixtures::{cmp, compile, compile_with_report, linear, record_ser, ser, union_of, LinearOpts};

#[test]
fn test_chainable_map_is_fused_into_source() {
    let l = linear(LinearOpts::default());
    let (graph, report) = compile_with_report(&l.plan);

    assert_eq!(graph.len(), 2, "map should not get its own vertex");
    assert_eq!(report.chained_count(), 1);

    let source = graph.vertex_by_name("source").expect("source vertex");
    let sink = graph.vertex_by_name("sink").expect("sink vertex");
    assert_eq!(report.placement(l.source), Some(Placement::Vertex(source.id)));
    assert_eq!(report.placement(l.sink), Some(Placement::Vertex(sink.id)));
    assert_eq!(
        report.placement(l.op),
        Some(Placement::Chained {
            host: source.id,
            position: 0
        })
    );

    // One Forward entry marks the chain's entry point.
    assert_eq!(source.config.num_outputs(), 1);
    assert_eq!(source.config.outputs()[0].ship_strategy, ShipStrategy::Forward);

    let chained = source.config.chained_tasks();
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].driver, "ChainedMapDriver");
    assert_eq!(chained[0].name, "op");
    let cfg = &chained[0].config;
    assert!(cfg.driver().is_none(), "driver class lives on the chain descriptor");
    assert_eq!(cfg.driver_strategy(), Some(DriverStrategy::Map));
    assert_eq!(cfg.user_code().map(|u| u.class.as_str()), Some("opStub"));
    assert_eq!(
        cfg.driver_comparator(0).map(|c| c.class.as_str()),
        Some("OpKeyComparator")
    );
    assert_eq!(
        cfg.input(0).and_then(|i| i.serializer.as_ref()),
        Some(&record_ser())
    );
    // The chain's own output is the wire to the sink.
    assert_eq!(cfg.num_outputs(), 1);
    assert_eq!(cfg.output_serializer(), Some(&record_ser()));

    let edges: Vec<_> = graph.edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].source, source.id);
    assert_eq!(edges[0].target, sink.id);
    assert_eq!(edges[0].channel_type, ChannelType::InMemory);
    assert_eq!(edges[0].pattern, DistributionPattern::Pointwise);
    assert_eq!(sink.config.input(0).map(|i| i.group_size), Some(1));
}

#[test]
fn test_non_chainable_operator_gets_its_own_vertex() {
    let l = linear(LinearOpts {
        driver: DriverStrategy::SortedGroup,
        ..LinearOpts::default()
    });
    let (graph, report) = compile_with_report(&l.plan);

    assert_eq!(graph.len(), 3);
    assert_eq!(report.chained_count(), 0);
    let edges: Vec<_> = graph.edges().collect();
    assert_eq!(edges.len(), 2);
    for e in &edges {
        assert_eq!(e.channel_type, ChannelType::InMemory);
        assert_eq!(e.pattern, DistributionPattern::Pointwise);
    }

    let op = graph.vertex_by_name("op").expect("op vertex");
    assert_eq!(op.kind, VertexKind::Task);
    assert_eq!(op.task_class, TaskClass::RegularTask);
    assert_eq!(op.config.driver(), Some("ReduceDriver"));
    assert_eq!(op.config.driver_strategy(), Some(DriverStrategy::SortedGroup));
    assert!(op.config.chained_tasks().is_empty());
    assert!(graph
        .vertices()
        .iter()
        .all(|v| v.config.chained_tasks().is_empty()));
}

#[test]
fn test_union_with_mismatched_serializers_fails() {
    let u = union_of(&["SerA", "SerB"], ChannelSpec::forward(ser("SerA")));
    let err = JobGraphGenerator::new()
        .compile(&u.plan)
        .expect_err("mismatched serializers must fail");

    match &err {
        CompileError::Translation {
            node_id,
            phase,
            cause,
            ..
        } => {
            assert_eq!(*node_id, u.op);
            assert_eq!(*phase, VisitPhase::Wire);
            assert!(cause.is_serializer_mismatch(), "unexpected cause: {cause}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("'op'"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_vertices_carry_plan_attributes() {
    let mut plan_config = Configuration::new();
    plan_config.set("app.retries", 3i64);
    let mut params = Configuration::new();
    params.set("path", "/data/in");

    let mut b = PlanBuilder::new("attrs").config(plan_config).instance_type("large");
    let source = b.add(
        NodeSpec::source("reader", record_ser())
            .parallelism(2)
            .subtasks_per_instance(2)
            .user_code(UserCode::new("FileReader").with_parameters(params)),
    );
    let sink = b.add(NodeSpec::sink("writer").parallelism(3));
    b.connect(source, sink, ChannelSpec::new(ShipStrategy::PartitionRandom, record_ser()))
        .expect("connect");
    let plan = b.build().expect("build");
    let graph = compile(&plan);

    assert_eq!(graph.name(), "attrs");
    assert_eq!(graph.config().get_integer("app.retries", 0), 3);

    let reader = graph.vertex_by_name("reader").expect("reader");
    assert_eq!(reader.kind, VertexKind::Input);
    assert_eq!(reader.task_class, TaskClass::DataSourceTask);
    assert_eq!(reader.parallelism, 2);
    assert_eq!(reader.subtasks_per_instance, Some(2));
    let uc = reader.config.user_code().expect("user code");
    assert_eq!(uc.class, "FileReader");
    assert_eq!(uc.parameters.get_string("path"), Some("/data/in"));

    let writer = graph.vertex_by_name("writer").expect("writer");
    assert_eq!(writer.kind, VertexKind::Output);
    assert_eq!(writer.task_class, TaskClass::DataSinkTask);
    assert_eq!(writer.parallelism, 3);
    assert_eq!(writer.subtasks_per_instance, None);
    assert_eq!(writer.config.sink_parallelism(), Some(3));

    let kv = writer.config.to_configuration().expect("flatten sink");
    assert_eq!(kv.get_integer("sink.dop", 0), 3);
    assert_eq!(kv.get_integer("in.num", 0), 1);
    let kv = reader.config.to_configuration().expect("flatten source");
    assert_eq!(kv.get_string("stub.class"), Some("FileReader"));
    assert_eq!(kv.get_string("stub.param.path"), Some("/data/in"));
    assert_eq!(kv.get_string("out.0.ship-strategy"), Some("PARTITION_RANDOM"));
}

#[test]
fn test_join_vertex_configuration() {
    let mut b = PlanBuilder::new("join").instance_type("standard");
    let left = b.add(NodeSpec::source("left", ser("LeftSer")).parallelism(2));
    let right = b.add(NodeSpec::source("right", ser("RightSer")).parallelism(2));
    let join = b.add(
        NodeSpec::dual_input("join", DriverStrategy::Merge)
            .parallelism(2)
            .memory(1 << 20)
            .comparator(cmp("LeftKey"))
            .comparator2(cmp("RightKey"))
            .pair_comparator(PairComparatorDescriptor::new("LeftRightKey")),
    );
    let sink = b.add(NodeSpec::sink("sink").parallelism(2));
    b.connect(
        left,
        join,
        ChannelSpec::new(ShipStrategy::PartitionHash, ser("LeftSer"))
            .ship_comparator(cmp("LeftKey"))
            .local_strategy(LocalStrategy::Sort, Some(cmp("LeftKey")))
            .local_memory(4096),
    )
    .expect("connect left");
    b.connect(
        right,
        join,
        ChannelSpec::new(ShipStrategy::PartitionHash, ser("RightSer"))
            .ship_comparator(cmp("RightKey"))
            .local_strategy(LocalStrategy::Sort, Some(cmp("RightKey")))
            .local_memory(8192),
    )
    .expect("connect right");
    b.connect(join, sink, ChannelSpec::forward(record_ser()))
        .expect("connect sink");
    let graph = compile(&b.build().expect("build"));

    let j = graph.vertex_by_name("join").expect("join vertex");
    assert_eq!(j.config.driver(), Some("MatchDriver"));
    assert_eq!(j.config.driver_strategy(), Some(DriverStrategy::Merge));
    assert_eq!(j.config.driver_comparator(0).map(|c| c.class.as_str()), Some("LeftKey"));
    assert_eq!(j.config.driver_comparator(1).map(|c| c.class.as_str()), Some("RightKey"));
    assert_eq!(
        j.config.driver_pair_comparator().map(|c| c.class.as_str()),
        Some("LeftRightKey")
    );
    let budget = j.config.driver_resources().expect("driver budget");
    assert_eq!(budget.memory_bytes, 1 << 20);
    assert_eq!(budget.max_fan_in, 128);
    assert_eq!(budget.spilling_threshold, 0.8);

    assert_eq!(j.config.num_inputs(), 2);
    for (slot, (class, memory)) in [("LeftSer", 4096u64), ("RightSer", 8192u64)].into_iter().enumerate() {
        let input = j.config.input(slot).expect("input slot");
        assert_eq!(input.group_size, 1);
        assert_eq!(input.serializer.as_ref().map(|s| s.class.as_str()), Some(class));
        assert_eq!(input.local_strategy, Some(LocalStrategy::Sort));
        assert_eq!(input.resources.map(|r| r.memory_bytes), Some(memory));
    }

    let incoming = graph.incoming(j.id);
    assert_eq!(incoming.len(), 2);
    assert!(incoming
        .iter()
        .all(|e| e.channel_type == ChannelType::Network && e.pattern == DistributionPattern::Bipartite));

    let l = graph.vertex_by_name("left").expect("left vertex");
    assert_eq!(
        l.config.outputs()[0].comparator.as_ref().map(|c| c.class.as_str()),
        Some("LeftKey")
    );
}

#[test]
fn test_deep_plan_compiles() {
    let mut b = PlanBuilder::new("deep").instance_type("standard");
    let mut prev = b.add(NodeSpec::source("source", record_ser()));
    for i in 0..10_000 {
        let op = b.add(NodeSpec::single_input(format!("op{i}"), DriverStrategy::SortedGroup));
        b.connect(
            prev,
            op,
            ChannelSpec::new(ShipStrategy::PartitionHash, record_ser()).ship_comparator(cmp("Key")),
        )
        .expect("connect");
        prev = op;
    }
    let sink = b.add(NodeSpec::sink("sink"));
    b.connect(prev, sink, ChannelSpec::forward(record_ser()))
        .expect("connect");
    let plan = b.build().expect("build");

    let (graph, report) = compile_with_report(&plan);
    assert_eq!(graph.len(), plan.nodes().len());
    assert_eq!(graph.edges().count(), plan.channels().len());
    assert_eq!(report.chained_count(), 0);
    assert!(!report.has_diagnostics());
}
