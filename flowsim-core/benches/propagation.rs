use criterion::{
    BenchmarkGroup, Criterion, Throughput, black_box, criterion_group, criterion_main,
    measurement::WallTime,
};
use flowsim_core::{
    measure::Ratio,
    node::{Node, NodeConfig},
    sim::Simulation,
    topology::{Edge, Topology},
};

/// client -> lb -> `width` app servers -> router -> primary + replica
fn wide(width: usize) -> Topology {
    let mut nodes = vec![
        Node::new("client", "client", NodeConfig::client(10_000.0)),
        Node::new("lb", "lb", NodeConfig::load_balancer(20_000.0)),
        Node::new("router", "router", NodeConfig::db_router(Ratio::clamped(0.7))),
        Node::new("primary", "primary", NodeConfig::database(5_000.0, 50.0)),
        Node::new("replica", "replica", NodeConfig::replica(5_000.0, 50.0)),
    ];
    let mut edges = vec![
        Edge::new("client", "lb"),
        Edge::new("router", "primary"),
        Edge::new("router", "replica"),
    ];
    for i in 0..width {
        let id = format!("app-{i}");
        nodes.push(Node::new(id.as_str(), id.as_str(), NodeConfig::app_server(100.0, 20.0)));
        edges.push(Edge::new("lb", id.as_str()));
        edges.push(Edge::new(id.as_str(), "router"));
    }
    Topology::new(nodes, edges).unwrap()
}

/// A chain of `depth` app servers behind a single client.
fn deep(depth: usize) -> Topology {
    let mut nodes = vec![Node::new("client", "client", NodeConfig::client(1_000.0))];
    let mut edges = Vec::with_capacity(depth);
    let mut previous = "client".to_owned();
    for i in 0..depth {
        let id = format!("app-{i}");
        nodes.push(Node::new(id.as_str(), id.as_str(), NodeConfig::app_server(900.0, 5.0)));
        edges.push(Edge::new(previous.as_str(), id.as_str()));
        previous = id;
    }
    Topology::new(nodes, edges).unwrap()
}

fn bench_step(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, topology: Topology) {
    let size = (topology.len() + topology.edges().len()) as u64;
    let mut sim = Simulation::new(topology, 100.0);

    group.throughput(Throughput::Elements(size));
    group.bench_function(format!("{name} ({size} nodes+edges)"), |b| {
        b.iter(|| black_box(sim.step(0)))
    });
}

fn step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for size in [10, 100, 1_000] {
        bench_step(&mut group, "wide", wide(size));
        bench_step(&mut group, "deep", deep(size));
    }

    group.finish();
}

fn validate(c: &mut Criterion) {
    let topology = wide(1_000);
    c.bench_function("validate wide 1000", |b| {
        b.iter(|| black_box(&topology).validate().unwrap())
    });
}

criterion_group!(benches, step, validate);
criterion_main!(benches);
