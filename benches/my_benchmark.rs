use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nightshift_navigator::{
    config::PathfindingConfig,
    math::{self, angle::Angle},
    model::{Frame, Metadata, NavigationGraph, NavigationNode, NodeId, Position},
    routing::astar::find_route,
    vision::histogram::compute_histogram,
};
use rand::Rng;

fn create_random_nearby_positions() -> Vec<Position> {
    let mut rng = rand::rng();
    let initial = Position {
        lat: Angle::from_bits(rng.random()),
        lng: Angle::from_bits(rng.random()),
        altitude: None,
        accuracy: None,
    };

    let mut positions = vec![initial];
    for _ in 0..127 {
        let offset_lat = Angle::from_bits(rng.random_range(-10000..10000));
        let offset_lng = Angle::from_bits(rng.random_range(-10000..10000));
        positions.push(Position {
            lat: initial.lat + offset_lat,
            lng: initial.lng + offset_lng,
            altitude: None,
            accuracy: None,
        });
    }
    positions
}

fn random_frame(width: u32, height: u32) -> Frame {
    let mut rng = rand::rng();
    let mut pixels = vec![0u8; width as usize * height as usize * 4];
    rng.fill(pixels.as_mut_slice());
    Frame::new(width, height, pixels)
}

/// A chain of `n` nodes, 111.195m apart, for A* benchmarking.
fn chain_graph(n: usize) -> NavigationGraph {
    let mut graph = NavigationGraph::new();
    let mut prev = None;
    for i in 0..n {
        let pos = Position::new_deg(0., i as f64 * 0.001);
        let id = NodeId::from_position(pos);
        graph.add_node(NavigationNode {
            id,
            position: pos,
            metadata: Metadata::new(),
        });
        if let Some(prev_id) = prev {
            graph.add_edge(prev_id, id, 111.195, 1.0, 1.0, Metadata::new());
        }
        prev = Some(id);
    }
    graph
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter_batched(
            create_random_nearby_positions,
            |positions| {
                for position in &positions {
                    black_box(math::haversine_distance(positions[0], *position));
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("brightness_histogram_640x480", |b| {
        b.iter_batched(
            || random_frame(640, 480),
            |frame| black_box(compute_histogram(&frame).unwrap()),
            BatchSize::LargeInput,
        );
    });

    c.bench_function("astar_chain_128", |b| {
        let graph = chain_graph(128);
        let config = PathfindingConfig::default();
        b.iter(|| {
            black_box(
                find_route(
                    &graph,
                    Position::new_deg(0., 0.),
                    Position::new_deg(0., 0.127),
                    &config,
                )
                .unwrap(),
            )
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
