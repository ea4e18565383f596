//! Performance benchmarks for annotation-scene-lib
//!
//! Run with: cargo bench
//!
//! Covers index build and query costs, the adversarial clustering case where
//! quadrant-straddling shapes pin items at ancestor nodes, and the per-cycle
//! diff cost of the update path.

use annotation_scene_lib::{
    Annotation, AnnotationScene, Geometry, SceneConfig, SpatialIndex, Viewport,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use geo::{Coord, Rect};

const WORLD: f64 = 10_000.0;

fn world_rect(x: f64, y: f64, w: f64, h: f64) -> Rect<f64> {
    Rect::new(Coord { x, y }, Coord { x: x + w, y: y + h })
}

/// Generate rectangles spread on a grid across the world
fn generate_spread_annotations(count: usize) -> Vec<Annotation> {
    let per_row = (count as f64).sqrt().ceil() as usize;
    let cell = WORLD / per_row as f64;
    (0..count)
        .map(|i| {
            let x = (i % per_row) as f64 * cell + cell * 0.1;
            let y = (i / per_row) as f64 * cell + cell * 0.1;
            Annotation::rect(format!("r{i}"), "label", x, y, cell * 0.5, cell * 0.5)
        })
        .collect()
}

/// Generate shapes that all straddle the world's center lines, forcing the
/// over-capacity fallback at the root
fn generate_straddling_annotations(count: usize) -> Vec<Annotation> {
    let center = WORLD / 2.0;
    (0..count)
        .map(|i| {
            let half = 10.0 + (i % 50) as f64;
            Annotation::rect(
                format!("s{i}"),
                "label",
                center - half,
                center - half,
                half * 2.0,
                half * 2.0,
            )
        })
        .collect()
}

fn build_index(annotations: &[Annotation]) -> SpatialIndex {
    let mut index = SpatialIndex::new(world_rect(0.0, 0.0, WORLD, WORLD));
    for ann in annotations {
        if let Some(bbox) = ann.geometry.bounding_box() {
            index.insert(ann.id.clone(), bbox);
        }
    }
    index
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for count in [1_000, 10_000] {
        let annotations = generate_spread_annotations(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &annotations, |b, anns| {
            b.iter(|| build_index(anns));
        });
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let index = build_index(&generate_spread_annotations(10_000));

    // Small viewport (detailed view)
    let small = world_rect(100.0, 100.0, 500.0, 500.0);
    group.bench_function("small_viewport_10k", |b| {
        b.iter(|| index.query(&small));
    });

    // Large viewport (overview)
    let large = world_rect(0.0, 0.0, WORLD, WORLD);
    group.bench_function("large_viewport_10k", |b| {
        b.iter(|| index.query(&large));
    });

    group.finish();
}

fn bench_adversarial_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("adversarial_clustered");
    group.sample_size(20);

    // Every shape straddles the root's quadrant boundaries, so the tree
    // degenerates toward a flat list at the root. This documents the
    // accepted worst case of the no-duplication storage policy.
    let index = build_index(&generate_straddling_annotations(5_000));

    let center_probe = world_rect(WORLD / 2.0 - 5.0, WORLD / 2.0 - 5.0, 10.0, 10.0);
    group.bench_function("center_probe_5k_straddling", |b| {
        b.iter(|| index.query(&center_probe));
    });

    let corner_probe = world_rect(10.0, 10.0, 10.0, 10.0);
    group.bench_function("corner_probe_5k_straddling", |b| {
        b.iter(|| index.query(&corner_probe));
    });

    group.finish();
}

fn bench_update_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_cycle");
    group.sample_size(20);

    let annotations = generate_spread_annotations(10_000);

    // 10% of annotations moved since the previous cycle
    let mut edited = annotations.clone();
    for (i, ann) in edited.iter_mut().enumerate() {
        if i % 10 != 0 {
            continue;
        }
        if let Geometry::Rect(rect) = &mut ann.geometry {
            *rect = world_rect(rect.min().x + 1.0, rect.min().y, rect.width(), rect.height());
        }
    }

    group.bench_function("diff_10k_10pct_changed", |b| {
        b.iter_batched(
            || {
                let mut scene = AnnotationScene::new(SceneConfig::default());
                scene.init_world(WORLD, WORLD).unwrap();
                scene.apply_update(&annotations).unwrap();
                scene
            },
            |mut scene| scene.apply_update(&edited).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_render_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_pass");
    group.sample_size(20);

    let annotations = generate_spread_annotations(10_000);
    let mut scene = AnnotationScene::new(SceneConfig::default());
    scene.init_world(WORLD, WORLD).unwrap();
    scene.apply_update(&annotations).unwrap();

    let viewport = Viewport {
        bounds: world_rect(1000.0, 1000.0, 2000.0, 2000.0),
        zoom: 1.0,
        world_to_screen_scale: 0.1,
    };

    group.bench_function("steady_state_10k", |b| {
        b.iter(|| scene.render_pass(&viewport).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_index_build,
    bench_query,
    bench_adversarial_clustering,
    bench_update_cycle,
    bench_render_pass
);
criterion_main!(benches);
