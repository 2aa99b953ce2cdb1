// Grid A* benchmarks on a procedural city block layout.
//
// The grid is a lattice of solid building blocks separated by streets, which
// is the worst shape for a Manhattan-guided search: many equal-cost routes
// and long detours around each block.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use city_nav::{GridTransform, NavConfig, NavEngine, Vec3, build_walkability_grid};

/// `size` x `size` cells; blocks of `block` cells separated by 2-cell streets.
fn city_blocks(size: u32, block: u32) -> Vec<Vec<bool>> {
    let period = block + 2;
    (0..size)
        .map(|y| {
            (0..size)
                .map(|x| x % period >= block || y % period >= block)
                .collect()
        })
        .collect()
}

fn engine(size: u32) -> NavEngine {
    let matrix = city_blocks(size, 6);
    let data = build_walkability_grid(size, size, &matrix, GridTransform::default())
        .expect("valid bench grid");
    NavEngine::load(data, NavConfig::default()).expect("bench grid loads")
}

fn bench_corner_to_corner(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_corner_to_corner");
    for size in [64u32, 128, 256] {
        let engine = engine(size);
        // Streets start at cell 6 on each axis.
        let start = Vec3::new(6.5, 0.0, 6.5);
        let far = (size - 2) as f32 + 0.5;
        let end = Vec3::new(far, 0.0, far);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| engine.find_path(black_box(start), black_box(end)))
        });
    }
    group.finish();
}

fn bench_unreachable(c: &mut Criterion) {
    // A full-height wall splits the map, so the search exhausts one half.
    let size = 128u32;
    let mut matrix = city_blocks(size, 6);
    for row in &mut matrix {
        row[size as usize / 2] = false;
    }
    let data = build_walkability_grid(size, size, &matrix, GridTransform::default())
        .expect("valid bench grid");
    let config = NavConfig {
        grid_snap_radius: 0,
        ..NavConfig::default()
    };
    let engine = NavEngine::load(data, config).expect("bench grid loads");
    let start = Vec3::new(6.5, 0.0, 6.5);
    let end = Vec3::new(120.5, 0.0, 6.5);
    c.bench_function("grid_unreachable_128", |b| {
        b.iter(|| engine.find_path(black_box(start), black_box(end)))
    });
}

criterion_group!(benches, bench_corner_to_corner, bench_unreachable);
criterion_main!(benches);
