//! Benchmark: influence assembly and solve scaling
//!
//! Tests how the vortex-lattice solver scales with the number of panels for
//! 1. Near/far influence assembly
//! 2. Multigrid hierarchy construction
//! 3. One linear solve on a rigid wake
//!
//! Run with:
//!   cargo bench -p vortex-lattice --bench assembly_scaling
//!
//! Thread scaling:
//!   RAYON_NUM_THREADS=1 cargo bench -p vortex-lattice --bench assembly_scaling
//!   RAYON_NUM_THREADS=4 cargo bench -p vortex-lattice --bench assembly_scaling

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use vortex_lattice::core::assembly::{InfluenceOperator, InfluenceSettings, KernelGeometry, LevelLoop};
use vortex_lattice::core::config::{InfluenceConfig, SolverConfig, WakeConfig};
use vortex_lattice::core::mesh::{WingSpec, rectangular_wing};
use vortex_lattice::core::model::VortexLatticeModel;
use vortex_lattice::core::multigrid::MultigridCoordinator;
use vortex_lattice::core::onset::OnsetFlow;
use vortex_lattice::core::wake::initialize_wake;
use vortex_lattice::Vec3;

fn wing_model(n_chord: usize, n_span: usize) -> (VortexLatticeModel, KernelGeometry) {
    let mesh = rectangular_wing(&WingSpec {
        chord: 1.0,
        semi_span: 4.0,
        n_chord,
        n_span,
        full_span: true,
        cosine_span: false,
    });
    let mut model = VortexLatticeModel::from_mesh(&mesh, None, Vec::new()).expect("valid wing");
    initialize_wake(&mut model, Vec3::new(1.0, 0.0, 0.0), &WakeConfig::default()).expect("wake");
    let core = 0.01 * model.mean_edge_length;
    let geometry = KernelGeometry::new(&model, 1.0, core);
    (model, geometry)
}

const SIZES: [(usize, usize); 4] = [(4, 16), (6, 32), (8, 48), (10, 64)];

/// Benchmark near/far assembly
fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("influence_assembly");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(10));

    for &far_field_ratio in &[0.0, 5.0] {
        let settings = InfluenceSettings::from_config(&InfluenceConfig {
            far_field_ratio,
            ..Default::default()
        });
        let label = if far_field_ratio == 0.0 { "dense" } else { "far_field" };
        for &(nc, ns) in &SIZES {
            let (model, geometry) = wing_model(nc, ns);
            let loops = LevelLoop::from_model(&model);
            let wakeless = vec![false; model.kelvin_groups.len()];
            group.throughput(Throughput::Elements(model.num_loops() as u64));

            group.bench_with_input(
                BenchmarkId::new(label, model.num_loops()),
                &(&geometry, &loops),
                |b, (geometry, loops)| {
                    b.iter(|| {
                        let operator = InfluenceOperator::assemble(geometry, loops, &wakeless, &settings);
                        black_box(operator)
                    });
                },
            );
        }
    }

    group.finish();
}

/// Benchmark multigrid hierarchy construction
fn bench_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("multigrid_hierarchy");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    let settings = InfluenceSettings::default();
    for &(nc, ns) in &SIZES {
        let (model, geometry) = wing_model(nc, ns);
        group.throughput(Throughput::Elements(model.num_loops() as u64));
        group.bench_with_input(BenchmarkId::new("levels_3", model.num_loops()), &model, |b, model| {
            b.iter(|| {
                let coordinator = MultigridCoordinator::new(model, &geometry, 3, &settings);
                black_box(coordinator)
            });
        });
    }

    group.finish();
}

/// Benchmark one linear solve per solver configuration
fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_solve");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(10);

    let settings = InfluenceSettings::default();
    let onset = OnsetFlow {
        freestream: Vec3::new(5.0_f64.to_radians().cos(), 0.0, 5.0_f64.to_radians().sin()),
        rotation: Vec3::zero(),
        cg: Vec3::zero(),
    };

    for &levels in &[1, 3] {
        let config = SolverConfig {
            multigrid_levels: levels,
            tolerance: 1e-8,
            ..Default::default()
        };
        for &(nc, ns) in &SIZES {
            let (model, geometry) = wing_model(nc, ns);
            let coordinator = MultigridCoordinator::new(&model, &geometry, levels, &settings);
            let rhs = onset.rhs(&model);
            group.throughput(Throughput::Elements(model.num_loops() as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("gmres_levels_{}", levels), model.num_loops()),
                &(&coordinator, &rhs),
                |b, (coordinator, rhs)| {
                    b.iter(|| {
                        let report = coordinator.solve(&config, rhs, None);
                        black_box(report)
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_assembly, bench_hierarchy, bench_solve);
criterion_main!(benches);
