use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use fech_rs::discretization::generator::create_emitter_meshes;
use fech_rs::models::currents_heating::CurrentsAndHeating;
use fech_rs::numerics::solver::{ConjugateGradient, SolverControl};
use fech_rs::physics::interpolation::{bilinear_interp, linear_interp};
use fech_rs::physics::quantities::{MaterialConstants, PhysicalQuantities};
use nalgebra::DVector;

fn problem_sizes() -> Vec<usize> {
    vec![16, 48]
}

/// Conductor model of `n` by `n / 2` cells with a uniform surface field.
fn model(n: usize) -> CurrentsAndHeating {
    let (conductor, _) = create_emitter_meshes(40.0, 20.0, 40.0, n, n / 2, n);
    let pq = PhysicalQuantities::with_reference_data(MaterialConstants::default());
    let mut model = CurrentsAndHeating::new(conductor, pq, 1e-13);
    model.set_uniform_electric_field(8.0);
    model
}

fn bench_interpolation(c: &mut Criterion) {
    let pq = PhysicalQuantities::with_reference_data(MaterialConstants::default());
    let grid = pq.emission_grid();
    let points: Vec<(f64, f64)> = (0..1000)
        .map(|i| (-1.0 + 4.0 * i as f64 / 1000.0, 100.0 + 1.4 * i as f64))
        .collect();
    let table: Vec<(f64, f64)> = (0..29).map(|i| (100.0 + 50.0 * i as f64, i as f64)).collect();

    let mut group = c.benchmark_group("interpolation");
    group.bench_function("bilinear_1000", |b| {
        b.iter(|| {
            let s: f64 = points
                .iter()
                .map(|&(x, y)| bilinear_interp(x, y, std::hint::black_box(grid)))
                .sum();
            std::hint::black_box(s);
        });
    });
    group.bench_function("linear_1000", |b| {
        b.iter(|| {
            let s: f64 = points
                .iter()
                .map(|&(_, t)| linear_interp(t, std::hint::black_box(&table)))
                .sum();
            std::hint::black_box(s);
        });
    });
    group.finish();
}

fn bench_current_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("current_assembly");
    for &size in &problem_sizes() {
        let mut model = model(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                model.assemble_current_system();
                std::hint::black_box(model.current_system().rhs.norm());
            });
        });
    }
    group.finish();
}

fn bench_heat_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("heat_assembly");
    for &size in &problem_sizes() {
        let mut model = model(size);
        model.assemble_current_system();
        let _ = model.solve_current(&SolverControl::default());
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                model.assemble_heating_system();
                std::hint::black_box(model.heat_system().rhs.norm());
            });
        });
    }
    group.finish();
}

fn bench_heat_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("heat_solve");
    for &size in &problem_sizes() {
        let mut model = model(size);
        model.assemble_current_system();
        let _ = model.solve_current(&SolverControl::default());
        model.assemble_heating_system();
        let system = model.heat_system();
        let guess = DVector::from_element(system.rhs.len(), 300.0);
        for use_ssor in [false, true] {
            let solver = ConjugateGradient::new(SolverControl {
                use_ssor,
                ..Default::default()
            });
            let id = format!("{size}/{}", if use_ssor { "ssor" } else { "plain" });
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter_batched(
                    || guess.clone(),
                    |mut x| {
                        let _ = solver.solve(&system.matrix, &mut x, &system.rhs);
                        std::hint::black_box(x);
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_interpolation,
    bench_current_assembly,
    bench_heat_assembly,
    bench_heat_solve
);
criterion_main!(benches);
