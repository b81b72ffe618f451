use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::Point3;

use polymesh_deform::algs::assembly::{assemble_affine_system, offset_constraints};
use polymesh_deform::topology::polymesh::PolyMesh;

fn quad_grid(n: usize) -> PolyMesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }
    let id = |i: usize, j: usize| j * (n + 1) + i;
    let faces = (0..n)
        .flat_map(|j| (0..n).map(move |i| (i, j)))
        .map(|(i, j)| vec![id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1)])
        .collect();
    PolyMesh::from_faces(vertices, faces).expect("valid grid")
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembly");

    for &n in &[32usize, 128] {
        let mesh = quad_grid(n);

        group.bench_with_input(BenchmarkId::new("affine_system", n), &n, |b, _| {
            b.iter(|| {
                let system = assemble_affine_system(&mesh).expect("assembly");
                black_box(system);
            });
        });

        group.bench_with_input(BenchmarkId::new("affine_to_csr", n), &n, |b, _| {
            let system = assemble_affine_system(&mesh).expect("assembly");
            b.iter(|| black_box(system.constraints.to_csr()));
        });

        group.bench_with_input(BenchmarkId::new("offset_constraints", n), &n, |b, _| {
            b.iter(|| black_box(offset_constraints(&mesh).expect("assembly")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_assembly);
criterion_main!(benches);
