use std::{sync::Arc, time::Duration};

use criterion::{criterion_group, criterion_main, Criterion};
use num_complex::Complex;
use qbxfmm::{
    ComputePotentialInstruction, Discretization, EvaluationDriver, ForcedLimit, GeometryCollection,
    Kernel2d, OutputKernel, PointTargets, PotentialOutput, QbxConfigBuilder,
    QbxLayerPotentialSource,
};

fn laplace_circle(c: &mut Criterion) {
    let mut group = c.benchmark_group("Laplace Layer Potentials on a Circle");
    group
        .sample_size(10)
        .measurement_time(Duration::from_secs(15));

    for ndofs in [2048, 8192] {
        let discr = Arc::new(Discretization::<f64>::circle(ndofs, 1.0, 16));

        let mut places = GeometryCollection::new();
        for (name, fmm) in [("fmm", true), ("direct", false)] {
            if !fmm && ndofs > 2048 {
                continue;
            }
            let builder = QbxConfigBuilder::new().qbx_order(8).unwrap();
            let builder = if fmm {
                builder.fmm_order(15).unwrap()
            } else {
                builder.disable_fmm().unwrap()
            };
            let source = QbxLayerPotentialSource::new(discr.clone(), builder.build().unwrap())
                .unwrap()
                .refined_for_global_qbx(true);
            places.add_source(name, Arc::new(source));
        }

        let targets = (0..1000)
            .map(|i| {
                let t = 0.1 * i as f64;
                let rho = 0.5 + 1.5 * (i as f64 / 1000.0);
                [rho * t.cos(), rho * t.sin()]
            })
            .collect();
        places.add_targets("points", PointTargets::new(targets).unwrap());

        let density = discr
            .nodes()
            .iter()
            .map(|x| Complex::new(x[0] * x[1], 0.0))
            .collect::<Vec<_>>();

        for name in ["fmm", "direct"] {
            if places.get(name).is_none() {
                continue;
            }

            let insn = ComputePotentialInstruction::new(
                name,
                vec![
                    OutputKernel::single_layer(Kernel2d::Laplace),
                    OutputKernel::double_layer(Kernel2d::Laplace),
                ],
                density.clone(),
                vec![
                    PotentialOutput::new("s", name, ForcedLimit::Interior, 0),
                    PotentialOutput::new("d", name, ForcedLimit::Interior, 1),
                    PotentialOutput::new("s_points", "points", ForcedLimit::Unforced, 0),
                ],
            );

            // Build the geometry once, outside the measurement
            places.evaluate(&insn, &EvaluationDriver::default()).unwrap();

            group.bench_function(format!("{name}, N={ndofs}"), |b| {
                b.iter(|| places.evaluate(&insn, &EvaluationDriver::default()).unwrap())
            });
        }
    }
}

criterion_group!(benches, laplace_circle);
criterion_main!(benches);
