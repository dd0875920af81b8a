use std::sync::Arc;

use num_complex::Complex;
use qbxfmm::{
    ComputePotentialInstruction, Discretization, EvaluationDriver, EvaluationExtra, ForcedLimit,
    GeometryCollection, Kernel2d, OutputKernel, PointTargets, PotentialOutput, QbxConfigBuilder,
    QbxLayerPotentialSource,
};

fn main() {
    // Unit circle with 1024 nodes, grouped into elements of 16 nodes
    let discr = Arc::new(Discretization::<f64>::circle(1024, 1.0, 16));

    // QBX parameters
    let config = QbxConfigBuilder::new()
        .qbx_order(8)
        .unwrap()
        .fmm_order(20)
        .unwrap()
        .build()
        .unwrap();
    let source = QbxLayerPotentialSource::new(discr.clone(), config)
        .unwrap()
        .refined_for_global_qbx(true);

    let mut places = GeometryCollection::new();
    places.add_source("circle", Arc::new(source));
    places.add_targets(
        "points",
        PointTargets::new(vec![[0.5, 0.0], [0.97, 0.1], [1.03, -0.2], [2.0, 1.0]]).unwrap(),
    );

    // Density cos(theta), whose single and double layer potentials are known in closed form
    let density = discr
        .nodes()
        .iter()
        .map(|x| Complex::new(x[1].atan2(x[0]).cos(), 0.0))
        .collect();

    let insn = ComputePotentialInstruction::new(
        "circle",
        vec![
            OutputKernel::single_layer(Kernel2d::Laplace),
            OutputKernel::double_layer(Kernel2d::Laplace),
        ],
        density,
        vec![
            PotentialOutput::new("s", "points", ForcedLimit::Unforced, 0),
            PotentialOutput::new("d_int", "circle", ForcedLimit::Interior, 1),
            PotentialOutput::new("d_ext", "circle", ForcedLimit::Exterior, 1),
        ],
    );

    let result = places
        .evaluate(&insn, &EvaluationDriver::Execute { timed: true })
        .unwrap();

    let points: [[f64; 2]; 4] = [[0.5, 0.0], [0.97, 0.1], [1.03, -0.2], [2.0, 1.0]];
    for (x, s) in points.iter().zip(result.output("s").unwrap()) {
        let rho: f64 = x[0].hypot(x[1]);
        let cos = x[0] / rho;
        let exact = if rho < 1.0 { rho * cos / 2.0 } else { cos / (2.0 * rho) };
        println!("S at {x:?}: {:.12} (exact {exact:.12})", s.re);
    }

    let d_int = result.output("d_int").unwrap();
    let d_ext = result.output("d_ext").unwrap();
    println!(
        "Jump of the double layer at node 0: {:.12} (density {:.12})",
        (d_ext[0] - d_int[0]).re,
        1.0
    );

    if let EvaluationExtra::Timings(times) = &result.extra {
        for time in times {
            println!("{:?}: {} ms", time.operator, time.time);
        }
    }
}
