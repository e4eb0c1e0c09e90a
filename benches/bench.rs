// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::*;
use indexmap::IndexSet;

use stefcal::{
    calibrate_tiles,
    simulate::{simulate, SimulationParams},
    solver::make_calibration_progress_bar,
    DiagGainSolver, InitValue, StefCalParams,
};

fn solver_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    for (datashape, subtiling) in [(vec![8, 64], vec![1, 1]), (vec![8, 64], vec![4, 16])] {
        let params = StefCalParams::new(datashape.clone()).with_subtiling(subtiling.clone());
        let sim = simulate(&SimulationParams::new(32, 1, params.clone())).unwrap();
        let tile = &sim.tiles[0];

        group.bench_function(format!("{datashape:?} subtiled by {subtiling:?}"), |b| {
            b.iter_batched(
                || {
                    DiagGainSolver::new(&params, sim.baselines.iter().copied(), InitValue::Unity)
                        .unwrap()
                },
                |mut solver| solver.iterate(&tile.data, &tile.model, true).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn tile_calibration(c: &mut Criterion) {
    let params = StefCalParams::new(vec![4, 32]).with_subtiling(vec![2, 8]);
    let sim = simulate(&SimulationParams::new(16, 4, params.clone())).unwrap();
    let baselines: IndexSet<_> = sim.baselines.iter().copied().collect();

    c.bench_function("calibrate 4 tiles", |b| {
        b.iter(|| {
            let pb = make_calibration_progress_bar(sim.tiles.len(), String::new(), false);
            calibrate_tiles(&params, &baselines, sim.tile_pairs(), pb, false).unwrap()
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = solver_iterations, tile_calibration
);
criterion_main!(benches);
