// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Alternating ("StefCal") solving for diagonal gains.
//!
//! Each iteration is two half-steps. The first solves for the gain of the
//! first antenna of every baseline ("p") while holding the second ("q")
//! fixed; the second solves for q using the p gains that were just found.
//! Each update is a closed-form weighted least-squares estimate per gain
//! element, averaged with the previous value:
//!
//! Gp' = ( sum(D Mh) / sum(|Mh|^2) + Gp ) / 2, with Mh = M^H Gq
//!
//! where the sums run over every baseline containing p and over the tile of
//! data elements sharing a gain element.

mod error;

pub use error::SolverError;

use indexmap::{IndexMap, IndexSet};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace};
use ndarray::{prelude::*, CowArray, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    apply::VisCache,
    c64,
    constants::RELAXATION_FACTOR,
    gains::{GainMap, GainStore, InitValue},
    params::StefCalParams,
    tiling::{TileShape, Tiling},
    vis::{canonicalise, corr_index, AntennaId, Baseline, BaselineLookup, GainKey, Orientation, VisMap},
};

/// Which side of the baselines is being solved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolveFor {
    /// The first antenna of each baseline.
    P,
    /// The second antenna of each baseline.
    Q,
}

/// Convergence information from the last iteration.
#[derive(Debug, Clone)]
pub struct IterationStats<A: AntennaId> {
    /// The number of gain elements that changed by less than epsilon.
    pub num_converged: usize,

    /// The largest change of each gain.
    pub gaindiff: IndexMap<GainKey<A>, f64>,

    /// The largest change of any gain.
    pub maxdiff: f64,
}

/// How the solving of a tile went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub num_iterations: u32,
    pub converged: bool,
    pub max_diff: f64,
    pub num_converged: usize,
    pub total_parms: usize,
}

/// Solves for the diagonal gains of every antenna in a set of baselines, for
/// one tile of data.
#[derive(Debug)]
pub struct DiagGainSolver<A: AntennaId> {
    pub(crate) shape: TileShape,
    pub(crate) tiling: Box<dyn Tiling>,
    solve_baselines: IndexSet<Baseline<A>>,
    epsilon: f64,
    pub(crate) gains: GainStore<A>,

    /// The total number of gain elements being solved.
    total_parms: usize,

    /// How many gain elements must converge before the solve is considered
    /// converged.
    convergence_target: usize,

    stats: Option<IterationStats<A>>,
    pub(crate) vis_cache: VisCache<A>,
}

impl<A: AntennaId> DiagGainSolver<A> {
    /// Set up a solver. Gains are made for both polarisations of every
    /// antenna in `solve_baselines`.
    pub fn new<I>(
        params: &StefCalParams,
        solve_baselines: I,
        init: InitValue<A>,
    ) -> Result<DiagGainSolver<A>, SolverError>
    where
        I: IntoIterator<Item = Baseline<A>>,
    {
        params.validate()?;
        let shape = params.tile_shape()?;
        let tiling = shape.tiling();
        let solve_baselines: IndexSet<Baseline<A>> = solve_baselines.into_iter().collect();
        let gains = GainStore::from_baselines(
            &solve_baselines,
            shape.gainshape(),
            params.regularisation_factor,
            init,
        )?;

        let total_parms = gains.len() * shape.num_gain_elements();
        let convergence_target = (total_parms as f64 * params.conv_quota).floor() as usize;
        debug!(
            "Solving {} gains over {} baselines; {} of {} gain elements must converge",
            gains.len(),
            solve_baselines.len(),
            convergence_target,
            total_parms
        );

        Ok(DiagGainSolver {
            shape,
            tiling,
            solve_baselines,
            epsilon: params.epsilon,
            gains,
            total_parms,
            convergence_target,
            stats: None,
            vis_cache: VisCache::new(),
        })
    }

    pub fn shape(&self) -> &TileShape {
        &self.shape
    }

    pub fn gains(&self) -> &GainStore<A> {
        &self.gains
    }

    pub fn into_gains(self) -> GainMap<A> {
        self.gains.into_gains()
    }

    pub fn gain_keys(&self) -> impl Iterator<Item = &GainKey<A>> {
        self.gains.keys()
    }

    pub fn solve_baselines(&self) -> &IndexSet<Baseline<A>> {
        &self.solve_baselines
    }

    pub fn total_parms(&self) -> usize {
        self.total_parms
    }

    pub fn convergence_target(&self) -> usize {
        self.convergence_target
    }

    /// Convergence information from the last call to
    /// [`DiagGainSolver::iterate`], if there has been one.
    pub fn stats(&self) -> Option<&IterationStats<A>> {
        self.stats.as_ref()
    }

    /// The slice of every gain at the last index of the leading axis; see
    /// [`GainStore::last_timeslot`].
    pub fn get_last_timeslot(&self) -> GainMap<A> {
        self.gains.last_timeslot()
    }

    /// Forget every cached product of the gains.
    pub fn invalidate(&mut self) {
        self.gains.invalidate();
        self.vis_cache.invalidate();
    }

    /// Update every gain once and report whether enough gain elements have
    /// converged. `first_iter` only affects diagnostics.
    ///
    /// If this returns an error, the solver must not be used again.
    pub fn iterate(
        &mut self,
        data: &VisMap<A>,
        model: &VisMap<A>,
        first_iter: bool,
    ) -> Result<bool, SolverError> {
        self.invalidate();
        self.check_shapes(data, "data")?;
        self.check_shapes(model, "model")?;
        if first_iter {
            debug!(
                "First iteration: {} data baselines, {} model baselines, {} solvable",
                data.len(),
                model.len(),
                self.solve_baselines.len()
            );
        }

        let gains = self.gains.gains();
        let gain1 = self.half_step(data, model, gains, SolveFor::P)?;
        trace!("Finished solving for p");
        let gain2 = self.half_step(data, model, &gain1, SolveFor::Q)?;
        trace!("Finished solving for q");

        let mut num_converged = 0;
        let mut gaindiff = IndexMap::with_capacity(gains.len());
        for (key, old) in gains {
            let new = &gain2[key];
            let mut max_delta: f64 = 0.0;
            Zip::from(new).and(old).for_each(|&new, &old| {
                let delta = (new - old).norm();
                if delta < self.epsilon {
                    num_converged += 1;
                }
                max_delta = max_delta.max(delta);
            });
            gaindiff.insert(key.clone(), max_delta);
        }
        let maxdiff = gaindiff.values().copied().fold(0.0, f64::max);

        self.gains.replace(gain2);
        self.stats = Some(IterationStats {
            num_converged,
            gaindiff,
            maxdiff,
        });
        Ok(num_converged >= self.convergence_target)
    }

    /// Iterate until converged, or until `max_iterations` iterations have
    /// been done.
    pub fn solve(
        &mut self,
        data: &VisMap<A>,
        model: &VisMap<A>,
        max_iterations: u32,
    ) -> Result<SolveResult, SolverError> {
        let mut num_iterations = 0;
        let mut converged = false;
        while num_iterations < max_iterations {
            converged = self.iterate(data, model, num_iterations == 0)?;
            num_iterations += 1;
            if let Some(stats) = &self.stats {
                debug!(
                    "Iteration {num_iterations:>3}: {:>6}/{} converged, max. diff. {:.5e}",
                    stats.num_converged, self.total_parms, stats.maxdiff
                );
            }
            if converged {
                break;
            }
        }

        let (max_diff, num_converged) = match &self.stats {
            Some(s) => (s.maxdiff, s.num_converged),
            None => (f64::NAN, 0),
        };
        Ok(SolveResult {
            num_iterations,
            converged,
            max_diff,
            num_converged,
            total_parms: self.total_parms,
        })
    }

    fn check_shapes(&self, vis: &VisMap<A>, which: &'static str) -> Result<(), SolverError> {
        let datashape = self.shape.datashape();
        for (baseline, corrs) in vis {
            for corr in corrs.iter().flatten() {
                if corr.shape() != datashape {
                    return Err(SolverError::ShapeMismatch {
                        which,
                        baseline: format!("{baseline:?}"),
                        expected: datashape.to_vec(),
                        got: corr.shape().to_vec(),
                    });
                }
            }
        }
        Ok(())
    }

    fn is_solvable(&self, p: &A, q: &A) -> bool {
        self.solve_baselines.contains(&(p.clone(), q.clone()))
            || self.solve_baselines.contains(&(q.clone(), p.clone()))
    }

    /// Produce new values for every gain in `gains`. The gains are
    /// independent of one another, so they're done in parallel.
    fn half_step(
        &self,
        data: &VisMap<A>,
        model: &VisMap<A>,
        gains: &GainMap<A>,
        side: SolveFor,
    ) -> Result<GainMap<A>, SolverError> {
        let keys: Vec<&GainKey<A>> = gains.keys().collect();
        let updated = keys
            .par_iter()
            .map(|&key| {
                let new = self.update_gain(data, model, gains, key, side)?;
                Ok((key.clone(), new))
            })
            .collect::<Result<Vec<_>, SolverError>>()?;
        Ok(updated.into_iter().collect())
    }

    /// The new value of the gain `outer`, using all of the other `gains` as
    /// the fixed side of each baseline.
    fn update_gain(
        &self,
        data: &VisMap<A>,
        model: &VisMap<A>,
        gains: &GainMap<A>,
        outer: &GainKey<A>,
        side: SolveFor,
    ) -> Result<ArrayD<c64>, SolverError> {
        let gainshape = IxDyn(self.shape.gainshape());
        let mut sum_reim = ArrayD::<c64>::zeros(gainshape.clone());
        let mut sum_sq = ArrayD::<f64>::zeros(gainshape);
        let mut num_terms = 0;

        for (inner, inner_gain) in gains {
            let ((p, i), (q, j)) = match side {
                SolveFor::P => (outer, inner),
                SolveFor::Q => (inner, outer),
            };
            if !self.is_solvable(p, q) {
                continue;
            }
            let (data_key, data_orientation) = match canonicalise(p, q, data) {
                BaselineLookup::Found { key, orientation } => (key, orientation),
                BaselineLookup::NotFound => continue,
            };
            let (model_key, model_orientation) = match canonicalise(p, q, model) {
                BaselineLookup::Found { key, orientation } => (key, orientation),
                BaselineLookup::NotFound => continue,
            };
            let k = corr_index(*i, *j);
            let (Some(m), Some(d)) = (&model[&model_key][k], &data[&data_key][k]) else {
                continue;
            };

            // Solving for p needs conj(M_pq) and D_pq; solving for q needs
            // M_pq and conj(D_pq). Swapped baselines are already conjugated.
            let conj_model = (side == SolveFor::P) == (model_orientation == Orientation::Direct);
            let conj_data = (side == SolveFor::P) == (data_orientation == Orientation::Swapped);
            let m = maybe_conj(m, conj_model);
            let d = maybe_conj(d, conj_data);

            let mh = &self.tiling.tile_data(m.view())? * &self.tiling.tile_gain(inner_gain.view());
            let dmh = &self.tiling.tile_data(d.view())? * &mh;
            let mh2 = mh.mapv(|v| v.norm_sqr());
            sum_reim += &self.tiling.reduce_subtiles(dmh);
            sum_sq += &self.tiling.reduce_subtile_weights(mh2);
            num_terms += 1;
        }

        trace!(
            "{side:?} {outer:?}: {num_terms} terms, weights {:.3e}..{:.3e}",
            sum_sq.iter().copied().fold(f64::INFINITY, f64::min),
            sum_sq.iter().copied().fold(0.0, f64::max),
        );

        // Elements without any weight keep their old value.
        let current = &gains[outer];
        Ok(Zip::from(&sum_reim)
            .and(&sum_sq)
            .and(current)
            .map_collect(|&reim, &sq, &g| {
                if sq == 0.0 {
                    g
                } else {
                    (reim / sq) * RELAXATION_FACTOR + g * (1.0 - RELAXATION_FACTOR)
                }
            }))
    }
}

fn maybe_conj(x: &ArrayD<c64>, conj: bool) -> CowArray<'_, c64, IxDyn> {
    if conj {
        x.mapv(|v| v.conj()).into()
    } else {
        x.view().into()
    }
}

/// The gains of one tile of data and how they were found.
#[derive(Debug, Clone)]
pub struct TileSolution<A: AntennaId> {
    pub gains: GainMap<A>,
    pub result: SolveResult,
}

/// Convenience function to make a progress bar while calibrating tiles.
pub fn make_calibration_progress_bar(num_tiles: usize, message: String, draw: bool) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_tiles as _),
        if draw {
            // Use stdout, not stderr, because the messages printed by the
            // progress bar are valuable.
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}

/// Solve a sequence of contiguous data tiles. Each tile after the first
/// starts from the last timeslot of the previous tile's solutions.
pub fn calibrate_tiles<'a, A, I>(
    params: &StefCalParams,
    solve_baselines: &IndexSet<Baseline<A>>,
    tiles: I,
    progress_bar: ProgressBar,
    print_convergence_messages: bool,
) -> Result<Vec<TileSolution<A>>, SolverError>
where
    A: AntennaId + 'a,
    I: IntoIterator<Item = (&'a VisMap<A>, &'a VisMap<A>)>,
{
    let mut init = InitValue::Unity;
    let mut solutions = vec![];

    for (i_tile, (data, model)) in tiles.into_iter().enumerate() {
        let mut solver = DiagGainSolver::new(params, solve_baselines.iter().cloned(), init)?;
        let result = solver.solve(data, model, params.max_iterations)?;

        let mut status_str = format!("Tile {i_tile:>3}");
        if result.converged {
            status_str.push_str(&format!(
                ": converged ({:>2}): {}/{} below {:e}, max. diff. {:.5e}",
                result.num_iterations,
                result.num_converged,
                result.total_parms,
                params.epsilon,
                result.max_diff
            ));
        } else {
            status_str.push_str(&format!(
                ": failed    ({:>2}): {}/{} below {:e}, max. diff. {:.5e}",
                result.num_iterations,
                result.num_converged,
                result.total_parms,
                params.epsilon,
                result.max_diff
            ));
        }
        if print_convergence_messages {
            if progress_bar.is_hidden() {
                info!("{status_str}");
            } else {
                progress_bar.println(status_str);
            }
        }
        progress_bar.inc(1);

        init = InitValue::FromPreviousTile(solver.get_last_timeslot());
        solutions.push(TileSolution {
            gains: solver.into_gains(),
            result,
        });
    }
    progress_bar.abandon();

    let num_converged = solutions.iter().filter(|s| s.result.converged).count();
    info!(
        "{}/{} tiles converged",
        num_converged,
        solutions.len()
    );

    Ok(solutions)
}
