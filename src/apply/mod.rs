// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Applying gains to visibilities.
//!
//! "Corrupting" a model multiplies it by Gp * conj(Gq), predicting what the
//! instrument would observe. "Correcting" data multiplies it by the inverse,
//! recovering calibrated visibilities. Residuals are data minus the corrupted
//! model.


use std::{borrow::Cow, collections::HashMap};

use log::trace;

use crate::{
    solver::{DiagGainSolver, SolverError},
    vis::{
        canonicalise, get_oriented, null_correlations, AntennaId, Baseline, BaselineLookup,
        Correlations, VisMap, CORR_PAIRS,
    },
};

/// Corrupted models and residuals, keyed by baseline. Owned by a single
/// solver and cleared whenever its gains change.
#[derive(Debug)]
pub(crate) struct VisCache<A: AntennaId> {
    corrupt: HashMap<Baseline<A>, Correlations>,
    residual: HashMap<Baseline<A>, Correlations>,
}

impl<A: AntennaId> VisCache<A> {
    pub(crate) fn new() -> VisCache<A> {
        VisCache {
            corrupt: HashMap::new(),
            residual: HashMap::new(),
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.corrupt.clear();
        self.residual.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Corrupt,
    Correct,
}

impl Direction {
    fn vis_name(self) -> &'static str {
        match self {
            Direction::Corrupt => "model",
            Direction::Correct => "data",
        }
    }
}

impl<A: AntennaId> DiagGainSolver<A> {
    /// Apply the current gains to the model correlations of `pq`. Null
    /// correlations stay null. If `cache` is true, the result is kept until
    /// the gains change. A kept result is returned for any later call with
    /// the same baseline, even with `cache` false; it equals what would be
    /// recomputed, because it is dropped whenever the gains change.
    pub fn corrupt(
        &mut self,
        model: &VisMap<A>,
        pq: &Baseline<A>,
        cache: bool,
    ) -> Result<Cow<'_, Correlations>, SolverError> {
        if self.vis_cache.corrupt.contains_key(pq) {
            return Ok(Cow::Borrowed(&self.vis_cache.corrupt[pq]));
        }

        let corrs = get_oriented(model, pq).ok_or_else(|| SolverError::MissingBaseline {
            which: "model",
            baseline: format!("{pq:?}"),
        })?;
        let corrupted = self.apply_gains(&corrs, pq, Direction::Corrupt)?;
        if cache {
            let cached = self.vis_cache.corrupt.entry(pq.clone()).or_insert(corrupted);
            Ok(Cow::Borrowed(cached))
        } else {
            Ok(Cow::Owned(corrupted))
        }
    }

    /// Remove the current gains from the data correlations of `pq`.
    pub fn correct(
        &mut self,
        data: &VisMap<A>,
        pq: &Baseline<A>,
    ) -> Result<Correlations, SolverError> {
        let corrs = get_oriented(data, pq).ok_or_else(|| SolverError::MissingBaseline {
            which: "data",
            baseline: format!("{pq:?}"),
        })?;
        self.apply_gains(&corrs, pq, Direction::Correct)
    }

    /// Like [`DiagGainSolver::correct`], but for correlations that have
    /// already been taken out of their container. `corrs` must be oriented
    /// as `pq`.
    pub fn correct_correlations(
        &mut self,
        corrs: &Correlations,
        pq: &Baseline<A>,
    ) -> Result<Correlations, SolverError> {
        self.apply_gains(corrs, pq, Direction::Correct)
    }

    /// Data minus the corrupted model of `pq`. The result is kept until the
    /// gains change or [`DiagGainSolver::reset_residuals`] is called. A
    /// correlation is null if it is null in either the data or the model.
    pub fn residual(
        &mut self,
        data: &VisMap<A>,
        model: &VisMap<A>,
        pq: &Baseline<A>,
    ) -> Result<&Correlations, SolverError> {
        if !self.vis_cache.residual.contains_key(pq) {
            let data_corrs = get_oriented(data, pq).ok_or_else(|| SolverError::MissingBaseline {
                which: "data",
                baseline: format!("{pq:?}"),
            })?;
            let residual = {
                let corrupted = self.corrupt(model, pq, true)?;
                let mut residual = null_correlations();
                for ((out, d), m) in residual
                    .iter_mut()
                    .zip(data_corrs.iter())
                    .zip(corrupted.iter())
                {
                    if let (Some(d), Some(m)) = (d, m) {
                        *out = Some(d - m);
                    }
                }
                residual
            };
            self.vis_cache.residual.insert(pq.clone(), residual);
        }
        Ok(&self.vis_cache.residual[pq])
    }

    /// Forget all residuals, but keep the other cached products.
    pub fn reset_residuals(&mut self) {
        self.vis_cache.residual.clear();
    }

    /// The root-mean-square residual over every non-null correlation of every
    /// solvable baseline present in both the data and the model.
    pub fn residual_rms(&mut self, data: &VisMap<A>, model: &VisMap<A>) -> Result<f64, SolverError> {
        let baselines: Vec<Baseline<A>> = self
            .solve_baselines()
            .iter()
            .filter(|(p, q)| {
                canonicalise(p, q, data) != BaselineLookup::NotFound
                    && canonicalise(p, q, model) != BaselineLookup::NotFound
            })
            .cloned()
            .collect();

        let mut sum = 0.0;
        let mut count = 0;
        for pq in &baselines {
            let residual = self.residual(data, model, pq)?;
            for r in residual.iter().flatten() {
                sum += r.iter().map(|r| r.norm_sqr()).sum::<f64>();
                count += r.len();
            }
        }
        Ok(if count == 0 {
            0.0
        } else {
            (sum / count as f64).sqrt()
        })
    }

    fn apply_gains(
        &mut self,
        corrs: &Correlations,
        pq: &Baseline<A>,
        direction: Direction,
    ) -> Result<Correlations, SolverError> {
        trace!("{direction:?} {pq:?}");
        let mut out = null_correlations();
        for ((slot, corr), &(i, j)) in out.iter_mut().zip(corrs.iter()).zip(CORR_PAIRS.iter()) {
            let Some(corr) = corr else {
                continue;
            };
            if corr.shape() != self.shape.datashape() {
                return Err(SolverError::ShapeMismatch {
                    which: direction.vis_name(),
                    baseline: format!("{pq:?}"),
                    expected: self.shape.datashape().to_vec(),
                    got: corr.shape().to_vec(),
                });
            }
            let tiled = self.tiling.tile_data(corr.view())?;
            let product = match direction {
                Direction::Corrupt => self.gains.gpgq(pq, i, j),
                Direction::Correct => self.gains.gpgq_inv(pq, i, j),
            };
            let applied = &tiled * &self.tiling.tile_gain(product.view());
            *slot = Some(self.tiling.untile_data(applied)?);
        }
        Ok(out)
    }
}
