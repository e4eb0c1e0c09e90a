// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The current diagonal gains of every antenna and polarisation, and the
//! products of those gains needed to corrupt models and correct data.

mod cache;

use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use ndarray::{prelude::*, Zip};
use thiserror::Error;

use cache::GainProducts;

use crate::{
    c64,
    vis::{AntennaId, Baseline, GainKey, Pol},
};

/// Gain arrays keyed by antenna and polarisation.
pub type GainMap<A> = IndexMap<GainKey<A>, ArrayD<c64>>;

/// How gains are initialised.
#[derive(Debug, Clone)]
pub enum InitValue<A: AntennaId> {
    /// Every gain is 1.
    Unity,

    /// Start from the solutions of a previous data tile (see
    /// [`GainStore::last_timeslot`]). Each value is broadcast against the
    /// gain shape, so a value missing the leading axis fills every slice of
    /// it. Gains without a value here start at 1.
    FromPreviousTile(GainMap<A>),

    /// Every gain element has this value.
    Constant(c64),
}

impl<A: AntennaId> Default for InitValue<A> {
    fn default() -> Self {
        InitValue::Unity
    }
}

#[derive(Error, Debug)]
pub enum GainInitError {
    #[error("The gain shape {0:?} must have at least one axis and no zero-length axes")]
    GainShape(Vec<usize>),

    #[error("The initial value for gain {key} has shape {got:?}, which can't be broadcast to the gain shape {expected:?}")]
    Incompatible {
        key: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
}

/// Owns the gains. Every gain array has the same (gain) shape, and the set of
/// gain keys never changes after construction.
#[derive(Debug)]
pub struct GainStore<A: AntennaId> {
    gainshape: Vec<usize>,
    gains: GainMap<A>,

    /// Stands in for any gain that isn't being solved.
    unity: ArrayD<c64>,

    regularisation_factor: f64,
    products: GainProducts<A>,
}

impl<A: AntennaId> GainStore<A> {
    /// Create gains for both polarisations of every antenna appearing in
    /// `baselines`.
    pub fn from_baselines<'a, I>(
        baselines: I,
        gainshape: &[usize],
        regularisation_factor: f64,
        init: InitValue<A>,
    ) -> Result<GainStore<A>, GainInitError>
    where
        I: IntoIterator<Item = &'a Baseline<A>>,
        A: 'a,
    {
        let mut keys = IndexSet::new();
        for (p, q) in baselines {
            for ant in [p, q] {
                for pol in Pol::ALL {
                    keys.insert((ant.clone(), pol));
                }
            }
        }
        GainStore::new(keys, gainshape, regularisation_factor, init)
    }

    pub fn new<I>(
        keys: I,
        gainshape: &[usize],
        regularisation_factor: f64,
        init: InitValue<A>,
    ) -> Result<GainStore<A>, GainInitError>
    where
        I: IntoIterator<Item = GainKey<A>>,
    {
        if gainshape.is_empty() || gainshape.contains(&0) {
            return Err(GainInitError::GainShape(gainshape.to_vec()));
        }
        let unity = ArrayD::from_elem(IxDyn(gainshape), c64::new(1.0, 0.0));
        let keys = keys.into_iter();

        let gains: GainMap<A> = match init {
            InitValue::Unity => keys.map(|key| (key, unity.clone())).collect(),

            InitValue::Constant(value) => {
                let default = ArrayD::from_elem(IxDyn(gainshape), value);
                keys.map(|key| (key, default.clone())).collect()
            }

            InitValue::FromPreviousTile(previous) => {
                let mut gains: GainMap<A> = keys.map(|key| (key, unity.clone())).collect();
                for (key, value) in previous {
                    // Either one slice of the leading axis, or the whole array.
                    let rank_ok =
                        value.ndim() == gainshape.len() || value.ndim() + 1 == gainshape.len();
                    match gains.get_mut(&key) {
                        Some(g) => match value.broadcast(g.raw_dim()).filter(|_| rank_ok) {
                            Some(value) => g.assign(&value),
                            None => {
                                return Err(GainInitError::Incompatible {
                                    key: format!("{key:?}"),
                                    got: value.shape().to_vec(),
                                    expected: gainshape.to_vec(),
                                })
                            }
                        },
                        None => trace!("Ignoring initial value for unsolved gain {key:?}"),
                    }
                }
                gains
            }
        };
        debug!(
            "Initialised {} gains with shape {:?}",
            gains.len(),
            gainshape
        );

        Ok(GainStore {
            gainshape: gainshape.to_vec(),
            gains,
            unity,
            regularisation_factor,
            products: GainProducts::new(),
        })
    }

    pub fn gainshape(&self) -> &[usize] {
        &self.gainshape
    }

    pub fn keys(&self) -> impl Iterator<Item = &GainKey<A>> {
        self.gains.keys()
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    pub fn get(&self, key: &GainKey<A>) -> Option<&ArrayD<c64>> {
        self.gains.get(key)
    }

    pub fn gains(&self) -> &GainMap<A> {
        &self.gains
    }

    pub fn into_gains(self) -> GainMap<A> {
        self.gains
    }

    /// Replace every gain. The keys of `gains` must match the existing keys.
    pub(crate) fn replace(&mut self, gains: GainMap<A>) {
        debug_assert!(gains.len() == self.gains.len());
        debug_assert!(gains.keys().all(|k| self.gains.contains_key(k)));
        self.gains = gains;
        self.invalidate();
    }

    /// Forget every cached gain product.
    pub fn invalidate(&mut self) {
        self.products.invalidate();
    }

    #[cfg(test)]
    pub(crate) fn has_cached_products(&self) -> bool {
        !self.products.is_empty()
    }

    /// Gp * conj(Gq) on the gain grid. Antennas that aren't being solved
    /// have unity gain.
    pub fn gpgq(&mut self, pq: &Baseline<A>, i: Pol, j: Pol) -> &ArrayD<c64> {
        let GainStore {
            gains,
            unity,
            products,
            ..
        } = self;
        let (gains, unity) = (&*gains, &*unity);
        products.gpgq.entry((pq.clone(), i, j)).or_insert_with(|| {
            let gp = gains.get(&(pq.0.clone(), i)).unwrap_or(unity);
            let gq = gains.get(&(pq.1.clone(), j)).unwrap_or(unity);
            Zip::from(gp)
                .and(gq)
                .map_collect(|&gp, &gq| gp * gq.conj())
        })
    }

    /// 1/(Gp + reg) * conj(1/(Gq + reg)) on the gain grid, where reg is the
    /// regularisation factor.
    pub fn gpgq_inv(&mut self, pq: &Baseline<A>, i: Pol, j: Pol) -> &ArrayD<c64> {
        let key = (pq.clone(), i, j);
        if !self.products.gpgq_inv.contains_key(&key) {
            let gp_key = (pq.0.clone(), i);
            let gq_key = (pq.1.clone(), j);
            self.cache_gp_inv(&gp_key);
            self.cache_gp_inv(&gq_key);

            let gp_inv = &self.products.gp_inv[&gp_key];
            let gq_inv = &self.products.gp_inv[&gq_key];
            let product = Zip::from(gp_inv)
                .and(gq_inv)
                .map_collect(|&gp, &gq| gp * gq.conj());
            self.products.gpgq_inv.insert(key.clone(), product);
        }
        &self.products.gpgq_inv[&key]
    }

    fn cache_gp_inv(&mut self, key: &GainKey<A>) {
        if !self.products.gp_inv.contains_key(key) {
            let reg = self.regularisation_factor;
            let g = self.gains.get(key).unwrap_or(&self.unity);
            let inv = g.mapv(|g| (g + reg).inv());
            self.products.gp_inv.insert(key.clone(), inv);
        }
    }

    /// The last slice of every gain along the leading (usually time) axis.
    /// The result can be used as [`InitValue::FromPreviousTile`] for the next
    /// tile of data.
    pub fn last_timeslot(&self) -> GainMap<A> {
        self.gains
            .iter()
            .map(|(key, g)| {
                let last = g.len_of(Axis(0)) - 1;
                (key.clone(), g.index_axis(Axis(0), last).to_owned())
            })
            .collect()
    }
}
