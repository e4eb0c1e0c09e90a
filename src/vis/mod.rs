// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visibility containers and baseline bookkeeping.
//!
//! Each baseline maps to 4 correlations, indexed `i*2 + j` for the
//! polarisation `i` of the first antenna and `j` of the second. A correlation
//! may be absent ("null"), which is represented with `None`; nulls are carried
//! through every derived product rather than being treated as zeros.

#[cfg(test)]
mod tests;

use std::{borrow::Cow, fmt::Debug, hash::Hash};

use indexmap::IndexMap;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::c64;

/// Anything that can identify an antenna.
pub trait AntennaId: Clone + Eq + Hash + Debug + Send + Sync {}

impl<T: Clone + Eq + Hash + Debug + Send + Sync> AntennaId for T {}

/// One of the two diagonal correlations of an antenna.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pol {
    X = 0,
    Y = 1,
}

impl Pol {
    pub const ALL: [Pol; 2] = [Pol::X, Pol::Y];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The index of the `(i, j)` correlation of a baseline.
#[inline]
pub fn corr_index(i: Pol, j: Pol) -> usize {
    i.index() * 2 + j.index()
}

/// All `(i, j)` polarisation pairs in correlation order.
pub const CORR_PAIRS: [(Pol, Pol); 4] = [
    (Pol::X, Pol::X),
    (Pol::X, Pol::Y),
    (Pol::Y, Pol::X),
    (Pol::Y, Pol::Y),
];

/// An antenna pair. Only one orientation of each pair is expected to be
/// present in any [`VisMap`]; the other is its conjugate.
pub type Baseline<A> = (A, A);

/// Identifies a single gain array.
pub type GainKey<A> = (A, Pol);

/// The 4 correlations of a baseline.
pub type Correlations = [Option<ArrayD<c64>>; 4];

/// Visibilities (data or model) keyed by baseline.
pub type VisMap<A> = IndexMap<Baseline<A>, Correlations>;

/// Correlations with every slot null.
pub fn null_correlations() -> Correlations {
    [None, None, None, None]
}

/// The conjugate of every non-null correlation.
pub fn conj_correlations(corrs: &Correlations) -> Correlations {
    let mut out = null_correlations();
    for (out, corr) in out.iter_mut().zip(corrs.iter()) {
        *out = corr.as_ref().map(|c| c.mapv(|v| v.conj()));
    }
    out
}

/// The correlations of the reversed baseline: `V_qp[i, j] = conj(V_pq[j, i])`,
/// so every slot is conjugated and the cross-hands trade places.
pub fn hermitian_correlations(corrs: &Correlations) -> Correlations {
    let [xx, xy, yx, yy] = conj_correlations(corrs);
    [xx, yx, xy, yy]
}

/// How a baseline was found in a [`VisMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `(p, q)` is present as-is.
    Direct,

    /// Only `(q, p)` is present; values need to be conjugated.
    Swapped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineLookup<A> {
    Found {
        /// The key as it appears in the map.
        key: Baseline<A>,
        orientation: Orientation,
    },
    NotFound,
}

/// Find the baseline between `p` and `q` in `map`, in either orientation.
/// `(p, q)` is preferred when both are present.
pub fn canonicalise<A: AntennaId, V>(
    p: &A,
    q: &A,
    map: &IndexMap<Baseline<A>, V>,
) -> BaselineLookup<A> {
    let direct = (p.clone(), q.clone());
    if map.contains_key(&direct) {
        return BaselineLookup::Found {
            key: direct,
            orientation: Orientation::Direct,
        };
    }

    let swapped = (q.clone(), p.clone());
    if map.contains_key(&swapped) {
        BaselineLookup::Found {
            key: swapped,
            orientation: Orientation::Swapped,
        }
    } else {
        BaselineLookup::NotFound
    }
}

/// Get the correlations of `pq` from `map` as if they were stored with that
/// orientation; a swapped entry gives its [`hermitian_correlations`]. `None`
/// is returned if neither orientation is present.
pub fn get_oriented<'a, A: AntennaId>(
    map: &'a VisMap<A>,
    pq: &Baseline<A>,
) -> Option<Cow<'a, Correlations>> {
    match canonicalise(&pq.0, &pq.1, map) {
        BaselineLookup::Found {
            key,
            orientation: Orientation::Direct,
        } => Some(Cow::Borrowed(&map[&key])),
        BaselineLookup::Found {
            key,
            orientation: Orientation::Swapped,
        } => Some(Cow::Owned(hermitian_correlations(&map[&key]))),
        BaselineLookup::NotFound => None,
    }
}
