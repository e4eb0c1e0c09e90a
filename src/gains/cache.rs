// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Products of gains that are computed on demand and kept until the gains
//! change.

use std::collections::HashMap;

use ndarray::ArrayD;

use crate::{
    c64,
    vis::{AntennaId, Baseline, GainKey, Pol},
};

/// Key of a per-correlation product of two antennas' gains.
pub(super) type ProductKey<A> = (Baseline<A>, Pol, Pol);

/// All arrays here have the gain shape.
#[derive(Debug)]
pub(super) struct GainProducts<A: AntennaId> {
    /// Gp * conj(Gq)
    pub(super) gpgq: HashMap<ProductKey<A>, ArrayD<c64>>,

    /// 1/(Gp + reg) * conj(1/(Gq + reg))
    pub(super) gpgq_inv: HashMap<ProductKey<A>, ArrayD<c64>>,

    /// 1/(Gp + reg)
    pub(super) gp_inv: HashMap<GainKey<A>, ArrayD<c64>>,
}

impl<A: AntennaId> GainProducts<A> {
    pub(super) fn new() -> GainProducts<A> {
        GainProducts {
            gpgq: HashMap::new(),
            gpgq_inv: HashMap::new(),
            gp_inv: HashMap::new(),
        }
    }

    pub(super) fn invalidate(&mut self) {
        self.gpgq.clear();
        self.gpgq_inv.clear();
        self.gp_inv.clear();
    }

    #[cfg(test)]
    pub(super) fn is_empty(&self) -> bool {
        self.gpgq.is_empty() && self.gpgq_inv.is_empty() && self.gp_inv.is_empty()
    }
}
