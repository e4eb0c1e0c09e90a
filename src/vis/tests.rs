// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::borrow::Cow;

use approx::assert_abs_diff_eq;
use indexmap::{indexmap, IndexMap};
use ndarray::prelude::*;

use super::*;

fn corrs(value: c64) -> Correlations {
    [
        Some(ArrayD::from_elem(IxDyn(&[2]), value)),
        None,
        None,
        Some(ArrayD::from_elem(IxDyn(&[2]), value * 2.0)),
    ]
}

#[test]
fn test_corr_index() {
    assert_eq!(corr_index(Pol::X, Pol::X), 0);
    assert_eq!(corr_index(Pol::X, Pol::Y), 1);
    assert_eq!(corr_index(Pol::Y, Pol::X), 2);
    assert_eq!(corr_index(Pol::Y, Pol::Y), 3);
    for (k, &(i, j)) in CORR_PAIRS.iter().enumerate() {
        assert_eq!(corr_index(i, j), k);
    }
}

#[test]
fn test_canonicalise() {
    let map: IndexMap<Baseline<&str>, ()> = indexmap! { ("A", "B") => (), ("C", "A") => () };

    assert_eq!(
        canonicalise(&"A", &"B", &map),
        BaselineLookup::Found {
            key: ("A", "B"),
            orientation: Orientation::Direct
        }
    );
    assert_eq!(
        canonicalise(&"B", &"A", &map),
        BaselineLookup::Found {
            key: ("A", "B"),
            orientation: Orientation::Swapped
        }
    );
    assert_eq!(
        canonicalise(&"A", &"C", &map),
        BaselineLookup::Found {
            key: ("C", "A"),
            orientation: Orientation::Swapped
        }
    );
    assert_eq!(canonicalise(&"B", &"C", &map), BaselineLookup::NotFound);
}

#[test]
fn test_canonicalise_prefers_direct() {
    let map: IndexMap<Baseline<u8>, ()> = indexmap! { (1, 0) => (), (0, 1) => () };
    assert_eq!(
        canonicalise(&0, &1, &map),
        BaselineLookup::Found {
            key: (0, 1),
            orientation: Orientation::Direct
        }
    );
}

#[test]
fn test_get_oriented() {
    let map: VisMap<&str> = indexmap! { ("A", "B") => corrs(c64::new(1.0, 2.0)) };

    let direct = get_oriented(&map, &("A", "B")).unwrap();
    assert!(matches!(direct, Cow::Borrowed(_)));

    let swapped = get_oriented(&map, &("B", "A")).unwrap();
    assert!(matches!(swapped, Cow::Owned(_)));
    assert_abs_diff_eq!(
        swapped[0].as_ref().unwrap()[[0]],
        c64::new(1.0, -2.0)
    );
    assert_abs_diff_eq!(
        swapped[3].as_ref().unwrap()[[1]],
        c64::new(2.0, -4.0)
    );
    // Nulls stay null.
    assert!(swapped[1].is_none());
    assert!(swapped[2].is_none());

    assert!(get_oriented(&map, &("A", "C")).is_none());
}

#[test]
fn test_swapped_cross_hands_trade_places() {
    let ab: Correlations = [
        Some(ArrayD::from_elem(IxDyn(&[1]), c64::new(1.0, 0.0))),
        Some(ArrayD::from_elem(IxDyn(&[1]), c64::new(5.0, 1.0))),
        Some(ArrayD::from_elem(IxDyn(&[1]), c64::new(7.0, -2.0))),
        None,
    ];
    let map: VisMap<&str> = indexmap! { ("A", "B") => ab };

    let ba = get_oriented(&map, &("B", "A")).unwrap();
    assert_abs_diff_eq!(ba[0].as_ref().unwrap()[[0]], c64::new(1.0, 0.0));
    // BA[XY] = conj(AB[YX]) and BA[YX] = conj(AB[XY]).
    assert_abs_diff_eq!(ba[1].as_ref().unwrap()[[0]], c64::new(7.0, 2.0));
    assert_abs_diff_eq!(ba[2].as_ref().unwrap()[[0]], c64::new(5.0, -1.0));
    assert!(ba[3].is_none());

    // Reversing twice gives back the stored correlations.
    assert_eq!(hermitian_correlations(&ba), map[&("A", "B")]);
}
