//! Cancellation of a PolyMap against its own inverse.
//!
//! The only simplification attempted is the series pair `P` followed (or
//! preceded) by a PolyMap with identical stored coefficients applied in the
//! opposite direction. Such a pair is replaced by two identity mappings.

use tracing::debug;

use crate::error::{PolyMapError, Result};
use crate::polymap::equal::same_direction;
use crate::polymap::{Direction, PolyMap};

use super::{MapEntry, MapList, Mapping, UnitMap};

/// Try to cancel the PolyMap at `index` against an adjacent entry.
///
/// Returns the index of the first modified entry, or `None` if nothing
/// changed. Parallel combinations are never merged.
pub fn merge_inverse_neighbour(entries: &mut [MapEntry], index: usize, series: bool) -> Option<usize> {
    if !series {
        return None;
    }
    let Mapping::Poly(pmap0) = &entries.get(index)?.mapping else {
        return None;
    };
    let inv0 = entries[index].invert;

    // Dimensions of the nominated PolyMap as it is used in the list.
    let (nin, nout) = if inv0 {
        (pmap0.stored_nout(), pmap0.stored_nin())
    } else {
        (pmap0.stored_nin(), pmap0.stored_nout())
    };

    let neighbours = [index.checked_sub(1), index.checked_add(1)];
    for i in neighbours.into_iter().flatten() {
        let Some(entry) = entries.get(i) else {
            continue;
        };
        let Mapping::Poly(pmap1) = &entry.mapping else {
            continue;
        };
        if entry.invert == inv0 {
            continue;
        }
        if !same_tables(pmap0, pmap1) {
            continue;
        }

        let ncoord = if i < index { nout } else { nin };
        debug!(
            "cancelling PolyMap pair at entries {} and {} ({} coordinates)",
            i.min(index),
            i.max(index),
            ncoord
        );
        for j in [i, index] {
            entries[j] = MapEntry {
                mapping: Mapping::Unit(UnitMap::new(ncoord)),
                invert: false,
            };
        }
        return Some(i.min(index));
    }
    None
}

/// Same stored shape and equal stored coefficients in both directions.
fn same_tables(a: &PolyMap, b: &PolyMap) -> bool {
    a.stored_nin() == b.stored_nin()
        && a.stored_nout() == b.stored_nout()
        && same_direction(a.polynomial(Direction::Forward), b.polynomial(Direction::Forward))
        && same_direction(a.polynomial(Direction::Inverse), b.polynomial(Direction::Inverse))
}

/// Simplify a mapping by cancelling PolyMap/inverse pairs in its series
/// chain and dropping the identity mappings left behind.
pub fn simplify(mapping: Mapping) -> Result<Mapping> {
    let mut list = MapList::from_mapping(mapping);
    loop {
        let mut changed = false;
        for index in 0..list.len() {
            if merge_inverse_neighbour(list.entries_mut(), index, true).is_some() {
                changed = true;
            }
        }
        if !changed {
            break;
        }
        list.remove_units();
    }
    list.into_mapping()
        .ok_or_else(|| PolyMapError::DimensionMismatch("empty mapping list".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CmpMap;
    use crate::Points;

    fn poly_2d(c: f64) -> PolyMap {
        // y1 = x1 + c·x2², y2 = x2 ; x1 = y1 - c·y2², x2 = y2
        PolyMap::new(
            2,
            2,
            &[1.0, 1.0, 1.0, 0.0, c, 1.0, 0.0, 2.0, 1.0, 2.0, 0.0, 1.0],
            &[1.0, 1.0, 1.0, 0.0, -c, 1.0, 0.0, 2.0, 1.0, 2.0, 0.0, 1.0],
        )
        .unwrap()
    }

    fn entries(pairs: Vec<(PolyMap, bool)>) -> Vec<MapEntry> {
        pairs
            .into_iter()
            .map(|(p, invert)| MapEntry {
                mapping: Mapping::Poly(p),
                invert,
            })
            .collect()
    }

    #[test]
    fn test_pair_cancels() {
        let mut list = entries(vec![(poly_2d(0.5), false), (poly_2d(0.5), true)]);
        assert_eq!(merge_inverse_neighbour(&mut list, 1, true), Some(0));
        for e in &list {
            assert!(matches!(e.mapping, Mapping::Unit(u) if u.ncoord() == 2));
            assert!(!e.invert);
        }
    }

    #[test]
    fn test_different_coefficients_untouched() {
        let mut list = entries(vec![(poly_2d(0.5), false), (poly_2d(0.25), true)]);
        assert_eq!(merge_inverse_neighbour(&mut list, 0, true), None);
        assert!(list.iter().all(|e| matches!(e.mapping, Mapping::Poly(_))));
    }

    #[test]
    fn test_same_direction_untouched() {
        let mut list = entries(vec![(poly_2d(0.5), true), (poly_2d(0.5), true)]);
        assert_eq!(merge_inverse_neighbour(&mut list, 0, true), None);
    }

    #[test]
    fn test_parallel_untouched() {
        let mut list = entries(vec![(poly_2d(0.5), false), (poly_2d(0.5), true)]);
        assert_eq!(merge_inverse_neighbour(&mut list, 0, false), None);
    }

    #[test]
    fn test_non_square_dimensions() {
        // 2 → 1 followed by its inverse: the chain maps 2 coordinates to 2
        let p = PolyMap::new(2, 1, &[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 1.0, 2.0, 0.0]).unwrap();
        let mut list = entries(vec![(p.clone(), false), (p, true)]);
        assert_eq!(merge_inverse_neighbour(&mut list, 0, true), Some(0));
        assert!(matches!(list[0].mapping, Mapping::Unit(u) if u.ncoord() == 2));

        let p = PolyMap::new(2, 1, &[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 1.0, 2.0, 0.0]).unwrap();
        let mut list = entries(vec![(p.clone(), true), (p, false)]);
        assert_eq!(merge_inverse_neighbour(&mut list, 1, true), Some(0));
        assert!(matches!(list[1].mapping, Mapping::Unit(u) if u.ncoord() == 1));
    }

    #[test]
    fn test_simplify_chain() {
        let a = poly_2d(0.5);
        let mut a_inv = a.clone();
        a_inv.invert();
        let b = poly_2d(2.0);

        let chain = CmpMap::new(
            CmpMap::new(a.into(), a_inv.into(), true).unwrap().into(),
            b.clone().into(),
            true,
        )
        .unwrap();
        let simplified = simplify(chain.into()).unwrap();
        let Mapping::Poly(p) = &simplified else {
            panic!("expected a PolyMap, got {:?}", simplified);
        };
        assert!(p.equals(&b));

        let pts = Points::from_row_slice(1, 2, &[1.0, 2.0]);
        let out = simplified.transform(&pts, true).unwrap();
        assert!((out[(0, 0)] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_simplify_to_identity() {
        let a = poly_2d(0.5);
        let mut a_inv = a.clone();
        a_inv.invert();
        let simplified = simplify(CmpMap::new(a.into(), a_inv.into(), true).unwrap().into()).unwrap();
        assert!(matches!(simplified, Mapping::Unit(u) if u.ncoord() == 2));
    }
}
