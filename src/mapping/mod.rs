//! Mappings that PolyMaps are combined with.
//!
//! # Supported kinds
//!
//! - [`Mapping::Unit`]: identity on a fixed number of coordinates
//! - [`Mapping::Poly`]: a [`PolyMap`]
//! - [`Mapping::Cmp`]: two mappings applied in series or side by side
//!
//! A series chain can be flattened into a [`MapList`] and simplified, which
//! cancels a PolyMap against an adjacent copy of itself used in the opposite
//! direction.

pub mod merge;

use crate::error::{PolyMapError, Result};
use crate::polymap::PolyMap;
use crate::Points;

pub use merge::{merge_inverse_neighbour, simplify};

/// Identity mapping on `ncoord` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitMap {
    ncoord: usize,
}

impl UnitMap {
    pub fn new(ncoord: usize) -> Self {
        Self { ncoord }
    }

    pub fn ncoord(&self) -> usize {
        self.ncoord
    }
}

/// A coordinate mapping.
#[derive(Debug, Clone)]
pub enum Mapping {
    /// Identity.
    Unit(UnitMap),
    /// Polynomial mapping.
    Poly(PolyMap),
    /// Compound of two mappings.
    Cmp(Box<CmpMap>),
}

impl Mapping {
    /// Number of inputs, honouring any Invert flag.
    pub fn nin(&self) -> usize {
        match self {
            Mapping::Unit(u) => u.ncoord,
            Mapping::Poly(p) => p.nin(),
            Mapping::Cmp(c) => c.nin(),
        }
    }

    /// Number of outputs, honouring any Invert flag.
    pub fn nout(&self) -> usize {
        match self {
            Mapping::Unit(u) => u.ncoord,
            Mapping::Poly(p) => p.nout(),
            Mapping::Cmp(c) => c.nout(),
        }
    }

    /// Current Invert flag. Identity mappings are never inverted.
    pub fn is_inverted(&self) -> bool {
        match self {
            Mapping::Unit(_) => false,
            Mapping::Poly(p) => p.is_inverted(),
            Mapping::Cmp(c) => c.invert,
        }
    }

    pub fn set_invert(&mut self, invert: bool) {
        match self {
            Mapping::Unit(_) => {}
            Mapping::Poly(p) => p.set_invert(invert),
            Mapping::Cmp(c) => c.invert = invert,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Mapping::Unit(_))
    }

    /// Is the forward (`true`) or inverse (`false`) transformation available?
    pub fn has_transform(&self, forward: bool) -> bool {
        match self {
            Mapping::Unit(_) => true,
            Mapping::Poly(p) => {
                if forward {
                    p.tran_forward()
                } else {
                    p.tran_inverse()
                }
            }
            Mapping::Cmp(c) => {
                let fwd = forward != c.invert;
                c.first.has_transform(fwd) && c.second.has_transform(fwd)
            }
        }
    }

    /// Transform a batch of points, one row per point.
    pub fn transform(&self, points: &Points, forward: bool) -> Result<Points> {
        let expected = if forward { self.nin() } else { self.nout() };
        if points.ncols() != expected {
            return Err(PolyMapError::BadPoints {
                expected,
                got: points.ncols(),
            });
        }
        match self {
            Mapping::Unit(_) => Ok(points.clone()),
            Mapping::Poly(p) => p.transform(points, forward),
            Mapping::Cmp(c) => c.transform(points, forward),
        }
    }
}

impl From<PolyMap> for Mapping {
    fn from(map: PolyMap) -> Self {
        Mapping::Poly(map)
    }
}

impl From<UnitMap> for Mapping {
    fn from(map: UnitMap) -> Self {
        Mapping::Unit(map)
    }
}

impl From<CmpMap> for Mapping {
    fn from(map: CmpMap) -> Self {
        Mapping::Cmp(Box::new(map))
    }
}

/// Two mappings combined in series (`second` applied to the output of
/// `first`) or in parallel (`first` on the leading coordinates, `second` on
/// the rest).
#[derive(Debug, Clone)]
pub struct CmpMap {
    first: Mapping,
    second: Mapping,
    series: bool,
    invert: bool,
}

impl CmpMap {
    pub fn new(first: Mapping, second: Mapping, series: bool) -> Result<Self> {
        if series && first.nout() != second.nin() {
            return Err(PolyMapError::DimensionMismatch(format!(
                "cannot join a mapping with {} outputs to one with {} inputs in series",
                first.nout(),
                second.nin()
            )));
        }
        Ok(Self {
            first,
            second,
            series,
            invert: false,
        })
    }

    pub fn first(&self) -> &Mapping {
        &self.first
    }

    pub fn second(&self) -> &Mapping {
        &self.second
    }

    pub fn is_series(&self) -> bool {
        self.series
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Split into components and the Invert flag.
    pub fn into_parts(self) -> (Mapping, Mapping, bool) {
        (self.first, self.second, self.invert)
    }

    fn raw_dims(&self) -> (usize, usize) {
        if self.series {
            (self.first.nin(), self.second.nout())
        } else {
            (
                self.first.nin() + self.second.nin(),
                self.first.nout() + self.second.nout(),
            )
        }
    }

    pub fn nin(&self) -> usize {
        let (nin, nout) = self.raw_dims();
        if self.invert {
            nout
        } else {
            nin
        }
    }

    pub fn nout(&self) -> usize {
        let (nin, nout) = self.raw_dims();
        if self.invert {
            nin
        } else {
            nout
        }
    }

    fn transform(&self, points: &Points, forward: bool) -> Result<Points> {
        let fwd = forward != self.invert;
        if self.series {
            if fwd {
                let mid = self.first.transform(points, true)?;
                self.second.transform(&mid, true)
            } else {
                let mid = self.second.transform(points, false)?;
                self.first.transform(&mid, false)
            }
        } else {
            let split = if fwd {
                self.first.nin()
            } else {
                self.first.nout()
            };
            let rest = points.ncols() - split;
            let a = self
                .first
                .transform(&points.columns(0, split).into_owned(), fwd)?;
            let b = self
                .second
                .transform(&points.columns(split, rest).into_owned(), fwd)?;

            let mut out = Points::zeros(points.nrows(), a.ncols() + b.ncols());
            out.columns_mut(0, a.ncols()).copy_from(&a);
            out.columns_mut(a.ncols(), b.ncols()).copy_from(&b);
            Ok(out)
        }
    }
}

/// One element of a [`MapList`]: a mapping and the Invert flag to apply it with.
#[derive(Debug, Clone)]
pub struct MapEntry {
    pub mapping: Mapping,
    /// Replaces the mapping's own Invert flag while it sits in the list.
    pub invert: bool,
}

/// A flattened series of mappings.
#[derive(Debug, Clone, Default)]
pub struct MapList {
    entries: Vec<MapEntry>,
}

impl MapList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a mapping into its series components.
    ///
    /// Nested series compounds are expanded in order; an inverted compound
    /// contributes its components reversed with their flags toggled.
    pub fn from_mapping(mapping: Mapping) -> Self {
        let mut list = Self::new();
        let invert = mapping.is_inverted();
        list.flatten(mapping, invert);
        list
    }

    fn flatten(&mut self, mapping: Mapping, invert: bool) {
        match mapping {
            Mapping::Cmp(cmp) if cmp.series => {
                let (first, second, _) = (*cmp).into_parts();
                let (fi, si) = (first.is_inverted(), second.is_inverted());
                if invert {
                    self.flatten(second, !si);
                    self.flatten(first, !fi);
                } else {
                    self.flatten(first, fi);
                    self.flatten(second, si);
                }
            }
            other => self.push(other, invert),
        }
    }

    pub fn push(&mut self, mapping: Mapping, invert: bool) {
        self.entries.push(MapEntry { mapping, invert });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [MapEntry] {
        &mut self.entries
    }

    /// Drop identity entries, keeping at least one.
    pub fn remove_units(&mut self) {
        if self.entries.iter().all(|e| e.mapping.is_unit()) {
            self.entries.truncate(1);
        } else {
            self.entries.retain(|e| !e.mapping.is_unit());
        }
    }

    /// Rebuild a single mapping, applying each entry's Invert flag.
    ///
    /// Returns `None` for an empty list.
    pub fn into_mapping(self) -> Option<Mapping> {
        let mut result: Option<Mapping> = None;
        for entry in self.entries {
            let mut mapping = entry.mapping;
            mapping.set_invert(entry.invert);
            result = Some(match result {
                None => mapping,
                // Dimensions matched when the chain was first built.
                Some(prev) => Mapping::Cmp(Box::new(CmpMap {
                    first: prev,
                    second: mapping,
                    series: true,
                    invert: false,
                })),
            });
        }
        result
    }
}
