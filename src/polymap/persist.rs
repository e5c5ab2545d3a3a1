//! Persisted state for PolyMaps.
//!
//! Two formats are supported:
//!
//! - **Keyed fields**: every scalar is written under its own key, in the
//!   layout used by FITS-style channels. For each defined direction the
//!   maximum power of each polynomial input (`MPF<i>` / `MPI<i>`) and the
//!   term count of each polynomial output (`NCF<o>` / `NCI<o>`) come first,
//!   followed by coefficient values (`CF<n>` / `CI<n>`) and non-zero powers
//!   (`PF<n>` / `PI<n>`) numbered by a single running index. Readers fall
//!   back to the older per-axis keys (`CF<o>_<j>`, `PF<o>_<j>_<k>`) when a
//!   running-index key is absent. A direction without its `MP`/`NC` keys is
//!   undefined.
//! - **rkyv bytes**: a compact binary image of the whole map.

use std::fmt::Write as _;

use rkyv::rancor;
use tracing::info;

use crate::error::{PolyMapError, Result};
use crate::{is_bad, BAD};

use super::polynomial::{Polynomial, Term};
use super::{Direction, PolyMap, MAX_POWER};

/// A scalar stored under a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Double(f64),
}

/// One keyed scalar with its descriptive comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
    pub comment: String,
}

/// Ordered collection of keyed scalars. Key lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedFields {
    fields: Vec<Field>,
}

impl KeyedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn write_int(&mut self, key: &str, value: i64, comment: &str) {
        self.push(key, FieldValue::Int(value), comment);
    }

    pub fn write_double(&mut self, key: &str, value: f64, comment: &str) {
        self.push(key, FieldValue::Double(value), comment);
    }

    fn push(&mut self, key: &str, value: FieldValue, comment: &str) {
        self.fields.push(Field {
            key: key.to_string(),
            value,
            comment: comment.to_string(),
        });
    }

    fn find(&self, key: &str) -> Option<FieldValue> {
        self.fields
            .iter()
            .find(|f| f.key.eq_ignore_ascii_case(key))
            .map(|f| f.value)
    }

    /// Read an integer. Doubles holding whole numbers are accepted.
    pub fn read_int(&self, key: &str) -> Option<i64> {
        match self.find(key)? {
            FieldValue::Int(v) => Some(v),
            FieldValue::Double(v) if v.is_finite() => Some((v + 0.5).floor() as i64),
            FieldValue::Double(_) => None,
        }
    }

    pub fn read_double(&self, key: &str) -> Option<f64> {
        match self.find(key)? {
            FieldValue::Int(v) => Some(v as f64),
            FieldValue::Double(v) => Some(v),
        }
    }

    /// Render as `key = value  # comment` lines.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for f in &self.fields {
            let value = match f.value {
                FieldValue::Int(v) => v.to_string(),
                FieldValue::Double(v) => format!("{:?}", v),
            };
            if f.comment.is_empty() {
                let _ = writeln!(text, "{} = {}", f.key, value);
            } else {
                let _ = writeln!(text, "{} = {}  # {}", f.key, value, f.comment);
            }
        }
        text
    }

    /// Parse the text produced by [`KeyedFields::to_text`].
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut fields = Self::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (body, comment) = match line.split_once('#') {
                Some((b, c)) => (b.trim(), c.trim()),
                None => (line, ""),
            };
            let (key, value) = body.split_once('=').ok_or_else(|| {
                PolyMapError::Persist(format!("line {}: expected `key = value`", lineno + 1))
            })?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(PolyMapError::Persist(format!("line {}: empty key", lineno + 1)));
            }
            let parsed = if let Ok(v) = value.parse::<i64>() {
                FieldValue::Int(v)
            } else if let Ok(v) = value.parse::<f64>() {
                FieldValue::Double(v)
            } else {
                return Err(PolyMapError::Persist(format!(
                    "line {}: `{}` is not a number",
                    lineno + 1,
                    value
                )));
            };
            fields.push(key, parsed, comment);
        }
        Ok(fields)
    }
}

// ── Dump ───────────────────────────────────────────────────────────────────

/// Key letter and labels for a direction: (suffix, polynomial-input label, output label, short name).
fn labels(direction: Direction) -> (char, &'static str, &'static str, &'static str) {
    match direction {
        Direction::Forward => ('F', "input", "i/p", "fwd"),
        Direction::Inverse => ('I', "output", "o/p", "inv"),
    }
}

fn dump_direction(fields: &mut KeyedFields, direction: Direction, poly: &Polynomial) {
    let (d, in_label, short_in, short_dir) = labels(direction);

    for (i, &mp) in poly.max_power().iter().enumerate() {
        fields.write_int(
            &format!("MP{}{}", d, i + 1),
            mp as i64,
            &format!("Max. power of {} {} in any {} polynomial", in_label, i + 1, direction),
        );
    }

    for (o, &nc) in poly.term_counts().iter().enumerate() {
        fields.write_int(
            &format!("NC{}{}", d, o + 1),
            nc as i64,
            &format!("No. of coeff.s for {} polynomial {}", direction, o + 1),
        );
    }

    let mut iv = 1;
    for o in 0..poly.nout() {
        for (j, term) in poly.terms(o).iter().enumerate() {
            if !is_bad(term.coeff) {
                fields.write_double(
                    &format!("C{}{}", d, iv),
                    term.coeff,
                    &format!("Coeff {} of {} polynomial {}", j + 1, direction, o + 1),
                );
            }
            iv += 1;
        }
    }

    let mut iv = 1;
    for o in 0..poly.nout() {
        for (j, term) in poly.terms(o).iter().enumerate() {
            for (k, &p) in term.powers.iter().enumerate() {
                if p > 0 {
                    fields.write_int(
                        &format!("P{}{}", d, iv),
                        p as i64,
                        &format!(
                            "Power of {} {} for coeff {} of {} poly {}",
                            short_in,
                            k + 1,
                            j + 1,
                            short_dir,
                            o + 1
                        ),
                    );
                }
                iv += 1;
            }
        }
    }
}

// ── Load ───────────────────────────────────────────────────────────────────

/// Read one direction. `npow` polynomial inputs, `naxes` polynomial outputs.
fn load_direction(
    fields: &KeyedFields,
    direction: Direction,
    npow: usize,
    naxes: usize,
) -> Result<Option<Polynomial>> {
    let (d, ..) = labels(direction);

    // The max-power keys only mark the direction as present; the cache is
    // rebuilt from the terms.
    for i in 0..npow {
        if fields.read_int(&format!("MP{}{}", d, i + 1)).is_none() {
            return Ok(None);
        }
    }

    let mut counts = Vec::new();
    for o in 0..naxes {
        match fields.read_int(&format!("NC{}{}", d, o + 1)) {
            // Bounded by the field count so a corrupt value cannot drive allocation.
            Some(nc) if nc >= 0 && nc as u64 <= fields.len() as u64 => counts.push(nc as usize),
            Some(nc) => {
                return Err(PolyMapError::Persist(format!(
                    "illegal coefficient count {} for {} polynomial {}",
                    nc,
                    direction,
                    o + 1
                )))
            }
            None => return Ok(None),
        }
    }

    let mut axes: Vec<Vec<Term>> = Vec::new();
    let mut iv = 0;
    for (o, &nc) in counts.iter().enumerate() {
        let mut terms = Vec::with_capacity(nc);
        for j in 0..nc {
            iv += 1;
            let coeff = fields
                .read_double(&format!("C{}{}", d, iv))
                .or_else(|| fields.read_double(&format!("C{}{}_{}", d, o + 1, j + 1)))
                .unwrap_or(BAD);
            terms.push(Term {
                coeff,
                powers: vec![0; npow],
            });
        }
        axes.push(terms);
    }

    let mut iv = 0;
    let mut ico = 0;
    for (o, terms) in axes.iter_mut().enumerate() {
        for (j, term) in terms.iter_mut().enumerate() {
            ico += 1;
            for k in 0..npow {
                iv += 1;
                let mut power = fields.read_int(&format!("P{}{}", d, iv)).unwrap_or(0);
                if power == 0 {
                    power = fields
                        .read_int(&format!("P{}{}_{}_{}", d, o + 1, j + 1, k + 1))
                        .unwrap_or(0);
                }
                term.powers[k] = u32::try_from(power)
                    .ok()
                    .filter(|&v| v <= MAX_POWER)
                    .ok_or(PolyMapError::BadPower {
                        direction,
                        coefficient: ico,
                        power: power as f64,
                        axis: k + 1,
                    })?;
            }
        }
    }

    Ok(Some(Polynomial::from_axes(npow, axes)))
}

impl PolyMap {
    /// Write the map as keyed fields.
    pub fn dump(&self) -> KeyedFields {
        let mut fields = KeyedFields::new();
        fields.write_int("Nin", self.nin as i64, "Number of input coordinates");
        fields.write_int("Nout", self.nout as i64, "Number of output coordinates");
        if self.invert {
            fields.write_int("Invert", 1, "Mapping inverted");
        }
        for direction in [Direction::Forward, Direction::Inverse] {
            if let Some(poly) = self.polynomial(direction) {
                dump_direction(&mut fields, direction, poly);
            }
        }
        fields
    }

    /// Rebuild a map from keyed fields written by [`PolyMap::dump`].
    pub fn load(fields: &KeyedFields) -> Result<Self> {
        let read_dim = |key: &str| -> Result<usize> {
            match fields.read_int(key) {
                Some(v) if v > 0 => Ok(v as usize),
                Some(v) => Err(PolyMapError::Persist(format!("{} must be positive, got {}", key, v))),
                None => Err(PolyMapError::Persist(format!("missing {}", key))),
            }
        };
        let nin = read_dim("Nin")?;
        let nout = read_dim("Nout")?;
        let invert = fields.read_int("Invert").unwrap_or(0) != 0;

        let forward = load_direction(fields, Direction::Forward, nin, nout)?;
        let inverse = load_direction(fields, Direction::Inverse, nout, nin)?;
        Ok(Self::from_parts(nin, nout, forward, inverse, invert))
    }

    /// Serialize the map to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> Vec<u8> {
        rkyv::to_bytes::<rancor::Error>(self)
            .expect("rkyv serialization failed")
            .to_vec()
    }

    /// Rebuild a map from bytes written by [`PolyMap::to_rkyv_bytes`].
    pub fn from_rkyv_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        rkyv::from_bytes::<Self, rancor::Error>(bytes)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))
    }

    /// Save the map to a file using rkyv.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let bytes = self.to_rkyv_bytes();
        std::fs::write(path, &bytes)?;
        info!("Saved PolyMap to {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    /// Load a map from an rkyv file.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let map = Self::from_rkyv_bytes(&bytes)?;
        info!(
            "Loaded PolyMap from {}: {} inputs, {} outputs",
            path,
            map.nin(),
            map.nout()
        );
        Ok(map)
    }
}
