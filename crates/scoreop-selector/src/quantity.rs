use std::str::FromStr;

use crate::error::SelectorError;

/// A resource quantity in canonical milli-units, so `500m` CPU and `2`
/// (= 2000 milli-cores) compare directly. Binary suffixes scale the same
/// way: `1Gi` is 1024³ × 1000 milli-bytes.
///
/// Recognized syntax: `m` (millis), `Mi`, `Gi`, and plain integers.
/// Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(pub u128);

const MILLI: u128 = 1;
const UNIT: u128 = 1000;
const MEBI: u128 = 1024 * 1024 * 1000;
const GIBI: u128 = 1024 * 1024 * 1024 * 1000;

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl FromStr for Quantity {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SelectorError::InvalidQuantity(s.to_string()));
        }
        let (digits, scale) = if let Some(d) = s.strip_suffix("Mi") {
            (d, MEBI)
        } else if let Some(d) = s.strip_suffix("Gi") {
            (d, GIBI)
        } else if let Some(d) = s.strip_suffix('m') {
            (d, MILLI)
        } else {
            (s, UNIT)
        };
        let n: u128 = digits
            .parse()
            .map_err(|_| SelectorError::InvalidQuantity(s.to_string()))?;
        n.checked_mul(scale)
            .map(Quantity)
            .ok_or_else(|| SelectorError::InvalidQuantity(s.to_string()))
    }
}

// ── Constraint ranges ─────────────────────────────────────────────────────────

/// A `"min-max"` quantity range. Either bound may be empty; a value without
/// `-` requires exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityRange {
    Exact(Quantity),
    Range {
        min: Option<Quantity>,
        max: Option<Quantity>,
    },
}

impl QuantityRange {
    pub fn contains(&self, q: Quantity) -> bool {
        match self {
            QuantityRange::Exact(v) => q == *v,
            QuantityRange::Range { min, max } => {
                min.is_none_or(|lo| q >= lo) && max.is_none_or(|hi| q <= hi)
            }
        }
    }
}

impl FromStr for QuantityRange {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            None => Ok(QuantityRange::Exact(s.parse()?)),
            Some((lo, hi)) => {
                let min = if lo.trim().is_empty() {
                    None
                } else {
                    Some(lo.parse().map_err(|_| SelectorError::InvalidRange(s.to_string()))?)
                };
                let max = if hi.trim().is_empty() {
                    None
                } else {
                    Some(hi.parse().map_err(|_| SelectorError::InvalidRange(s.to_string()))?)
                };
                Ok(QuantityRange::Range { min, max })
            }
        }
    }
}
