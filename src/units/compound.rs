//! Compound unit expressions
//!
//! This module provides the [`Units`] struct, an immutable mapping from
//! atomic [`Unit`]s to rational exponents, with the derived dimension vector
//! and relative scale. `Units` values are produced by a
//! [`UnitCatalog`](crate::units::UnitCatalog) (from strings or maps) or by
//! combining existing `Units` through multiplication, division, and
//! exponentiation.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::units::unit::{power_to_f64, DimVec, Power, Unit};

/// An immutable compound unit expression.
///
/// Internally a map from a unit's primary name to the shared unit and its
/// rational exponent; entries with exponent zero are removed. Equality and
/// hashing are defined on the canonical string rendering, so two `Units`
/// built in different ways but describing the same expression compare equal.
#[derive(Debug, Clone)]
pub struct Units {
    factors: BTreeMap<String, (Rc<Unit>, Power)>,
}

impl Units {
    /// The empty, dimensionless unit expression.
    pub fn dimensionless() -> Self {
        Self {
            factors: BTreeMap::new(),
        }
    }

    /// A unit expression consisting of a single unit with exponent 1.
    pub fn from_unit(unit: Rc<Unit>) -> Self {
        let mut factors = BTreeMap::new();
        factors.insert(unit.name().to_string(), (unit, Power::from_integer(1)));
        Self { factors }
    }

    /// Build a unit expression from (unit, exponent) pairs.
    ///
    /// Zero exponents are dropped; repeated units accumulate.
    pub fn from_factors(pairs: impl IntoIterator<Item = (Rc<Unit>, Power)>) -> Self {
        let mut units = Self::dimensionless();
        for (unit, power) in pairs {
            units.apply(unit, power);
        }
        units
    }

    /// Whether this expression contains no units at all.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Iterate over the constituent units and their exponents.
    pub fn factors(&self) -> impl Iterator<Item = (&Rc<Unit>, &Power)> {
        self.factors.values().map(|(u, p)| (u, p))
    }

    fn apply(&mut self, unit: Rc<Unit>, power: Power) {
        let key = unit.name().to_string();
        let entry = self
            .factors
            .entry(key.clone())
            .or_insert_with(|| (unit, Power::from_integer(0)));
        entry.1 += power;
        if entry.1 == Power::from_integer(0) {
            self.factors.remove(&key);
        }
    }

    /// Multiply by another unit expression, combining exponents additively.
    pub fn mul(&self, other: &Units) -> Units {
        let mut result = self.clone();
        for (unit, power) in other.factors() {
            result.apply(Rc::clone(unit), *power);
        }
        result
    }

    /// Divide by another unit expression, combining exponents subtractively.
    pub fn div(&self, other: &Units) -> Units {
        let mut result = self.clone();
        for (unit, power) in other.factors() {
            result.apply(Rc::clone(unit), -*power);
        }
        result
    }

    /// Raise the expression to a rational power, scaling every exponent.
    pub fn pow(&self, power: Power) -> Units {
        if power == Power::from_integer(0) {
            return Units::dimensionless();
        }
        let factors = self
            .factors
            .iter()
            .map(|(name, (unit, p))| (name.clone(), (Rc::clone(unit), p * power)))
            .collect();
        Units { factors }
    }

    /// Raise the expression to an integer power.
    pub fn powi(&self, power: i64) -> Units {
        self.pow(Power::from_integer(power))
    }

    /// The derived dimension vector: the weighted sum of each constituent
    /// unit's dimension vector times its exponent, with zero results dropped.
    pub fn dimensions(&self) -> DimVec {
        let mut dims = DimVec::new();
        for (unit, power) in self.factors() {
            for (dim, order) in unit.dimensions() {
                let entry = dims
                    .entry(dim.clone())
                    .or_insert_with(|| Power::from_integer(0));
                *entry += order * power;
            }
        }
        dims.retain(|_, v| *v != Power::from_integer(0));
        dims
    }

    /// The relative scale of the expression: the product of each constituent
    /// unit's `rel` raised to its exponent.
    pub fn rel(&self) -> f64 {
        self.factors()
            .map(|(unit, power)| unit.rel().powf(power_to_f64(power)))
            .product()
    }

    /// The float `s` such that `value_in_self_units * s == value_in_other_units`.
    ///
    /// Fails with [`Error::UnitConversion`] unless the two expressions have
    /// matching dimension vectors. Deliberate cross-dimension conversions go
    /// through [`UnitCatalog::scale`](crate::units::UnitCatalog::scale),
    /// which consults the active context.
    pub fn scale(&self, other: &Units) -> Result<f64> {
        if self.dimensions() != other.dimensions() {
            return Err(Error::UnitConversion {
                from: self.to_string(),
                to: other.to_string(),
            });
        }
        Ok(self.rel() / other.rel())
    }

    /// The canonical string rendering: units sorted by name, positive terms
    /// first joined with `*`, negative terms appended after `/`.
    pub fn canonical(&self) -> String {
        let mut output = String::new();
        let mut first = true;
        for (unit, power) in self.factors() {
            if *power > Power::from_integer(0) {
                if !first {
                    output.push('*');
                }
                first = false;
                output.push_str(unit.label());
                if *power != Power::from_integer(1) {
                    output.push_str(&format!("^{}", power));
                }
            }
        }
        for (unit, power) in self.factors() {
            if *power < Power::from_integer(0) {
                output.push('/');
                output.push_str(unit.label());
                let abs = -*power;
                if abs != Power::from_integer(1) {
                    output.push_str(&format!("^{}", abs));
                }
            }
        }
        output
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl PartialEq for Units {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Units {}

impl Hash for Units {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metre() -> Rc<Unit> {
        Rc::new(
            Unit::new("metre", 1.0)
                .with_abbr("m")
                .with_dimension("length", 1),
        )
    }

    fn second() -> Rc<Unit> {
        Rc::new(
            Unit::new("second", 1.0)
                .with_abbr("s")
                .with_dimension("time", 1),
        )
    }

    fn kilometre() -> Rc<Unit> {
        Rc::new(
            Unit::new("kilometre", 1e3)
                .with_abbr("km")
                .with_dimension("length", 1),
        )
    }

    #[test]
    fn test_canonical_rendering() {
        let m_per_s2 = Units::from_factors([
            (metre(), Power::from_integer(1)),
            (second(), Power::from_integer(-2)),
        ]);
        assert_eq!(m_per_s2.canonical(), "m/s^2");

        let m2 = Units::from_unit(metre()).powi(2);
        assert_eq!(m2.canonical(), "m^2");

        assert_eq!(Units::dimensionless().canonical(), "");
    }

    #[test]
    fn test_mul_div_cancellation() {
        let m = Units::from_unit(metre());
        let s = Units::from_unit(second());

        let speed = m.div(&s);
        let back = speed.mul(&s);
        assert_eq!(back, m);

        let nothing = m.div(&m);
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_dimension_additivity() {
        let m = Units::from_unit(metre());
        let s = Units::from_unit(second());

        let accel = m.div(&s.powi(2));
        let dims = accel.dimensions();
        assert_eq!(dims.get("length"), Some(&Power::from_integer(1)));
        assert_eq!(dims.get("time"), Some(&Power::from_integer(-2)));

        // Fractional exponents combine exactly.
        let half = m.pow(Power::new(1, 2));
        let dims = half.mul(&half).dimensions();
        assert_eq!(dims.get("length"), Some(&Power::from_integer(1)));
    }

    #[test]
    fn test_scale_multiplicativity() {
        let m = Units::from_unit(metre());
        let km = Units::from_unit(kilometre());
        let s = Units::from_unit(second());

        assert_relative_eq!(km.mul(&s).rel(), km.rel() * s.rel());
        assert_relative_eq!(km.powi(2).rel(), km.rel().powi(2));

        // 1 km = 1000 m
        assert_relative_eq!(km.scale(&m).unwrap(), 1e3);
        assert_relative_eq!(m.scale(&km).unwrap(), 1e-3);
    }

    #[test]
    fn test_scale_rejects_dimension_mismatch() {
        let m = Units::from_unit(metre());
        let s = Units::from_unit(second());
        assert!(matches!(
            m.scale(&s),
            Err(Error::UnitConversion { .. })
        ));
    }

    #[test]
    fn test_equality_on_canonical_form() {
        let a = Units::from_unit(metre()).div(&Units::from_unit(second()));
        let b = Units::from_factors([
            (second(), Power::from_integer(-1)),
            (metre(), Power::from_integer(1)),
        ]);
        assert_eq!(a, b);
    }
}
