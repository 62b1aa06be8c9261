//! Atomic unit definitions
//!
//! This module provides the [`Unit`] struct, the fundamental building block of
//! the unit algebra. A `Unit` is an immutable named unit with a scale factor
//! relative to the catalog basis and a sparse dimension vector. Units are
//! constructed with a builder-style API and then owned by the
//! [`UnitCatalog`](crate::units::UnitCatalog) that registers them.

use std::collections::BTreeMap;
use std::fmt;

use num_rational::Ratio;

/// Rational exponent used throughout the unit algebra.
pub type Power = Ratio<i64>;

/// Sparse dimension vector: dimension name -> rational exponent.
///
/// Entries with exponent zero are never stored.
pub type DimVec = BTreeMap<String, Power>;

/// Convert a rational power to a float for scale arithmetic.
pub(crate) fn power_to_f64(p: &Power) -> f64 {
    *p.numer() as f64 / *p.denom() as f64
}

/// An SI-style prefix: full name, abbreviation, and multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Prefix {
    pub name: String,
    pub abbr: String,
    pub multiplier: f64,
}

impl Prefix {
    pub fn new(name: &str, abbr: &str, multiplier: f64) -> Self {
        Self {
            name: name.to_string(),
            abbr: abbr.to_string(),
            multiplier,
        }
    }
}

/// An immutable named unit.
///
/// A unit has one or more names (the first is the primary name), zero or more
/// abbreviations, a scale factor `rel` relative to an arbitrary basis, a
/// sparse dimension vector, and a prefixability flag. Prefixed derivatives
/// (e.g. "km" from "m") carry a back-reference to their unprefixed base unit.
///
/// # Examples
///
/// ```
/// use dimparams::units::Unit;
///
/// let metre = Unit::new("metre", 1.0)
///     .with_alias("meter")
///     .with_abbr("m")
///     .with_dimension("length", 1);
/// assert_eq!(metre.name(), "metre");
/// assert_eq!(metre.rel(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    names: Vec<String>,
    abbrs: Vec<String>,
    plural: Option<String>,
    rel: f64,
    prefixable: bool,
    dimensions: DimVec,
    /// Primary name of the unprefixed unit this was derived from, if any.
    base: Option<String>,
}

impl Unit {
    /// Create a new unit with the given primary name and relative scale.
    ///
    /// The unit starts prefixable, dimensionless, and without abbreviations.
    pub fn new(name: &str, rel: f64) -> Self {
        Self {
            names: vec![name.to_string()],
            abbrs: Vec::new(),
            plural: None,
            rel,
            prefixable: true,
            dimensions: DimVec::new(),
            base: None,
        }
    }

    /// Add an alternate name.
    pub fn with_alias(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self
    }

    /// Add an abbreviation.
    pub fn with_abbr(mut self, abbr: &str) -> Self {
        self.abbrs.push(abbr.to_string());
        self
    }

    /// Set the plural form of the primary name.
    pub fn with_plural(mut self, plural: &str) -> Self {
        self.plural = Some(plural.to_string());
        self
    }

    /// Add a dimension with an integer exponent.
    ///
    /// Zero exponents are dropped rather than stored.
    pub fn with_dimension(mut self, dimension: &str, power: i64) -> Self {
        if power != 0 {
            self.dimensions
                .insert(dimension.to_string(), Power::from_integer(power));
        }
        self
    }

    /// Add a dimension with a rational exponent.
    pub fn with_dimension_power(mut self, dimension: &str, power: Power) -> Self {
        if power != Power::from_integer(0) {
            self.dimensions.insert(dimension.to_string(), power);
        }
        self
    }

    /// Mark the unit as not accepting prefixes.
    pub fn no_prefix(mut self) -> Self {
        self.prefixable = false;
        self
    }

    /// Derive the prefixed variant of this unit.
    ///
    /// The derived unit is never itself prefixable, carries the multiplied
    /// scale, and remembers this unit as its base.
    pub(crate) fn prefixed(&self, prefix: &Prefix) -> Unit {
        Unit {
            names: self
                .names
                .iter()
                .map(|n| format!("{}{}", prefix.name, n))
                .collect(),
            abbrs: self
                .abbrs
                .iter()
                .map(|a| format!("{}{}", prefix.abbr, a))
                .collect(),
            plural: self
                .plural
                .as_ref()
                .map(|p| format!("{}{}", prefix.name, p)),
            rel: self.rel * prefix.multiplier,
            prefixable: false,
            dimensions: self.dimensions.clone(),
            base: Some(self.name().to_string()),
        }
    }

    /// The primary name of the unit.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    /// All names of the unit, primary first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All abbreviations of the unit.
    pub fn abbrs(&self) -> &[String] {
        &self.abbrs
    }

    /// The preferred short label: first abbreviation, falling back to the
    /// primary name.
    pub fn label(&self) -> &str {
        self.abbrs.first().map(String::as_str).unwrap_or(self.name())
    }

    /// The plural form, if declared.
    pub fn plural(&self) -> Option<&str> {
        self.plural.as_deref()
    }

    /// The scale factor relative to the catalog basis.
    pub fn rel(&self) -> f64 {
        self.rel
    }

    /// Whether prefixed derivatives should be generated on registration.
    pub fn prefixable(&self) -> bool {
        self.prefixable
    }

    /// The sparse dimension vector of the unit.
    pub fn dimensions(&self) -> &DimVec {
        &self.dimensions
    }

    /// The primary name of the unprefixed base unit, for prefixed derivatives.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Whether the dimension vector is exactly `{dimension: 1}`, which is the
    /// requirement for serving as a basis unit.
    pub fn is_basis_for(&self, dimension: &str) -> bool {
        self.dimensions.len() == 1
            && self.dimensions.get(dimension) == Some(&Power::from_integer(1))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_creation() {
        let metre = Unit::new("metre", 1.0)
            .with_alias("meter")
            .with_abbr("m")
            .with_dimension("length", 1);

        assert_eq!(metre.name(), "metre");
        assert_eq!(metre.names(), &["metre".to_string(), "meter".to_string()]);
        assert_eq!(metre.label(), "m");
        assert_eq!(metre.rel(), 1.0);
        assert!(metre.prefixable());
        assert!(metre.is_basis_for("length"));
        assert!(!metre.is_basis_for("time"));
    }

    #[test]
    fn test_zero_dimension_dropped() {
        let u = Unit::new("odd", 1.0)
            .with_dimension("length", 1)
            .with_dimension("time", 0);
        assert_eq!(u.dimensions().len(), 1);
        assert!(u.dimensions().contains_key("length"));
    }

    #[test]
    fn test_compound_dimension_not_basis() {
        let newton = Unit::new("newton", 1.0)
            .with_abbr("N")
            .with_dimension("mass", 1)
            .with_dimension("length", 1)
            .with_dimension("time", -2);
        assert!(!newton.is_basis_for("mass"));
    }

    #[test]
    fn test_prefixed_derivation() {
        let metre = Unit::new("metre", 1.0)
            .with_alias("meter")
            .with_abbr("m")
            .with_plural("metres")
            .with_dimension("length", 1);
        let kilo = Prefix::new("kilo", "k", 1e3);

        let km = metre.prefixed(&kilo);
        assert_eq!(km.name(), "kilometre");
        assert_eq!(km.names()[1], "kilometer");
        assert_eq!(km.label(), "km");
        assert_eq!(km.plural(), Some("kilometres"));
        assert_eq!(km.rel(), 1e3);
        assert!(!km.prefixable());
        assert_eq!(km.base(), Some("metre"));
        assert_eq!(km.dimensions(), metre.dimensions());
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let bar = Unit::new("bar", 1e5).with_dimension("mass", 1);
        assert_eq!(bar.label(), "bar");
    }
}
