//! Quantities: numeric values attached to units
//!
//! A [`Quantity`] pairs a [`Value`] (scalar or one-dimensional array) with a
//! [`Units`] expression and an `absolute` flag. Arithmetic follows the unit
//! algebra; conversions consult a [`UnitCatalog`] so registered nonlinear
//! conversion maps (temperature, decibels) take precedence over linear
//! rescaling.

use std::fmt;

use ndarray::Array1;

use crate::error::{Error, Result};
use crate::units::{Power, UnitCatalog, Units};

/// A scalar or elementwise array value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(Array1<f64>),
}

impl Value {
    /// Apply a function to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Array(a) => Value::Array(a.mapv(f)),
        }
    }

    /// Combine two values elementwise, broadcasting scalars.
    pub fn zip(&self, other: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            (Value::Scalar(a), Value::Array(b)) => Ok(Value::Array(b.mapv(|x| f(*a, x)))),
            (Value::Array(a), Value::Scalar(b)) => Ok(Value::Array(a.mapv(|x| f(x, *b)))),
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Err(Error::QuantityCoercion(format!(
                        "array lengths differ: {} vs {}",
                        a.len(),
                        b.len()
                    )));
                }
                Ok(Value::Array(Array1::from_iter(
                    a.iter().zip(b.iter()).map(|(x, y)| f(*x, *y)),
                )))
            }
        }
    }

    /// Whether any element is NaN.
    pub fn has_nan(&self) -> bool {
        match self {
            Value::Scalar(v) => v.is_nan(),
            Value::Array(a) => a.iter().any(|v| v.is_nan()),
        }
    }

    /// The scalar value, if this is not an array.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    fn truncated(&self) -> Value {
        self.map(truncate)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Array1<f64>> for Value {
    fn from(a: Array1<f64>) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(Array1::from_vec(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{}", v),
            Value::Array(a) => write!(f, "{}", a),
        }
    }
}

/// Round to ten significant figures past the leading digit, so float noise
/// from chained conversions does not break equality.
fn truncate(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let decimals = 10 - value.abs().log10().floor() as i32;
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// A value with units.
///
/// `absolute` marks quantities measured from a physical zero point rather
/// than as differences; it selects the conversion map used for units with
/// offset scales (a temperature of 0 degC is 273.15 K, a temperature
/// difference of 0 degC is 0 K).
///
/// # Examples
///
/// ```
/// use dimparams::quantity::Quantity;
/// use dimparams::units::UnitCatalog;
///
/// let catalog = UnitCatalog::si();
/// let distance = Quantity::parse(1.5, "km", &catalog).unwrap();
/// let in_metres = distance.to(&catalog.parse("m").unwrap(), &catalog).unwrap();
/// assert_eq!(in_metres.value().as_scalar(), Some(1500.0));
/// ```
#[derive(Debug, Clone)]
pub struct Quantity {
    value: Value,
    units: Units,
    absolute: bool,
}

impl Quantity {
    /// Create a quantity; NaN values are rejected.
    pub fn new(value: impl Into<Value>, units: Units) -> Result<Self> {
        let value = value.into();
        if value.has_nan() {
            return Err(Error::QuantityValue("value is NaN".to_string()));
        }
        Ok(Self {
            value,
            units,
            absolute: false,
        })
    }

    /// Create a quantity with units parsed from a string.
    pub fn parse(value: impl Into<Value>, units: &str, catalog: &UnitCatalog) -> Result<Self> {
        Self::new(value, catalog.parse(units)?)
    }

    /// Create a dimensionless quantity.
    pub fn dimensionless(value: impl Into<Value>) -> Result<Self> {
        Self::new(value, Units::dimensionless())
    }

    /// Mark the quantity as absolute.
    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }

    /// Replace the units without rescaling the value. This redeclares what
    /// the number means; use [`to`](Quantity::to) to convert instead.
    pub fn with_units(&self, units: Units) -> Quantity {
        Self {
            value: self.value.clone(),
            units,
            absolute: self.absolute,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    fn build(value: Value, units: Units, absolute: bool) -> Self {
        Self {
            value,
            units,
            absolute,
        }
    }

    /// Convert into the given units through the catalog.
    ///
    /// A registered conversion map matching the context and absolute flag
    /// takes precedence; otherwise the value is rescaled linearly, with
    /// context scalings permitted for cross-dimension conversions.
    pub fn to(&self, units: &Units, catalog: &UnitCatalog) -> Result<Quantity> {
        if let Some(map) = catalog.conversion_map(&self.units, units, self.absolute) {
            return Ok(Self::build(
                self.value.map(|v| map(v)),
                units.clone(),
                self.absolute,
            ));
        }
        let scale = catalog.scale(&self.units, units)?;
        Ok(Self::build(
            self.value.map(|v| v * scale),
            units.clone(),
            self.absolute,
        ))
    }

    /// Convert into the canonical basis units of this quantity's dimensions.
    pub fn basis(&self, catalog: &UnitCatalog) -> Result<Quantity> {
        let basis = catalog.basis_units(&self.units.dimensions())?;
        self.to(&basis, catalog)
    }

    /// Add a dimension-compatible quantity; the result keeps these units.
    ///
    /// The result is absolute when exactly one operand is absolute: a point
    /// plus a difference is a point, two differences sum to a difference,
    /// and adding two points has no physical meaning but degrades to a
    /// difference as the least wrong reading.
    pub fn add(&self, other: &Quantity) -> Result<Quantity> {
        let scale = other.units.scale(&self.units)?;
        Ok(Self::build(
            self.value.zip(&other.value, |a, b| a + b * scale)?,
            self.units.clone(),
            self.absolute ^ other.absolute,
        ))
    }

    /// Subtract a dimension-compatible quantity; the result keeps these units.
    pub fn sub(&self, other: &Quantity) -> Result<Quantity> {
        let scale = other.units.scale(&self.units)?;
        Ok(Self::build(
            self.value.zip(&other.value, |a, b| a - b * scale)?,
            self.units.clone(),
            self.absolute ^ other.absolute,
        ))
    }

    /// Multiply, combining units through the algebra.
    pub fn mul(&self, other: &Quantity) -> Result<Quantity> {
        Ok(Self::build(
            self.value.zip(&other.value, |a, b| a * b)?,
            self.units.mul(&other.units),
            self.absolute ^ other.absolute,
        ))
    }

    /// Divide, combining units through the algebra.
    ///
    /// Dividing one absolute quantity by another has no meaning and fails.
    pub fn div(&self, other: &Quantity) -> Result<Quantity> {
        if self.absolute && other.absolute {
            return Err(Error::QuantityCoercion(
                "cannot divide two absolute quantities".to_string(),
            ));
        }
        Ok(Self::build(
            self.value.zip(&other.value, |a, b| a / b)?,
            self.units.div(&other.units),
            self.absolute ^ other.absolute,
        ))
    }

    /// Raise to a rational power, raising the units with the value.
    pub fn pow(&self, power: Power) -> Quantity {
        let exponent = *power.numer() as f64 / *power.denom() as f64;
        Self::build(
            self.value.map(|v| v.powf(exponent)),
            self.units.pow(power),
            self.absolute,
        )
    }

    /// Reduce to a bare dimensionless float, for use as an exponent.
    pub fn exponent(&self, catalog: &UnitCatalog) -> Result<f64> {
        let reduced = self.to(&Units::dimensionless(), catalog)?;
        reduced.value.as_scalar().ok_or_else(|| {
            Error::QuantityCoercion("an exponent must be a scalar".to_string())
        })
    }

    /// Equality up to unit conversion and significant-figure truncation.
    ///
    /// Incompatible dimensions compare unequal rather than failing.
    pub fn approx_eq(&self, other: &Quantity) -> bool {
        match other.units.scale(&self.units) {
            Ok(scale) => {
                self.value.truncated() == other.value.map(|v| v * scale).truncated()
            }
            Err(_) => false,
        }
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(other)
    }
}

impl PartialOrd for Quantity {
    /// Ordering for scalar quantities; arrays and incompatible dimensions
    /// are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let scale = other.units.scale(&self.units).ok()?;
        let a = truncate(self.value.as_scalar()?);
        let b = truncate(other.value.as_scalar()? * scale);
        a.partial_cmp(&b)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.units.canonical();
        if units.is_empty() {
            write!(f, "{} units", self.value)
        } else {
            write!(f, "{} {}", self.value, units)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn catalog() -> UnitCatalog {
        UnitCatalog::si()
    }

    fn q(value: f64, units: &str, catalog: &UnitCatalog) -> Quantity {
        Quantity::parse(value, units, catalog).unwrap()
    }

    #[test]
    fn test_nan_rejected() {
        let catalog = catalog();
        assert!(matches!(
            Quantity::parse(f64::NAN, "m", &catalog),
            Err(Error::QuantityValue(_))
        ));
    }

    #[test]
    fn test_round_trip_conversion() {
        let catalog = catalog();
        let ms = catalog.parse("m/s").unwrap();
        let mi_h = catalog.parse("mi/hour").unwrap();

        let speed = q(10.0, "m/s", &catalog);
        let back = speed.to(&mi_h, &catalog).unwrap().to(&ms, &catalog).unwrap();
        assert!(speed.approx_eq(&back));
    }

    #[test]
    fn test_addition_with_scaling() {
        let catalog = catalog();
        let total = q(1.0, "km", &catalog).add(&q(500.0, "m", &catalog)).unwrap();
        assert_eq!(total.units(), &catalog.parse("km").unwrap());
        assert_relative_eq!(total.value().as_scalar().unwrap(), 1.5);

        assert!(q(1.0, "km", &catalog).add(&q(1.0, "s", &catalog)).is_err());
    }

    #[test]
    fn test_absolute_flag_arithmetic() {
        let catalog = catalog();
        let point = q(300.0, "K", &catalog).absolute();
        let delta = q(10.0, "K", &catalog);

        assert!(point.add(&delta).unwrap().is_absolute());
        assert!(point.sub(&point).unwrap().is_absolute() == false);
        assert!(!delta.add(&delta).unwrap().is_absolute());
        assert!(point.div(&point).is_err());
    }

    #[test]
    fn test_mul_div_units() {
        let catalog = catalog();
        let distance = q(6.0, "m", &catalog);
        let time = q(2.0, "s", &catalog);

        let speed = distance.div(&time).unwrap();
        assert_relative_eq!(speed.value().as_scalar().unwrap(), 3.0);
        assert_eq!(speed.units(), &catalog.parse("m/s").unwrap());

        let area = distance.mul(&distance).unwrap();
        assert_eq!(area.units(), &catalog.parse("m^2").unwrap());
    }

    #[test]
    fn test_pow() {
        let catalog = catalog();
        let side = q(3.0, "m", &catalog);
        let volume = side.pow(Power::from_integer(3));
        assert_relative_eq!(volume.value().as_scalar().unwrap(), 27.0);
        assert_eq!(volume.units(), &catalog.parse("m^3").unwrap());

        let root = volume.pow(Power::new(1, 3));
        assert!(root.approx_eq(&side));
    }

    #[test]
    fn test_temperature_conversion_maps() {
        let catalog = catalog();
        let k = catalog.parse("K").unwrap();
        let f = catalog.parse("degF").unwrap();

        let boiling = q(100.0, "degC", &catalog).absolute();
        let in_f = boiling.to(&f, &catalog).unwrap();
        assert_relative_eq!(in_f.value().as_scalar().unwrap(), 212.0);
        let in_k = boiling.to(&k, &catalog).unwrap();
        assert_relative_eq!(in_k.value().as_scalar().unwrap(), 373.15);

        // A temperature difference converts without the offset.
        let delta = q(100.0, "degC", &catalog);
        let delta_k = delta.to(&k, &catalog).unwrap();
        assert_relative_eq!(delta_k.value().as_scalar().unwrap(), 100.0);
    }

    #[test]
    fn test_quantum_context_conversion() {
        let mut catalog = catalog();
        catalog.set_context(Some("quantum")).unwrap();
        let hz = catalog.parse("Hz").unwrap();

        let energy = q(1.0, "eV", &catalog);
        let freq = energy.to(&hz, &catalog).unwrap();
        assert_relative_eq!(
            freq.value().as_scalar().unwrap(),
            2.417_989e14,
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_array_values() {
        let catalog = catalog();
        let distances =
            Quantity::new(vec![1.0, 2.0, 3.0], catalog.parse("km").unwrap()).unwrap();
        let m = catalog.parse("m").unwrap();
        let converted = distances.to(&m, &catalog).unwrap();
        match converted.value() {
            Value::Array(a) => {
                assert_relative_eq!(a[0], 1000.0);
                assert_relative_eq!(a[2], 3000.0);
            }
            Value::Scalar(_) => panic!("expected an array"),
        }
    }

    #[test]
    fn test_equality_truncates_noise() {
        let catalog = catalog();
        let a = q(0.1 + 0.2, "m", &catalog);
        let b = q(0.3, "m", &catalog);
        assert!(a.approx_eq(&b));
        assert!(!q(1.0, "m", &catalog).approx_eq(&q(1.0, "s", &catalog)));
    }

    #[test]
    fn test_ordering() {
        let catalog = catalog();
        assert!(q(1.0, "km", &catalog) > q(500.0, "m", &catalog));
        assert!(q(1.0, "m", &catalog).partial_cmp(&q(1.0, "s", &catalog)).is_none());
    }

    #[test]
    fn test_basis() {
        let catalog = catalog();
        let force = q(1.0, "N", &catalog);
        let basis = force.basis(&catalog).unwrap();
        assert_eq!(basis.units(), &catalog.parse("kg*m/s^2").unwrap());
        assert_relative_eq!(basis.value().as_scalar().unwrap(), 1.0);
    }
}
