//! Bound intervals for parameter values
//!
//! A parameter may carry one or more allowed intervals; every value that
//! passes through the store is checked against them. The policy decides
//! what an out-of-bounds value does: raise, clip to the numerically nearest
//! interval edge, or pass with a warning.

use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};
use crate::quantity::{Quantity, Value};

/// The allowed intervals for one parameter, with the violation policy.
#[derive(Debug, Clone)]
pub struct Bounds {
    param: String,
    intervals: Vec<(Quantity, Quantity)>,
    error: bool,
    clip: bool,
    inclusive: bool,
}

impl Bounds {
    /// Bounds for `param`. Intervals are `(lower, upper)` quantities with
    /// units compatible with the parameter.
    ///
    /// Policy: `error` raises on violation, `clip` replaces the value with
    /// the numerically nearest interval edge, and neither merely warns.
    /// `inclusive` admits values equal to an edge.
    pub fn new(
        param: &str,
        intervals: Vec<(Quantity, Quantity)>,
        error: bool,
        clip: bool,
        inclusive: bool,
    ) -> Self {
        Self {
            param: param.to_string(),
            intervals,
            error,
            clip,
            inclusive,
        }
    }

    pub fn intervals(&self) -> &[(Quantity, Quantity)] {
        &self.intervals
    }

    fn admits(&self, value: &Quantity) -> bool {
        self.intervals.iter().any(|(lower, upper)| {
            if self.inclusive {
                lower <= value && value <= upper
            } else {
                lower < value && value < upper
            }
        })
    }

    /// Check a quantity against the bounds, applying the policy.
    pub fn check(&self, value: Quantity) -> Result<Quantity> {
        let scalar_ok = match value.value() {
            Value::Scalar(_) => self.admits(&value),
            Value::Array(a) => {
                // Elementwise: every element must be admitted.
                let mut all = true;
                for v in a.iter() {
                    let element = Quantity::new(*v, value.units().clone())?;
                    if !self.admits(&element) {
                        all = false;
                        break;
                    }
                }
                all
            }
        };

        if scalar_ok {
            return Ok(value);
        }

        if self.clip {
            warn!(
                param = %self.param,
                value = %value,
                bounds = %self,
                "value outside of bounds; clipping to the nearest edge"
            );
            return self.clipped(value);
        }

        if self.error {
            return Err(Error::ParameterOutsideBounds {
                param: self.param.clone(),
                value: value.to_string(),
                bounds: self.to_string(),
            });
        }

        warn!(
            param = %self.param,
            value = %value,
            bounds = %self,
            "value outside of bounds; using it anyway"
        );
        Ok(value)
    }

    fn clipped(&self, value: Quantity) -> Result<Quantity> {
        // Edges expressed in the incoming value's units.
        let mut edges = Vec::with_capacity(self.intervals.len() * 2);
        for (lower, upper) in &self.intervals {
            for edge in [lower, upper] {
                let scale = edge.units().scale(value.units())?;
                if let Some(v) = edge.value().as_scalar() {
                    let scaled = v * scale;
                    if scaled.is_finite() {
                        edges.push(scaled);
                    }
                }
            }
        }
        if edges.is_empty() {
            return Ok(value);
        }

        let nearest = |v: f64| -> f64 {
            let mut best = edges[0];
            for edge in &edges[1..] {
                if (edge - v).abs() < (best - v).abs() {
                    best = *edge;
                }
            }
            best
        };

        let clipped = match value.value() {
            Value::Scalar(v) => {
                let element = Quantity::new(*v, value.units().clone())?;
                if self.admits(&element) {
                    Value::Scalar(*v)
                } else {
                    Value::Scalar(nearest(*v))
                }
            }
            Value::Array(a) => {
                let mut out = a.clone();
                for v in out.iter_mut() {
                    let element = Quantity::new(*v, value.units().clone())?;
                    if !self.admits(&element) {
                        *v = nearest(*v);
                    }
                }
                Value::Array(out)
            }
        };
        Quantity::new(clipped, value.units().clone())
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .intervals
            .iter()
            .map(|(lower, upper)| format!("({}, {})", lower, upper))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitCatalog;

    fn q(value: f64, units: &str, catalog: &UnitCatalog) -> Quantity {
        Quantity::parse(value, units, catalog).unwrap()
    }

    fn metre_bounds(catalog: &UnitCatalog, error: bool, clip: bool) -> Bounds {
        Bounds::new(
            "x",
            vec![(q(0.0, "m", catalog), q(10.0, "m", catalog))],
            error,
            clip,
            false,
        )
    }

    #[test]
    fn test_within_bounds_passes() {
        let catalog = UnitCatalog::si();
        let bounds = metre_bounds(&catalog, true, false);
        let value = q(5.0, "m", &catalog);
        assert!(bounds.check(value.clone()).unwrap().approx_eq(&value));

        // Compatible units are compared through the algebra.
        let value = q(500.0, "cm", &catalog);
        assert!(bounds.check(value.clone()).unwrap().approx_eq(&value));
    }

    #[test]
    fn test_error_policy() {
        let catalog = UnitCatalog::si();
        let bounds = metre_bounds(&catalog, true, false);
        assert!(matches!(
            bounds.check(q(20.0, "m", &catalog)),
            Err(Error::ParameterOutsideBounds { .. })
        ));
    }

    #[test]
    fn test_clip_policy() {
        let catalog = UnitCatalog::si();
        let bounds = metre_bounds(&catalog, true, true);
        let clipped = bounds.check(q(20.0, "m", &catalog)).unwrap();
        assert!(clipped.approx_eq(&q(10.0, "m", &catalog)));

        let clipped = bounds.check(q(-3.0, "m", &catalog)).unwrap();
        assert!(clipped.approx_eq(&q(0.0, "m", &catalog)));
    }

    #[test]
    fn test_warn_policy_keeps_value() {
        let catalog = UnitCatalog::si();
        let bounds = metre_bounds(&catalog, false, false);
        let value = q(20.0, "m", &catalog);
        assert!(bounds.check(value.clone()).unwrap().approx_eq(&value));
    }

    #[test]
    fn test_exclusive_vs_inclusive_edges() {
        let catalog = UnitCatalog::si();
        let exclusive = metre_bounds(&catalog, true, false);
        assert!(exclusive.check(q(10.0, "m", &catalog)).is_err());

        let inclusive = Bounds::new(
            "x",
            vec![(q(0.0, "m", &catalog), q(10.0, "m", &catalog))],
            true,
            false,
            true,
        );
        assert!(inclusive.check(q(10.0, "m", &catalog)).is_ok());
    }

    #[test]
    fn test_disjoint_intervals() {
        let catalog = UnitCatalog::si();
        let bounds = Bounds::new(
            "x",
            vec![
                (q(0.0, "m", &catalog), q(1.0, "m", &catalog)),
                (q(5.0, "m", &catalog), q(6.0, "m", &catalog)),
            ],
            true,
            true,
            false,
        );
        assert!(bounds.check(q(5.5, "m", &catalog)).is_ok());
        // 3.0 is closer to 1.0 than to 5.0; clipping picks 1.0.
        let clipped = bounds.check(q(3.0, "m", &catalog)).unwrap().value().as_scalar();
        assert_eq!(clipped, Some(1.0));
    }

    #[test]
    fn test_array_clipping() {
        let catalog = UnitCatalog::si();
        let bounds = metre_bounds(&catalog, true, true);
        let value =
            Quantity::new(vec![5.0, 20.0, -1.0], catalog.parse("m").unwrap()).unwrap();
        let clipped = bounds.check(value).unwrap();
        match clipped.value() {
            Value::Array(a) => assert_eq!(a.to_vec(), vec![5.0, 10.0, 0.0]),
            Value::Scalar(_) => panic!("expected an array"),
        }
    }
}
