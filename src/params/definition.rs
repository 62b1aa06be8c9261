//! Parameter definitions and value specifications
//!
//! Values arrive at the store in many shapes (bare numbers, arrays,
//! `(value, unit)` pairs, quantities, functions, expression strings); the
//! [`ValueSpec`] enum makes the accepted shapes explicit. A stored
//! definition is either a constant [`Quantity`] or a [`ParamFn`], a callable
//! with a declared dependency contract.

use std::fmt;
use std::rc::Rc;

use ndarray::Array1;

use crate::error::{Error, Result};
use crate::params::expression::Expression;
use crate::quantity::{Quantity, Value};

/// A declared dependency of a functional definition.
///
/// The form is part of the contract: a scaled reference receives the bare
/// non-dimensionalised value, a dimensional reference receives the full
/// [`Quantity`]. The form is fixed at declaration and does not move with
/// the store's `default_scaled` flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamRef {
    Scaled(String),
    Dimensional(String),
}

impl ParamRef {
    /// Parse the underscore convention: `"_x"` is the dimensional form of
    /// `x` under scaled defaults, written here as an explicit variant.
    pub fn from_key(key: &str) -> Self {
        match key.strip_prefix('_') {
            Some(name) => ParamRef::Dimensional(name.to_string()),
            None => ParamRef::Scaled(key.to_string()),
        }
    }

    /// The bare parameter name.
    pub fn name(&self) -> &str {
        match self {
            ParamRef::Scaled(name) | ParamRef::Dimensional(name) => name,
        }
    }

    /// Whether this reference requests the scaled form.
    pub fn is_scaled(&self) -> bool {
        matches!(self, ParamRef::Scaled(_))
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRef::Scaled(name) => write!(f, "{}", name),
            ParamRef::Dimensional(name) => write!(f, "_{}", name),
        }
    }
}

/// An argument delivered to a functional definition, in the form its
/// [`ParamRef`] declared.
#[derive(Debug, Clone)]
pub enum FnArg {
    Scaled(Value),
    Dimensional(Quantity),
}

impl FnArg {
    /// The scalar payload, when the argument is a scaled scalar.
    pub fn as_scalar(&self) -> Result<f64> {
        match self {
            FnArg::Scaled(value) => value.as_scalar().ok_or_else(|| {
                Error::QuantityCoercion("expected a scalar argument, got an array".to_string())
            }),
            FnArg::Dimensional(_) => Err(Error::QuantityCoercion(
                "expected a scaled argument, got a quantity".to_string(),
            )),
        }
    }

    /// The scaled value payload.
    pub fn as_value(&self) -> Result<&Value> {
        match self {
            FnArg::Scaled(value) => Ok(value),
            FnArg::Dimensional(_) => Err(Error::QuantityCoercion(
                "expected a scaled argument, got a quantity".to_string(),
            )),
        }
    }

    /// The quantity payload.
    pub fn as_quantity(&self) -> Result<&Quantity> {
        match self {
            FnArg::Dimensional(quantity) => Ok(quantity),
            FnArg::Scaled(_) => Err(Error::QuantityCoercion(
                "expected a quantity argument, got a scaled value".to_string(),
            )),
        }
    }

    /// A stable rendering used to fingerprint memoized function calls.
    pub(crate) fn fingerprint(&self) -> String {
        match self {
            FnArg::Scaled(value) => format!("s:{:?}", value),
            FnArg::Dimensional(quantity) => {
                format!("d:{:?}:{}", quantity.value(), quantity.units())
            }
        }
    }
}

/// The result of calling a functional definition.
#[derive(Debug, Clone)]
pub enum FnOutput {
    /// The forward value of the parameter itself.
    Single(ValueSpec),
    /// Inverse results: one value per declared dependency, in declaration
    /// order.
    Inverse(Vec<ValueSpec>),
}

type ForwardFn = dyn Fn(&[FnArg]) -> Result<FnOutput>;

/// A functional parameter definition with a declared dependency contract.
///
/// The closure is called with one argument per entry of `deps`, each in its
/// declared form. An invertible definition is additionally called with a
/// trailing argument holding the parameter's own value, and must then return
/// [`FnOutput::Inverse`] with one value per dependency.
#[derive(Clone)]
pub struct ParamFn {
    deps: Vec<ParamRef>,
    own: Option<ParamRef>,
    forward: Rc<ForwardFn>,
    source: Option<String>,
}

impl fmt::Debug for ParamFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamFn")
            .field("deps", &self.deps)
            .field("own", &self.own)
            .field("source", &self.source)
            .finish()
    }
}

impl ParamFn {
    /// A non-invertible functional definition.
    pub fn new(
        deps: Vec<ParamRef>,
        forward: impl Fn(&[FnArg]) -> Result<FnOutput> + 'static,
    ) -> Self {
        Self {
            deps,
            own: None,
            forward: Rc::new(forward),
            source: None,
        }
    }

    /// An invertible functional definition. `own` declares the form in
    /// which the parameter's own value is delivered for the inverse call.
    pub fn invertible(
        deps: Vec<ParamRef>,
        own: ParamRef,
        forward: impl Fn(&[FnArg]) -> Result<FnOutput> + 'static,
    ) -> Self {
        Self {
            deps,
            own: Some(own),
            forward: Rc::new(forward),
            source: None,
        }
    }

    /// Compile an expression string into a (non-invertible) definition.
    ///
    /// Free variables become scaled dependencies; an underscore prefix
    /// requests the dimensional form, accepted at evaluation only when the
    /// quantity turns out dimensionless.
    pub fn compile(source: &str) -> Result<Self> {
        let expression = Expression::parse(source)?;
        // A lone identifier is a lookup, not a definition.
        if matches!(expression, Expression::Variable(_)) {
            return Err(Error::ExpressionOptimisation(source.to_string()));
        }
        let keys = expression.variables();
        let deps: Vec<ParamRef> = keys.iter().map(|k| ParamRef::from_key(k)).collect();

        let eval_deps = deps.clone();
        let forward = move |args: &[FnArg]| -> Result<FnOutput> {
            evaluate_elementwise(&expression, &eval_deps, args)
        };

        Ok(Self {
            deps,
            own: None,
            forward: Rc::new(forward),
            source: Some(source.to_string()),
        })
    }

    /// The declared dependencies, in call order.
    pub fn deps(&self) -> &[ParamRef] {
        &self.deps
    }

    /// The declared form of the parameter's own value, for invertible
    /// definitions.
    pub fn own(&self) -> Option<&ParamRef> {
        self.own.as_ref()
    }

    pub fn is_invertible(&self) -> bool {
        self.own.is_some()
    }

    /// The expression string this definition was compiled from, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Evaluate the forward (or, with a trailing own-value argument,
    /// inverse) direction.
    pub fn call(&self, args: &[FnArg]) -> Result<FnOutput> {
        (self.forward)(args)
    }
}

/// Evaluate an expression over scaled arguments, broadcasting scalars
/// across arrays elementwise.
fn evaluate_elementwise(
    expression: &Expression,
    deps: &[ParamRef],
    args: &[FnArg],
) -> Result<FnOutput> {
    use std::collections::HashMap;

    let mut scalars: HashMap<String, f64> = HashMap::new();
    let mut arrays: Vec<(String, &Array1<f64>)> = Vec::new();

    for (dep, arg) in deps.iter().zip(args) {
        let key = dep.to_string();
        let value = match arg {
            FnArg::Scaled(value) => value,
            // Quantities survive only once stripped of their dimensions.
            FnArg::Dimensional(q) if q.units().dimensions().is_empty() => q.value(),
            FnArg::Dimensional(_) => {
                return Err(Error::QuantityCoercion(format!(
                    "dimensional reference '{}' is not dimensionless and cannot \
                     enter an expression",
                    key
                )))
            }
        };
        match value {
            Value::Scalar(v) => {
                scalars.insert(key, *v);
            }
            Value::Array(a) => arrays.push((key, a)),
        }
    }

    if arrays.is_empty() {
        let result = expression.evaluate(&scalars)?;
        return Ok(FnOutput::Single(ValueSpec::Scalar(result)));
    }

    let len = arrays[0].1.len();
    if arrays.iter().any(|(_, a)| a.len() != len) {
        return Err(Error::QuantityCoercion(
            "array arguments to an expression must share a length".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(len);
    for i in 0..len {
        let mut context = scalars.clone();
        for (key, array) in &arrays {
            context.insert(key.clone(), array[i]);
        }
        results.push(expression.evaluate(&context)?);
    }
    Ok(FnOutput::Single(ValueSpec::Array(Array1::from_vec(
        results,
    ))))
}

/// A value specification accepted by the store.
#[derive(Debug, Clone)]
pub enum ValueSpec {
    /// A bare number, interpreted as a scaled value in the parameter's
    /// declared units.
    Scalar(f64),
    /// A bare array of scaled values.
    Array(Array1<f64>),
    /// A `(value, unit-string)` pair.
    Pair(Value, String),
    /// A fully-formed quantity.
    Quantity(Quantity),
    /// A functional definition.
    Function(ParamFn),
    /// An expression string, compiled on assignment or evaluation.
    Expression(String),
}

impl ValueSpec {
    pub fn is_function(&self) -> bool {
        matches!(self, ValueSpec::Function(_) | ValueSpec::Expression(_))
    }
}

impl From<f64> for ValueSpec {
    fn from(v: f64) -> Self {
        ValueSpec::Scalar(v)
    }
}

impl From<Array1<f64>> for ValueSpec {
    fn from(a: Array1<f64>) -> Self {
        ValueSpec::Array(a)
    }
}

impl From<Vec<f64>> for ValueSpec {
    fn from(v: Vec<f64>) -> Self {
        ValueSpec::Array(Array1::from_vec(v))
    }
}

impl From<(f64, &str)> for ValueSpec {
    fn from((v, u): (f64, &str)) -> Self {
        ValueSpec::Pair(Value::Scalar(v), u.to_string())
    }
}

impl From<(Vec<f64>, &str)> for ValueSpec {
    fn from((v, u): (Vec<f64>, &str)) -> Self {
        ValueSpec::Pair(Value::Array(Array1::from_vec(v)), u.to_string())
    }
}

impl From<Quantity> for ValueSpec {
    fn from(q: Quantity) -> Self {
        ValueSpec::Quantity(q)
    }
}

impl From<ParamFn> for ValueSpec {
    fn from(f: ParamFn) -> Self {
        ValueSpec::Function(f)
    }
}

impl From<&str> for ValueSpec {
    fn from(s: &str) -> Self {
        ValueSpec::Expression(s.to_string())
    }
}

/// A stored parameter definition.
#[derive(Debug, Clone)]
pub enum Definition {
    Constant(Quantity),
    Function(ParamFn),
}

impl Definition {
    pub fn is_function(&self) -> bool {
        matches!(self, Definition::Function(_))
    }
}

/// A retrieved parameter value: scaled or dimensional, per the request.
#[derive(Debug, Clone)]
pub enum Retrieved {
    Scaled(Value),
    Quantity(Quantity),
}

impl Retrieved {
    /// The scaled scalar, when the retrieval produced one.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Retrieved::Scaled(value) => value.as_scalar(),
            Retrieved::Quantity(_) => None,
        }
    }

    /// The scaled value, when the retrieval produced one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Retrieved::Scaled(value) => Some(value),
            Retrieved::Quantity(_) => None,
        }
    }

    /// The quantity, when the retrieval produced one.
    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Retrieved::Quantity(quantity) => Some(quantity),
            Retrieved::Scaled(_) => None,
        }
    }

    /// Convert into the argument form a [`ParamRef`] declared.
    pub(crate) fn into_arg(self) -> FnArg {
        match self {
            Retrieved::Scaled(value) => FnArg::Scaled(value),
            Retrieved::Quantity(quantity) => FnArg::Dimensional(quantity),
        }
    }
}

impl fmt::Display for Retrieved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retrieved::Scaled(value) => write!(f, "{}", value),
            Retrieved::Quantity(quantity) => write!(f, "{}", quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_ref_forms() {
        assert_eq!(ParamRef::from_key("x"), ParamRef::Scaled("x".to_string()));
        assert_eq!(
            ParamRef::from_key("_x"),
            ParamRef::Dimensional("x".to_string())
        );
        assert_eq!(ParamRef::from_key("_x").name(), "x");
        assert_eq!(ParamRef::from_key("_x").to_string(), "_x");
    }

    #[test]
    fn test_compile_collects_deps() {
        let f = ParamFn::compile("x^2 + _y").unwrap();
        assert_eq!(
            f.deps(),
            &[
                ParamRef::Dimensional("y".to_string()),
                ParamRef::Scaled("x".to_string()),
            ]
        );
        assert!(!f.is_invertible());
        assert_eq!(f.source(), Some("x^2 + _y"));
    }

    #[test]
    fn test_compile_evaluates() {
        let f = ParamFn::compile("x^2 + y").unwrap();
        let out = f
            .call(&[
                FnArg::Scaled(Value::Scalar(3.0)),
                FnArg::Scaled(Value::Scalar(1.0)),
            ])
            .unwrap();
        match out {
            FnOutput::Single(ValueSpec::Scalar(v)) => assert_eq!(v, 10.0),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_compile_broadcasts_arrays() {
        let f = ParamFn::compile("x * y").unwrap();
        let out = f
            .call(&[
                FnArg::Scaled(Value::Array(Array1::from_vec(vec![1.0, 2.0, 3.0]))),
                FnArg::Scaled(Value::Scalar(2.0)),
            ])
            .unwrap();
        match out {
            FnOutput::Single(ValueSpec::Array(a)) => {
                assert_eq!(a.to_vec(), vec![2.0, 4.0, 6.0]);
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_compile_rejects_bare_identifier() {
        // A lone name has no interpretation as a new definition.
        assert!(matches!(
            ParamFn::compile("x"),
            Err(Error::ExpressionOptimisation(_))
        ));
    }
}
