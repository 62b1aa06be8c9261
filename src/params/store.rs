//! The parameter store: dependency resolution, overrides, and scaling
//!
//! A [`ParameterStore`] owns a [`UnitCatalog`] and a set of named parameter
//! definitions, each either a constant [`Quantity`] or a [`ParamFn`] over
//! other parameters. Retrieval resolves the dependency graph on demand,
//! applying temporary overrides, propagating overrides backwards through
//! invertible definitions, checking bounds, and converting between the
//! dimensional and non-dimensionalised (scaled) forms of every value.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::{Error, Result};
use crate::params::bounds::Bounds;
use crate::params::definition::{
    Definition, FnArg, FnOutput, ParamFn, ParamRef, Retrieved, ValueSpec,
};
use crate::params::range::RangeSpec;
use crate::quantity::{Quantity, Value};
use crate::units::{Power, Unit, UnitCatalog, Units};

/// Temporary per-call parameter overrides.
pub type Overrides = HashMap<String, ValueSpec>;

/// State captured by [`ParameterStore::enter_scope`].
#[derive(Clone)]
struct Snapshot {
    catalog: UnitCatalog,
    definitions: HashMap<String, Definition>,
    specs: HashMap<String, Units>,
    scalings: HashMap<String, Quantity>,
    bounds: HashMap<String, Bounds>,
    custom_units: Vec<Unit>,
    deps: HashMap<String, HashSet<String>>,
}

/// The parameter dependency-resolution engine.
///
/// # Examples
///
/// ```
/// use dimparams::params::ParameterStore;
///
/// let mut store = ParameterStore::new();
/// store.set_raw([("x", (2.0, "m").into()), ("y", "x^2".into())]).unwrap();
/// assert_eq!(store.get("y").unwrap().as_scalar(), Some(4.0));
/// ```
pub struct ParameterStore {
    catalog: UnitCatalog,
    default_scaled: bool,
    definitions: HashMap<String, Definition>,
    specs: HashMap<String, Units>,
    scalings: HashMap<String, Quantity>,
    bounds: HashMap<String, Bounds>,
    custom_units: Vec<Unit>,
    deps: HashMap<String, HashSet<String>>,
    scaling_cache: RefCell<HashMap<String, f64>>,
    fn_cache: RefCell<HashMap<(String, String), ValueSpec>>,
    snapshots: Vec<Snapshot>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ParameterStore {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            default_scaled: self.default_scaled,
            definitions: self.definitions.clone(),
            specs: self.specs.clone(),
            scalings: self.scalings.clone(),
            bounds: self.bounds.clone(),
            custom_units: self.custom_units.clone(),
            deps: self.deps.clone(),
            scaling_cache: RefCell::new(HashMap::new()),
            fn_cache: RefCell::new(HashMap::new()),
            snapshots: Vec::new(),
        }
    }
}

impl ParameterStore {
    /// A store over the SI catalog, returning scaled values by default.
    pub fn new() -> Self {
        Self::with_catalog(UnitCatalog::si(), true)
    }

    /// A store over a custom catalog. `default_scaled` decides whether an
    /// unadorned name retrieves the scaled value or the full quantity; a
    /// leading underscore on a name requests the other form.
    pub fn with_catalog(catalog: UnitCatalog, default_scaled: bool) -> Self {
        Self {
            catalog,
            default_scaled,
            definitions: HashMap::new(),
            specs: HashMap::new(),
            scalings: HashMap::new(),
            bounds: HashMap::new(),
            custom_units: Vec::new(),
            deps: HashMap::new(),
            scaling_cache: RefCell::new(HashMap::new()),
            fn_cache: RefCell::new(HashMap::new()),
            snapshots: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    pub fn default_scaled(&self) -> bool {
        self.default_scaled
    }

    fn invalidate(&self) {
        self.scaling_cache.borrow_mut().clear();
        self.fn_cache.borrow_mut().clear();
    }

    ////////// NAME HANDLING ////////////////////////////////////////////////

    fn validate_name(name: &str) -> Result<()> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(Error::ParameterInvalid(format!(
                "'{}' is not a valid parameter name (names match [A-Za-z][A-Za-z0-9_]*; \
                 a leading underscore is the form selector)",
                name
            )))
        }
    }

    /// Split a retrieval key into the bare name and the requested form.
    fn split_key<'a>(&self, key: &'a str) -> (&'a str, bool) {
        match key.strip_prefix('_') {
            Some(name) => (name, !self.default_scaled),
            None => (key, self.default_scaled),
        }
    }

    ////////// RETRIEVAL ////////////////////////////////////////////////////

    /// Retrieve a parameter by key.
    ///
    /// The key addresses the form: under scaled defaults, `"x"` yields the
    /// scaled value and `"_x"` the quantity (and vice versa otherwise). A
    /// key that is not a bare identifier is treated as an expression over
    /// parameters.
    pub fn get(&self, key: &str) -> Result<Retrieved> {
        self.get_with(key, &Overrides::new())
    }

    /// Retrieve a parameter with temporary overrides applied.
    ///
    /// Overriding a dependency of an invertible definition propagates
    /// through the inversion, so dependent parameters stay consistent for
    /// the duration of the call.
    pub fn get_with(&self, key: &str, overrides: &Overrides) -> Result<Retrieved> {
        let (name, _) = self.split_key(key);
        if Self::validate_name(name).is_err() {
            return self.evaluate(key, overrides);
        }
        let mut overrides = self.normalize_overrides(overrides)?;
        self.process_override(&mut overrides, None, false)?;
        self.get_param(key, &overrides)
    }

    /// Retrieve several parameters at once, sharing one override pass.
    /// Results are keyed by bare name.
    pub fn get_many(&self, keys: &[&str], overrides: &Overrides) -> Result<HashMap<String, Retrieved>> {
        let mut overrides = self.normalize_overrides(overrides)?;
        self.process_override(&mut overrides, None, false)?;
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            let (name, _) = self.split_key(key);
            results.insert(name.to_string(), self.get_param(key, &overrides)?);
        }
        Ok(results)
    }

    /// Evaluate an expression string over the current parameters. The
    /// result takes the store's default form.
    pub fn evaluate(&self, expression: &str, overrides: &Overrides) -> Result<Retrieved> {
        let f = ParamFn::compile(expression)?;
        let mut overrides = self.normalize_overrides(overrides)?;
        self.process_override(&mut overrides, None, false)?;
        let spec = self.call_forward(&f, &overrides)?;
        self.coerce(&spec, None, self.default_scaled)
    }

    /// Strip the form selector from override keys, so `"_x"` and `"x"`
    /// address the same parameter. Both forms appearing with values that
    /// disagree is an over-specification.
    fn normalize_overrides(&self, overrides: &Overrides) -> Result<Overrides> {
        let mut normalized = Overrides::with_capacity(overrides.len());
        for (key, spec) in overrides {
            let (name, _) = self.split_key(key);
            if let Some(existing) = normalized.get(name) {
                let agree = !spec.is_function()
                    && !existing.is_function()
                    && self.specs_agree(name, existing, spec)?;
                if !agree {
                    return Err(Error::ParameterOverSpecified(name.to_string()));
                }
                continue;
            }
            normalized.insert(name.to_string(), spec.clone());
        }
        Ok(normalized)
    }

    /// Whether retrieval of `key` would succeed. Swallows all errors.
    pub fn is_resolvable(&self, key: &str, overrides: &Overrides) -> bool {
        self.get_with(key, overrides).is_ok()
    }

    pub fn is_function(&self, name: &str) -> bool {
        matches!(self.definitions.get(name), Some(Definition::Function(_)))
    }

    pub fn is_constant(&self, name: &str) -> bool {
        matches!(self.definitions.get(name), Some(Definition::Constant(_)))
    }

    /// The names of all defined parameters.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// All constant definitions.
    pub fn constants(&self) -> impl Iterator<Item = (&str, &Quantity)> {
        self.definitions.iter().filter_map(|(name, def)| match def {
            Definition::Constant(q) => Some((name.as_str(), q)),
            Definition::Function(_) => None,
        })
    }

    /// The expression sources of functional definitions that have one.
    pub fn function_sources(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.definitions.iter().filter_map(|(name, def)| match def {
            Definition::Function(f) => Some((name.as_str(), f.source())),
            Definition::Constant(_) => None,
        })
    }

    /// All declared parameter units.
    pub fn declared_units(&self) -> impl Iterator<Item = (&str, &Units)> {
        self.specs.iter().map(|(name, units)| (name.as_str(), units))
    }

    /// All configured dimension scalings.
    pub fn scalings(&self) -> impl Iterator<Item = (&str, &Quantity)> {
        self.scalings.iter().map(|(dim, q)| (dim.as_str(), q))
    }

    fn get_param(&self, key: &str, overrides: &Overrides) -> Result<Retrieved> {
        let (name, scaled) = self.split_key(key);
        self.get_param_form(name, scaled, overrides)
    }

    fn get_param_form(&self, name: &str, scaled: bool, overrides: &Overrides) -> Result<Retrieved> {
        if let Some(spec) = overrides.get(name) {
            if spec.is_function() {
                let f = Self::to_param_fn(spec)?;
                let mut rest = overrides.clone();
                rest.remove(name);
                let value = self.call_forward(&f, &rest)?;
                return self.coerce(&value, Some(name), scaled);
            }
            return self.coerce(spec, Some(name), scaled);
        }

        match self.definitions.get(name) {
            Some(Definition::Function(_)) => {
                let outputs = self.eval_function(name, overrides)?;
                let spec = outputs
                    .get(name)
                    .ok_or_else(|| Error::ParameterInvalid(name.to_string()))?;
                self.coerce(spec, Some(name), scaled)
            }
            Some(Definition::Constant(q)) => {
                self.coerce(&ValueSpec::Quantity(q.clone()), Some(name), scaled)
            }
            None => Err(Error::ParameterInvalid(name.to_string())),
        }
    }

    fn to_param_fn(spec: &ValueSpec) -> Result<ParamFn> {
        match spec {
            ValueSpec::Function(f) => Ok(f.clone()),
            ValueSpec::Expression(s) => ParamFn::compile(s),
            _ => Err(Error::QuantityCoercion(
                "expected a functional value".to_string(),
            )),
        }
    }

    fn resolve_ref(&self, reference: &ParamRef, overrides: &Overrides) -> Result<FnArg> {
        Ok(self
            .get_param_form(reference.name(), reference.is_scaled(), overrides)?
            .into_arg())
    }

    /// Evaluate a functional definition's forward direction with ad-hoc
    /// dependency resolution.
    fn call_forward(&self, f: &ParamFn, overrides: &Overrides) -> Result<ValueSpec> {
        let mut args = Vec::with_capacity(f.deps().len());
        for dep in f.deps() {
            args.push(self.resolve_ref(dep, overrides)?);
        }
        match f.call(&args)? {
            FnOutput::Single(spec) => Ok(spec),
            FnOutput::Inverse(_) => Err(Error::ParameterInvalid(
                "a forward evaluation returned inverse output".to_string(),
            )),
        }
    }

    /// Evaluate the functional definition of `param`.
    ///
    /// If `param` itself appears in the overrides the inverse direction is
    /// run instead, yielding updated values for every declared dependency;
    /// otherwise the forward value is returned under the parameter's own
    /// name. Forward results are memoized per resolved-argument fingerprint.
    fn eval_function(&self, param: &str, overrides: &Overrides) -> Result<HashMap<String, ValueSpec>> {
        let f = match self.definitions.get(param) {
            Some(Definition::Function(f)) => f.clone(),
            _ => return Err(Error::ParameterInvalid(param.to_string())),
        };

        let inverting = overrides.contains_key(param);
        if inverting && !f.is_invertible() {
            return Err(Error::ParameterNotInvertible(param.to_string()));
        }

        let mut args = Vec::with_capacity(f.deps().len() + 1);
        for dep in f.deps() {
            args.push(self.resolve_ref(dep, overrides)?);
        }

        if !inverting {
            let fingerprint = args
                .iter()
                .map(|a| a.fingerprint())
                .collect::<Vec<_>>()
                .join(";");
            let cache_key = (param.to_string(), fingerprint);
            if let Some(cached) = self.fn_cache.borrow().get(&cache_key) {
                return Ok(HashMap::from([(param.to_string(), cached.clone())]));
            }
            let spec = match f.call(&args)? {
                FnOutput::Single(spec) => spec,
                FnOutput::Inverse(_) => {
                    return Err(Error::ParameterInvalid(format!(
                        "definition of '{}' returned inverse output from a forward call",
                        param
                    )))
                }
            };
            self.fn_cache.borrow_mut().insert(cache_key, spec.clone());
            return Ok(HashMap::from([(param.to_string(), spec)]));
        }

        // Inverse: append the parameter's own value in its declared form.
        let own = f.own().expect("invertibility was checked above");
        let own_value = self
            .get_param_form(param, own.is_scaled(), overrides)?
            .into_arg();
        args.push(own_value);

        let results = match f.call(&args)? {
            FnOutput::Inverse(results) => results,
            FnOutput::Single(_) => {
                return Err(Error::ParameterNotInvertible(param.to_string()))
            }
        };
        if results.len() != f.deps().len() {
            return Err(Error::ParameterInvalid(format!(
                "inverse of '{}' returned {} values for {} dependencies",
                param,
                results.len(),
                f.deps().len()
            )));
        }
        Ok(f.deps()
            .iter()
            .map(|dep| dep.name().to_string())
            .zip(results)
            .collect())
    }

    /// Ratify overrides: evaluate functional override values, then run the
    /// inversions implied by overriding functionally-defined parameters,
    /// recursing until no new assignments appear.
    fn process_override(
        &self,
        overrides: &mut Overrides,
        restrict: Option<Vec<String>>,
        abort_noninvertible: bool,
    ) -> Result<()> {
        let restrict: Vec<String> =
            restrict.unwrap_or_else(|| overrides.keys().cloned().collect());
        if restrict.is_empty() {
            return Ok(());
        }

        // Functional override values are evaluated against the remaining
        // overrides before anything else, in dependency order: a functional
        // override waits until the functional overrides it refers to have
        // been reduced to values. A pass that reduces nothing while
        // functional overrides remain is a cycle within the override set.
        let mut pending: Vec<String> = restrict
            .iter()
            .filter(|name| {
                overrides
                    .get(*name)
                    .map(ValueSpec::is_function)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut remaining = Vec::with_capacity(before);
            for name in pending.drain(..) {
                let f = Self::to_param_fn(&overrides[&name])?;
                let blocked = f.deps().iter().any(|dep| {
                    dep.name() != name
                        && overrides
                            .get(dep.name())
                            .map(ValueSpec::is_function)
                            .unwrap_or(false)
                });
                if blocked {
                    remaining.push(name);
                    continue;
                }
                let mut rest = overrides.clone();
                rest.remove(&name);
                let value = self.call_forward(&f, &rest)?;
                overrides.insert(name, value);
            }
            if remaining.len() == before {
                remaining.sort();
                return Err(Error::ParameterRecursion(remaining.join(", ")));
            }
            pending = remaining;
        }

        let mut derived: Overrides = HashMap::new();
        for name in &restrict {
            if !overrides.contains_key(name) || !self.is_function(name) {
                continue;
            }
            match self.eval_function(name, overrides) {
                Ok(results) => {
                    for (key, value) in results {
                        let existing = overrides.get(&key).or_else(|| derived.get(&key));
                        if let Some(existing) = existing {
                            if !self.specs_agree(&key, existing, &value)? {
                                return Err(Error::ParameterOverSpecified(key));
                            }
                        }
                        derived.insert(key, value);
                    }
                }
                Err(Error::ParameterNotInvertible(p)) => {
                    if abort_noninvertible {
                        return Err(Error::ParameterNotInvertible(p));
                    }
                    warn!(
                        param = %p,
                        "overridden parameter has a non-invertible functional \
                         definition; its dependencies were not updated"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let derived_keys: Vec<String> = derived.keys().cloned().collect();
        overrides.extend(derived);
        if !derived_keys.is_empty() {
            self.process_override(overrides, Some(derived_keys), abort_noninvertible)?;
        }
        Ok(())
    }

    fn specs_agree(&self, param: &str, a: &ValueSpec, b: &ValueSpec) -> Result<bool> {
        let a = self.to_quantity(a, Some(param), false)?;
        let b = self.to_quantity(b, Some(param), false)?;
        Ok(a.approx_eq(&b))
    }

    ////////// VALUE COERCION AND SCALING ///////////////////////////////////

    /// Coerce a value specification into a quantity, interpreting bare
    /// numbers as scaled values in the parameter's declared units.
    fn to_quantity(&self, spec: &ValueSpec, param: Option<&str>, check_bounds: bool) -> Result<Quantity> {
        let q = match spec {
            ValueSpec::Pair(value, units) => {
                Quantity::new(value.clone(), self.catalog.parse(units)?)?
            }
            ValueSpec::Quantity(q) => q.clone(),
            ValueSpec::Scalar(_) | ValueSpec::Array(_) => {
                let units = param
                    .and_then(|p| self.specs.get(p))
                    .cloned()
                    .unwrap_or_else(Units::dimensionless);
                let scaling = self.unit_scaling(&units)?;
                let value = match spec {
                    ValueSpec::Scalar(v) => Value::Scalar(v * scaling),
                    ValueSpec::Array(a) => Value::Array(a.mapv(|v| v * scaling)),
                    _ => unreachable!(),
                };
                Quantity::new(value, units)?
            }
            ValueSpec::Function(_) | ValueSpec::Expression(_) => {
                return Err(Error::QuantityCoercion(
                    "a functional value has no quantity form".to_string(),
                ))
            }
        };

        if check_bounds {
            if let Some(bounds) = param.and_then(|p| self.bounds.get(p)) {
                return bounds.check(q);
            }
        }
        Ok(q)
    }

    fn coerce(&self, spec: &ValueSpec, param: Option<&str>, scaled: bool) -> Result<Retrieved> {
        let q = self.to_quantity(spec, param, true)?;
        if scaled {
            let scaling = self.unit_scaling(q.units())?;
            Ok(Retrieved::Scaled(q.value().map(|v| v / scaling)))
        } else {
            Ok(Retrieved::Quantity(q))
        }
    }

    /// The factor `s` such that `quantity_value / s` is the scaled value,
    /// for a quantity expressed in `units`.
    ///
    /// The factor is the configured per-dimension reference quantities
    /// raised to the unit's dimension exponents, rebased onto `units`.
    /// Memoized per canonical unit string.
    pub fn unit_scaling(&self, units: &Units) -> Result<f64> {
        let key = units.canonical();
        if let Some(cached) = self.scaling_cache.borrow().get(&key) {
            return Ok(*cached);
        }

        let mut basis_scale = Quantity::dimensionless(1.0)?;
        for (dimension, power) in units.dimensions() {
            let reference = match self.scalings.get(&dimension) {
                Some(q) => q.clone(),
                None => {
                    let basis = self.catalog.basis_unit(&dimension).ok_or_else(|| {
                        Error::UnitInvalid(format!(
                            "dimension '{}' has no basis unit",
                            dimension
                        ))
                    })?;
                    Quantity::new(1.0, Units::from_unit(basis))?
                }
            };
            basis_scale = basis_scale.mul(&reference.pow(power))?;
        }

        let value = basis_scale
            .value()
            .as_scalar()
            .ok_or_else(|| Error::QuantityValue("scaling reference is an array".to_string()))?;
        let scaling = value * basis_scale.units().scale(units)?;

        self.scaling_cache.borrow_mut().insert(key, scaling);
        Ok(scaling)
    }

    ////////// ASSIGNMENT ///////////////////////////////////////////////////

    /// Assign parameters eagerly.
    ///
    /// Overriding a parameter with an invertible functional definition
    /// resolves and stores updated values for its dependencies instead;
    /// assigning to a non-invertible functional parameter fails with
    /// [`Error::ParameterNotInvertible`]. Conflicting resolutions fail with
    /// [`Error::ParameterOverSpecified`].
    pub fn set<S: Into<String>>(
        &mut self,
        mapping: impl IntoIterator<Item = (S, ValueSpec)>,
    ) -> Result<()> {
        let mut assignments: Overrides = mapping
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        for name in assignments.keys() {
            Self::validate_name(name)?;
        }
        self.process_override(&mut assignments, None, true)?;

        let changed: Vec<String> = assignments
            .iter()
            .filter(|(name, _)| !self.is_function(name))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &changed {
            let spec = assignments.remove(name).expect("key was just collected");
            self.set_one(name, spec)?;
        }
        self.verify_superior_bounds(&changed)?;
        Ok(())
    }

    /// Assign parameters without interpretation: functional definitions and
    /// constants are stored verbatim, replacing any previous definition.
    pub fn set_raw<S: Into<String>>(
        &mut self,
        mapping: impl IntoIterator<Item = (S, ValueSpec)>,
    ) -> Result<()> {
        let mut changed = Vec::new();
        for (name, spec) in mapping {
            let name = name.into();
            Self::validate_name(&name)?;
            self.set_one(&name, spec)?;
            changed.push(name);
        }
        self.verify_superior_bounds(&changed)?;
        Ok(())
    }

    fn set_one(&mut self, name: &str, spec: ValueSpec) -> Result<()> {
        match spec {
            ValueSpec::Function(f) => self.assign_function(name, f)?,
            ValueSpec::Expression(s) => {
                let f = ParamFn::compile(&s)?;
                self.assign_function(name, f)?;
            }
            other => {
                let q = self.to_quantity(&other, Some(name), true)?;
                self.specs.insert(name.to_string(), q.units().clone());
                self.definitions
                    .insert(name.to_string(), Definition::Constant(q));
                self.deps.insert(name.to_string(), HashSet::new());
            }
        }
        self.invalidate();
        Ok(())
    }

    fn assign_function(&mut self, name: &str, f: ParamFn) -> Result<()> {
        if let Some(own) = f.own() {
            if own.name() != name {
                return Err(Error::ParameterInvalid(format!(
                    "invertible definition of '{}' declares its own value as '{}'",
                    name,
                    own.name()
                )));
            }
        }
        let dep_names: Vec<String> = f.deps().iter().map(|d| d.name().to_string()).collect();
        if dep_names.iter().any(|d| d == name) {
            return Err(Error::ParameterRecursion(name.to_string()));
        }
        self.check_acyclic(name, &dep_names, Vec::new())?;

        self.deps
            .insert(name.to_string(), dep_names.into_iter().collect());
        // Units declared via `set_units` survive redefinition; a name with
        // no declaration is dimensionless.
        self.specs
            .entry(name.to_string())
            .or_insert_with(Units::dimensionless);
        self.definitions
            .insert(name.to_string(), Definition::Function(f));
        Ok(())
    }

    /// Walk the dependency graph outwards from a candidate definition,
    /// carrying the set of forbidden names; revisiting one is a cycle.
    fn check_acyclic(&self, param: &str, dep_names: &[String], mut forbidden: Vec<String>) -> Result<()> {
        for dep in dep_names {
            if forbidden.contains(dep) {
                return Err(Error::ParameterRecursion(dep.clone()));
            }
        }
        forbidden.push(param.to_string());
        for dep in dep_names {
            if let Some(Definition::Function(g)) = self.definitions.get(dep) {
                let sub: Vec<String> = g
                    .deps()
                    .iter()
                    .map(|d| d.name().to_string())
                    .filter(|n| n != dep)
                    .collect();
                self.check_acyclic(dep, &sub, forbidden.clone())?;
            }
        }
        Ok(())
    }

    /// Remove parameters, their declared units, and their dependency records.
    pub fn forget(&mut self, names: &[&str]) {
        for name in names {
            self.definitions.remove(*name);
            self.specs.remove(*name);
            self.deps.remove(*name);
        }
        self.invalidate();
    }

    /// Every parameter reachable from `changed` by following dependency
    /// records backwards, the changed names included.
    fn dependents_closure(&self, changed: &[String]) -> HashSet<String> {
        let mut affected: HashSet<String> = changed.iter().cloned().collect();
        loop {
            let mut grew = false;
            for (name, dep_names) in &self.deps {
                if !affected.contains(name) && dep_names.iter().any(|d| affected.contains(d)) {
                    affected.insert(name.clone());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        affected
    }

    /// After a value change, re-check bounds on every parameter downstream
    /// of the changed names. A violation surfaces per the bound's policy:
    /// under the `error` policy the assignment fails, otherwise the check
    /// itself warns or clips. Unresolvable dependents are skipped with a
    /// warning.
    fn verify_superior_bounds(&self, changed: &[String]) -> Result<()> {
        for name in self.dependents_closure(changed) {
            if !self.bounds.contains_key(&name) {
                continue;
            }
            match self.get_param_form(&name, true, &Overrides::new()) {
                Ok(_) => {}
                Err(e @ Error::ParameterOutsideBounds { .. }) => return Err(e),
                Err(e) => {
                    warn!(
                        param = %name,
                        error = %e,
                        "could not verify bounds of dependent parameter"
                    );
                }
            }
        }
        Ok(())
    }

    ////////// UNITS, SCALINGS, BOUNDS //////////////////////////////////////

    /// Declare the units of parameters without assigning values.
    ///
    /// An already-set constant keeps its numeric value and has its units
    /// replaced, without rescaling.
    pub fn set_units<S: Into<String>, U: AsRef<str>>(
        &mut self,
        mapping: impl IntoIterator<Item = (S, U)>,
    ) -> Result<()> {
        for (name, units) in mapping {
            let name = name.into();
            Self::validate_name(&name)?;
            let units = self.catalog.parse(units.as_ref())?;
            self.specs.insert(name.clone(), units.clone());
            if let Some(Definition::Constant(q)) = self.definitions.get_mut(&name) {
                *q = q.with_units(units);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// The declared units of a parameter.
    pub fn units(&self, name: &str) -> Option<&Units> {
        self.specs.get(name)
    }

    /// Configure per-dimension reference quantities for
    /// non-dimensionalisation. A reference for `length` of `(2, "m")`
    /// halves every scaled length.
    pub fn set_scaling<S: Into<String>>(
        &mut self,
        mapping: impl IntoIterator<Item = (S, ValueSpec)>,
    ) -> Result<()> {
        self.invalidate();
        for (dimension, spec) in mapping {
            let dimension = dimension.into();
            if !self.catalog.basis().contains_key(&dimension) {
                return Err(Error::ScalingDimensionInvalid(dimension));
            }
            let q = self.to_quantity(&spec, None, false)?;
            let mut expected = crate::units::DimVec::new();
            expected.insert(dimension.clone(), Power::from_integer(1));
            if q.units().dimensions() != expected {
                return Err(Error::ScalingUnitInvalid(format!(
                    "units '{}' do not measure dimension '{}'",
                    q.units(),
                    dimension
                )));
            }
            self.scalings.insert(dimension, q);
        }
        Ok(())
    }

    /// The configured reference quantity for a dimension, if any.
    pub fn scaling(&self, dimension: &str) -> Option<&Quantity> {
        self.scalings.get(dimension)
    }

    /// Register a custom unit on the catalog; tracked for snapshots and
    /// profile export.
    pub fn unit_add(&mut self, unit: Unit) {
        self.catalog.add(unit.clone());
        self.custom_units.push(unit);
        self.invalidate();
    }

    /// The custom units registered through this store.
    pub fn custom_units(&self) -> &[Unit] {
        &self.custom_units
    }

    /// Switch the catalog's active unit context.
    pub fn set_units_context(&mut self, name: Option<&str>) -> Result<()> {
        self.catalog.set_context(name)?;
        self.invalidate();
        Ok(())
    }

    /// Set bound intervals for parameters.
    ///
    /// Each interval endpoint is a value specification (`None` is an open
    /// endpoint). Policy flags apply to every listed parameter.
    pub fn set_bounds<S: Into<String>>(
        &mut self,
        mapping: impl IntoIterator<Item = (S, Vec<(Option<ValueSpec>, Option<ValueSpec>)>)>,
        error: bool,
        clip: bool,
        inclusive: bool,
    ) -> Result<()> {
        let mut changed = Vec::new();
        for (name, intervals) in mapping {
            let name = name.into();
            Self::validate_name(&name)?;
            let declared = self
                .specs
                .get(&name)
                .cloned()
                .unwrap_or_else(Units::dimensionless);
            let mut resolved = Vec::with_capacity(intervals.len());
            for (lower, upper) in intervals {
                let lower = match lower {
                    Some(spec) => self.to_quantity(&spec, Some(&name), false)?,
                    None => Quantity::new(f64::NEG_INFINITY, declared.clone())?,
                };
                let upper = match upper {
                    Some(spec) => self.to_quantity(&spec, Some(&name), false)?,
                    None => Quantity::new(f64::INFINITY, declared.clone())?,
                };
                resolved.push((lower, upper));
            }
            self.bounds
                .insert(name.clone(), Bounds::new(&name, resolved, error, clip, inclusive));
            changed.push(name);
        }
        // Existing values are checked against the new bounds immediately.
        for name in &changed {
            if self.is_constant(name) {
                if let Err(e @ Error::ParameterOutsideBounds { .. }) =
                    self.get_param_form(name, true, &Overrides::new())
                {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// The bound intervals of a parameter, if configured.
    pub fn bounds(&self, name: &str) -> Option<&Bounds> {
        self.bounds.get(name)
    }

    ////////// CONVERSION ///////////////////////////////////////////////////

    /// Convert between physical units and the internal scaled
    /// representation.
    ///
    /// With only `input`, the value is taken as a quantity in those units
    /// and reduced to its scaled form. With only `output`, the value is
    /// taken as scaled and expressed as a quantity in those units. With
    /// both, this is a plain unit conversion through the catalog.
    pub fn convert(
        &self,
        value: impl Into<Value>,
        input: Option<&str>,
        output: Option<&str>,
    ) -> Result<Retrieved> {
        let value = value.into();
        match (input, output) {
            (None, None) => Ok(Retrieved::Scaled(value)),
            (Some(input), None) => {
                let units = self.catalog.parse(input)?;
                let scaling = self.unit_scaling(&units)?;
                Ok(Retrieved::Scaled(value.map(|v| v / scaling)))
            }
            (None, Some(output)) => {
                let units = self.catalog.parse(output)?;
                let scaling = self.unit_scaling(&units)?;
                Ok(Retrieved::Quantity(Quantity::new(
                    value.map(|v| v * scaling),
                    units,
                )?))
            }
            (Some(input), Some(output)) => {
                let from = self.catalog.parse(input)?;
                let to = self.catalog.parse(output)?;
                let q = Quantity::new(value, from)?.to(&to, &self.catalog)?;
                Ok(Retrieved::Quantity(q))
            }
        }
    }

    ////////// SWEEPS ///////////////////////////////////////////////////////

    /// Evaluate parameters across a sweep.
    ///
    /// Every listed or sampled range must produce the same number of steps;
    /// static entries are applied as fixed overrides at each step. Results
    /// are keyed by bare name, one value per step.
    pub fn range(
        &self,
        keys: &[&str],
        ranges: HashMap<String, RangeSpec>,
    ) -> Result<HashMap<String, Vec<Retrieved>>> {
        let mut step_count: Option<usize> = None;
        let mut swept: HashMap<String, Vec<ValueSpec>> = HashMap::new();
        let mut fixed: Overrides = HashMap::new();

        for (param, spec) in ranges {
            match spec {
                RangeSpec::Static(value) => {
                    fixed.insert(param, value);
                }
                RangeSpec::Values(values) => {
                    match step_count {
                        None => step_count = Some(values.len()),
                        Some(n) if n == values.len() => {}
                        Some(n) => {
                            return Err(Error::ParameterInvalid(format!(
                                "range for '{}' has {} steps where {} were expected",
                                param,
                                values.len(),
                                n
                            )))
                        }
                    }
                    swept.insert(param, values);
                }
                RangeSpec::Span {
                    start,
                    stop,
                    count,
                    sampler,
                } => {
                    match step_count {
                        None => step_count = Some(count),
                        Some(n) if n == count => {}
                        Some(n) => {
                            return Err(Error::ParameterInvalid(format!(
                                "range for '{}' has {} steps where {} were expected",
                                param, count, n
                            )))
                        }
                    }
                    let start = self
                        .coerce(&start, Some(param.as_str()), true)?
                        .as_scalar()
                        .ok_or_else(|| {
                            Error::QuantityCoercion(
                                "range endpoints must be scalars".to_string(),
                            )
                        })?;
                    let stop = self
                        .coerce(&stop, Some(param.as_str()), true)?
                        .as_scalar()
                        .ok_or_else(|| {
                            Error::QuantityCoercion(
                                "range endpoints must be scalars".to_string(),
                            )
                        })?;
                    let samples = sampler.sample(start, stop, count);
                    swept.insert(param, samples.iter().map(|v| ValueSpec::Scalar(*v)).collect());
                }
            }
        }

        let steps = match step_count {
            Some(steps) => steps,
            None => {
                // Nothing swept: a single evaluation under the fixed set.
                let single = self.get_many(keys, &fixed)?;
                return Ok(single
                    .into_iter()
                    .map(|(name, value)| (name, vec![value]))
                    .collect());
            }
        };

        let mut results: HashMap<String, Vec<Retrieved>> = keys
            .iter()
            .map(|key| {
                let (name, _) = self.split_key(key);
                (name.to_string(), Vec::with_capacity(steps))
            })
            .collect();

        for step in 0..steps {
            let mut overrides = fixed.clone();
            for (param, values) in &swept {
                overrides.insert(param.clone(), values[step].clone());
            }
            let step_values = self.get_many(keys, &overrides)?;
            for (name, value) in step_values {
                if let Some(series) = results.get_mut(&name) {
                    series.push(value);
                }
            }
        }
        Ok(results)
    }

    ////////// SCOPES ///////////////////////////////////////////////////////

    /// Snapshot the full store state. Restored by [`exit_scope`]
    /// (last in, first out).
    ///
    /// [`exit_scope`]: ParameterStore::exit_scope
    pub fn enter_scope(&mut self) {
        self.snapshots.push(Snapshot {
            catalog: self.catalog.clone(),
            definitions: self.definitions.clone(),
            specs: self.specs.clone(),
            scalings: self.scalings.clone(),
            bounds: self.bounds.clone(),
            custom_units: self.custom_units.clone(),
            deps: self.deps.clone(),
        });
    }

    /// Restore the most recent snapshot, discarding every change made
    /// since the matching [`enter_scope`](ParameterStore::enter_scope).
    pub fn exit_scope(&mut self) -> Result<()> {
        let snapshot = self
            .snapshots
            .pop()
            .ok_or_else(|| Error::ParameterInvalid("no scope to exit".to_string()))?;
        self.catalog = snapshot.catalog;
        self.definitions = snapshot.definitions;
        self.specs = snapshot.specs;
        self.scalings = snapshot.scalings;
        self.bounds = snapshot.bounds;
        self.custom_units = snapshot.custom_units;
        self.deps = snapshot.deps;
        self.invalidate();
        Ok(())
    }

    /// The current scope nesting depth.
    pub fn scope_depth(&self) -> usize {
        self.snapshots.len()
    }
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("definitions", &self.definitions.len())
            .field("default_scaled", &self.default_scaled)
            .field("scope_depth", &self.snapshots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ov(pairs: &[(&str, ValueSpec)]) -> Overrides {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_constant_set_and_get() {
        let mut store = ParameterStore::new();
        store.set([("x", (1.5, "km").into())]).unwrap();

        // Scaled by default: 1.5 km in the metre basis.
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 1500.0);

        let q = store.get("_x").unwrap();
        let q = q.as_quantity().unwrap();
        assert_eq!(q.units(), &store.catalog().parse("km").unwrap());
        assert_relative_eq!(q.value().as_scalar().unwrap(), 1.5);
    }

    #[test]
    fn test_bare_number_is_scaled_value() {
        let mut store = ParameterStore::new();
        store.set_units([("x", "nm")]).unwrap();
        store.set([("x", 2.0.into())]).unwrap();

        // A bare number is the scaled value; the quantity form re-expresses
        // it in the declared units.
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 2.0);
        let q = store.get("_x").unwrap();
        let q = q.as_quantity().unwrap();
        assert_eq!(q.units(), &store.catalog().parse("nm").unwrap());
        assert_relative_eq!(q.value().as_scalar().unwrap(), 2e9, max_relative = 1e-12);
    }

    #[test]
    fn test_undefined_parameter() {
        let store = ParameterStore::new();
        assert!(matches!(
            store.get("missing"),
            Err(Error::ParameterInvalid(_))
        ));
        assert!(!store.is_resolvable("missing", &Overrides::new()));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut store = ParameterStore::new();
        assert!(matches!(
            store.set([("asd%WAD", 1.0.into())]),
            Err(Error::ParameterInvalid(_))
        ));
        assert!(matches!(
            store.set([("_x", 1.0.into())]),
            Err(Error::ParameterInvalid(_))
        ));
    }

    #[test]
    fn test_expression_definition() {
        let mut store = ParameterStore::new();
        store
            .set_raw([("x", 3.0.into()), ("y", "x^2 + 1".into())])
            .unwrap();
        assert_relative_eq!(store.get("y").unwrap().as_scalar().unwrap(), 10.0);

        // Overriding the dependency flows through.
        let y = store.get_with("y", &ov(&[("x", 5.0.into())])).unwrap();
        assert_relative_eq!(y.as_scalar().unwrap(), 26.0);
    }

    #[test]
    fn test_expression_retrieval() {
        let mut store = ParameterStore::new();
        store.set([("x", 1.0.into()), ("y", 2.0.into())]).unwrap();
        let result = store.get_with("x^2 + y^2", &Overrides::new()).unwrap();
        assert_relative_eq!(result.as_scalar().unwrap(), 5.0);
    }

    #[test]
    fn test_recursion_rejected() {
        let mut store = ParameterStore::new();
        store.set_raw([("y", "x + 1".into())]).unwrap();
        // x depending on y would close the loop.
        assert!(matches!(
            store.set_raw([("x", "y * 2".into())]),
            Err(Error::ParameterRecursion(_))
        ));
        // Direct self-reference is rejected outright.
        assert!(matches!(
            store.set_raw([("z", "z + 1".into())]),
            Err(Error::ParameterRecursion(_))
        ));
    }

    #[test]
    fn test_expression_chain_arithmetic() {
        let mut store = ParameterStore::new();
        store
            .set_raw([
                ("x", 8.0.into()),
                ("w", "x - 2 - 1".into()),
                ("v", "x / 2 * 2".into()),
            ])
            .unwrap();
        assert_relative_eq!(store.get("w").unwrap().as_scalar().unwrap(), 5.0);
        assert_relative_eq!(store.get("v").unwrap().as_scalar().unwrap(), 8.0);
    }

    #[test]
    fn test_circular_overrides_rejected() {
        let mut store = ParameterStore::new();
        store.set([("a", 1.0.into()), ("b", 1.0.into())]).unwrap();

        assert!(matches!(
            store.set([("a", "b + 1".into()), ("b", "a + 1".into())]),
            Err(Error::ParameterRecursion(_))
        ));
        assert!(matches!(
            store.get_with("a", &ov(&[("a", "b + 1".into()), ("b", "a + 1".into())])),
            Err(Error::ParameterRecursion(_))
        ));

        // Acyclic functional overrides resolve in dependency order,
        // whichever order the map yields them.
        store.set([("c", 1.0.into())]).unwrap();
        let a = store
            .get_with("a", &ov(&[("a", "b + 1".into()), ("b", "c + 1".into())]))
            .unwrap();
        assert_relative_eq!(a.as_scalar().unwrap(), 3.0);
    }

    #[test]
    fn test_function_keeps_declared_units() {
        let mut store = ParameterStore::new();
        store.set_units([("y", "J")]).unwrap();
        store
            .set_raw([("x", 3.0.into()), ("y", "x^2".into())])
            .unwrap();

        assert_eq!(store.units("y"), Some(&store.catalog().parse("J").unwrap()));
        let q = store.get("_y").unwrap();
        let q = q.as_quantity().unwrap();
        assert_eq!(q.units(), &store.catalog().parse("J").unwrap());
        assert_relative_eq!(q.value().as_scalar().unwrap(), 9.0);
    }

    #[test]
    fn test_override_accepts_form_prefixed_keys() {
        let mut store = ParameterStore::new();
        store
            .set_raw([("x", 1.0.into()), ("y", "x + 1".into())])
            .unwrap();

        let y = store.get_with("y", &ov(&[("_x", 5.0.into())])).unwrap();
        assert_relative_eq!(y.as_scalar().unwrap(), 6.0);

        // Both forms of the same name must agree.
        assert!(matches!(
            store.get_with("y", &ov(&[("x", 2.0.into()), ("_x", 5.0.into())])),
            Err(Error::ParameterOverSpecified(_))
        ));
    }

    #[test]
    fn test_evaluate_respects_default_form() {
        let mut store = ParameterStore::with_catalog(UnitCatalog::si(), false);
        store.set([("x", 3.0.into())]).unwrap();

        let result = store.get_with("x * 2", &Overrides::new()).unwrap();
        let q = result.as_quantity().unwrap();
        assert_relative_eq!(q.value().as_scalar().unwrap(), 6.0);
    }

    #[test]
    fn test_non_invertible_set_fails_but_override_warns() {
        let mut store = ParameterStore::new();
        store.set_raw([("t", 2.0.into()), ("J", "t^2".into())]).unwrap();

        assert!(matches!(
            store.set([("J", 1.0.into())]),
            Err(Error::ParameterNotInvertible(_))
        ));

        // The override path keeps the supplied value.
        let j = store.get_with("J", &ov(&[("J", 1.0.into())])).unwrap();
        assert_relative_eq!(j.as_scalar().unwrap(), 1.0);
    }

    #[test]
    fn test_invertible_set_updates_dependencies() {
        let mut store = ParameterStore::new();
        store.set([("x", 1.0.into()), ("y", 1.0.into())]).unwrap();

        let f = ParamFn::invertible(
            vec![ParamRef::Scaled("x".into()), ParamRef::Scaled("y".into())],
            ParamRef::Scaled("z".into()),
            |args| {
                if args.len() == 2 {
                    let (x, y) = (args[0].as_scalar()?, args[1].as_scalar()?);
                    Ok(FnOutput::Single(ValueSpec::Scalar(x * x + y * y)))
                } else {
                    Ok(FnOutput::Inverse(vec![
                        ValueSpec::Scalar(2.0),
                        ValueSpec::Scalar(3.0),
                    ]))
                }
            },
        );
        store.set_raw([("z", f.into())]).unwrap();
        assert_relative_eq!(store.get("z").unwrap().as_scalar().unwrap(), 2.0);

        store.set([("z", 13.0.into())]).unwrap();
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 2.0);
        assert_relative_eq!(store.get("y").unwrap().as_scalar().unwrap(), 3.0);
        assert_relative_eq!(store.get("z").unwrap().as_scalar().unwrap(), 13.0);
    }

    #[test]
    fn test_scaling_configuration() {
        let mut store = ParameterStore::new();
        store
            .set_scaling([("length", (1.0, "nm").into()), ("time", (2.0, "s").into())])
            .unwrap();
        store.set([("x", (1.0, "nm").into())]).unwrap();
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 1.0);

        store.set([("v", (0.5, "nm/s").into())]).unwrap();
        assert_relative_eq!(store.get("v").unwrap().as_scalar().unwrap(), 1.0);
    }

    #[test]
    fn test_scaling_validation() {
        let mut store = ParameterStore::new();
        assert!(matches!(
            store.set_scaling([("flavour", (1.0, "m").into())]),
            Err(Error::ScalingDimensionInvalid(_))
        ));
        assert!(matches!(
            store.set_scaling([("length", (1.0, "s").into())]),
            Err(Error::ScalingUnitInvalid(_))
        ));
    }

    #[test]
    fn test_convert_round_trips() {
        let store = ParameterStore::new();

        let q = store.convert(1.0, Some("mT"), Some("T")).unwrap();
        assert_relative_eq!(
            q.as_quantity().unwrap().value().as_scalar().unwrap(),
            1e-3
        );

        let scaled = store.convert(1.0, Some("mT"), None).unwrap();
        assert_relative_eq!(scaled.as_scalar().unwrap(), 1e-3);

        let back = store.convert(1e-3, None, Some("mT")).unwrap();
        assert_relative_eq!(
            back.as_quantity().unwrap().value().as_scalar().unwrap(),
            1.0
        );

        assert!(store.convert(1.0, Some("kg"), Some("s")).is_err());
    }

    #[test]
    fn test_scope_rollback() {
        let mut store = ParameterStore::new();
        store.set([("x", 1.0.into())]).unwrap();

        store.enter_scope();
        store.set([("x", 2.0.into()), ("y", 3.0.into())]).unwrap();
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 2.0);

        store.exit_scope().unwrap();
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 1.0);
        assert!(store.get("y").is_err());
        assert!(store.exit_scope().is_err());
    }

    #[test]
    fn test_forget() {
        let mut store = ParameterStore::new();
        store.set([("x", 1.0.into())]).unwrap();
        store.forget(&["x"]);
        assert!(store.get("x").is_err());
        assert!(store.units("x").is_none());
    }

    #[test]
    fn test_set_units_keeps_value() {
        let mut store = ParameterStore::new();
        store.set([("x", 1.0.into())]).unwrap();
        store.set_units([("x", "nm")]).unwrap();

        let q = store.get("_x").unwrap();
        let q = q.as_quantity().unwrap();
        assert_relative_eq!(q.value().as_scalar().unwrap(), 1.0);
        assert_eq!(q.units(), &store.catalog().parse("nm").unwrap());
    }

    #[test]
    fn test_custom_unit() {
        let mut store = ParameterStore::new();
        store.unit_add(
            Unit::new("testunit", 1e7)
                .with_abbr("TU")
                .no_prefix()
                .with_dimension("length", 1)
                .with_dimension("mass", 1),
        );
        let q = store
            .get_with("_x", &ov(&[("x", (1.0, "TU").into())]))
            .unwrap();
        let q = q.as_quantity().unwrap();
        let converted = q
            .to(&store.catalog().parse("kg*m").unwrap(), store.catalog())
            .unwrap();
        assert_relative_eq!(converted.value().as_scalar().unwrap(), 1e7);
    }

    #[test]
    fn test_range_sweep() {
        let mut store = ParameterStore::new();
        store.set_raw([("x", 0.0.into()), ("y", "x^2".into())]).unwrap();

        let results = store
            .range(
                &["y"],
                HashMap::from([("x".to_string(), RangeSpec::span(0.0, 4.0, 5))]),
            )
            .unwrap();
        let ys: Vec<f64> = results["y"].iter().map(|r| r.as_scalar().unwrap()).collect();
        assert_eq!(ys, vec![0.0, 1.0, 4.0, 9.0, 16.0]);
    }

    #[test]
    fn test_range_mismatched_lengths() {
        let mut store = ParameterStore::new();
        store.set_raw([("x", 0.0.into()), ("y", 0.0.into())]).unwrap();
        let result = store.range(
            &["x"],
            HashMap::from([
                ("x".to_string(), RangeSpec::span(0.0, 1.0, 5)),
                ("y".to_string(), RangeSpec::values([1.0, 2.0])),
            ]),
        );
        assert!(matches!(result, Err(Error::ParameterInvalid(_))));
    }

    #[test]
    fn test_bounds_applied_on_set() {
        let mut store = ParameterStore::new();
        store.set_units([("x", "m")]).unwrap();
        store
            .set_bounds([("x", vec![(Some(0.0.into()), Some(10.0.into()))])], true, false, false)
            .unwrap();

        assert!(store.set([("x", 5.0.into())]).is_ok());
        assert!(matches!(
            store.set([("x", 20.0.into())]),
            Err(Error::ParameterOutsideBounds { .. })
        ));
    }

    #[test]
    fn test_bounds_clip_on_set() {
        let mut store = ParameterStore::new();
        store.set_units([("x", "m")]).unwrap();
        store
            .set_bounds([("x", vec![(Some(0.0.into()), Some(10.0.into()))])], true, true, false)
            .unwrap();
        store.set([("x", 20.0.into())]).unwrap();
        assert_relative_eq!(store.get("x").unwrap().as_scalar().unwrap(), 10.0);
    }

    #[test]
    fn test_bounds_checked_through_dependency_chain() {
        let mut store = ParameterStore::new();
        store
            .set_raw([
                ("x", 1.0.into()),
                ("y", "x^2".into()),
                ("z", "y + 1".into()),
            ])
            .unwrap();
        store
            .set_bounds([("z", vec![(Some(0.0.into()), Some(10.0.into()))])], true, false, false)
            .unwrap();

        // z depends on x only through y.
        assert!(store.set([("x", 2.0.into())]).is_ok());
        assert!(matches!(
            store.set([("x", 5.0.into())]),
            Err(Error::ParameterOutsideBounds { .. })
        ));
    }

    #[test]
    fn test_function_memoization_consistency() {
        let mut store = ParameterStore::new();
        store.set_raw([("x", 2.0.into()), ("y", "x^3".into())]).unwrap();
        assert_relative_eq!(store.get("y").unwrap().as_scalar().unwrap(), 8.0);
        // Memoized result stays consistent with a fresh evaluation.
        assert_relative_eq!(store.get("y").unwrap().as_scalar().unwrap(), 8.0);
        store.set([("x", 3.0.into())]).unwrap();
        assert_relative_eq!(store.get("y").unwrap().as_scalar().unwrap(), 27.0);
    }
}
