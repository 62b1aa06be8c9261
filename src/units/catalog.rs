//! Unit registry, prefixes, bases, and unit contexts
//!
//! The [`UnitCatalog`] owns every registered [`Unit`], resolves identifiers
//! (names, aliases, abbreviations, plurals) to shared unit handles, tracks
//! which unit serves as the basis of each dimension, and holds the named
//! contexts that allow otherwise-forbidden cross-dimension conversions.
//!
//! Parsing a unit expression string is memoized per catalog, so repeated
//! lookups of the same string return the identical cached [`Units`] value.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::units::compound::Units;
use crate::units::unit::{DimVec, Power, Prefix, Unit};

/// A registered nonlinear conversion between two named units.
///
/// The `absolute` flag selects between the map for absolute quantities
/// (e.g. a temperature reading) and the map for relative ones (e.g. a
/// temperature difference).
#[derive(Clone)]
pub struct ConversionMap {
    pub(crate) from: String,
    pub(crate) to: String,
    pub(crate) absolute: bool,
    pub(crate) map: Rc<dyn Fn(f64) -> f64>,
}

impl fmt::Debug for ConversionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionMap")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("absolute", &self.absolute)
            .finish()
    }
}

/// A symmetric numeric scaling between two dimension vectors.
///
/// Converting a value whose units have dimensions `from` into units with
/// dimensions `to` multiplies the basis value by `factor`; the reverse
/// direction divides.
#[derive(Debug, Clone)]
pub struct DimScaling {
    pub(crate) from: DimVec,
    pub(crate) to: DimVec,
    pub(crate) factor: f64,
}

/// A named rule set: constants, dimension scalings, and conversion maps.
#[derive(Debug, Clone, Default)]
pub struct Context {
    constants: BTreeMap<String, f64>,
    scalings: Vec<DimScaling>,
    conversions: Vec<ConversionMap>,
}

/// The unit registry.
///
/// A catalog is populated by [`add`](UnitCatalog::add)ing units (prefixed
/// derivatives are generated automatically for prefixable units) and is then
/// the sole authority for resolving identifiers and computing conversion
/// scales. Exactly one context is active at a time; the global rule set
/// (registered under no context) is always consulted as a fallback.
///
/// # Examples
///
/// ```
/// use dimparams::units::UnitCatalog;
///
/// let catalog = UnitCatalog::si();
/// let km = catalog.parse("km").unwrap();
/// let m = catalog.parse("m").unwrap();
/// assert_eq!(catalog.scale(&km, &m).unwrap(), 1e3);
/// ```
#[derive(Clone)]
pub struct UnitCatalog {
    units: HashMap<String, Rc<Unit>>,
    dimensions: HashMap<String, Option<String>>,
    prefixes: Vec<Prefix>,
    contexts: HashMap<Option<String>, Context>,
    active: Option<String>,
    parse_cache: RefCell<HashMap<String, Units>>,
    scale_cache: RefCell<HashMap<(String, String), f64>>,
}

impl fmt::Debug for UnitCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitCatalog")
            .field("units", &self.units.len())
            .field("dimensions", &self.dimensions)
            .field("active_context", &self.active)
            .finish()
    }
}

impl Default for UnitCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitCatalog {
    /// Create an empty catalog with no prefixes and only the global context.
    pub fn new() -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(None, Context::default());
        Self {
            units: HashMap::new(),
            dimensions: HashMap::new(),
            prefixes: Vec::new(),
            contexts,
            active: None,
            parse_cache: RefCell::new(HashMap::new()),
            scale_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Declare the prefixes used to derive prefixed variants of units added
    /// afterwards. Call before populating the catalog.
    pub fn set_prefixes(&mut self, prefixes: Vec<Prefix>) {
        self.prefixes = prefixes;
    }

    /// Register a unit, its prefixed derivatives, and its dimensions.
    ///
    /// All names, abbreviations, and the plural form become resolvable
    /// identifiers. A previously unseen dimension is recorded; the unit
    /// becomes its basis only if its dimension vector is exactly
    /// `{dimension: 1}`, otherwise the dimension is left without a basis
    /// until one arrives (or [`set_basis`](UnitCatalog::set_basis) is called).
    pub fn add(&mut self, unit: Unit) {
        if unit.prefixable() {
            for prefix in self.prefixes.clone() {
                self.register(unit.prefixed(&prefix));
            }
        }
        self.register(unit);
    }

    fn register(&mut self, unit: Unit) {
        let unit = Rc::new(unit);
        for name in unit.names() {
            self.units.insert(name.clone(), Rc::clone(&unit));
        }
        for abbr in unit.abbrs() {
            self.units.insert(abbr.clone(), Rc::clone(&unit));
        }
        if let Some(plural) = unit.plural() {
            self.units.insert(plural.to_string(), Rc::clone(&unit));
        }

        for dimension in unit.dimensions().keys() {
            if !self.dimensions.contains_key(dimension) {
                if unit.is_basis_for(dimension) {
                    self.dimensions
                        .insert(dimension.clone(), Some(unit.name().to_string()));
                } else {
                    warn!(dimension, unit = unit.name(), "dimension registered without a basis unit");
                    self.dimensions.insert(dimension.clone(), None);
                }
            } else if self.dimensions[dimension].is_none() && unit.is_basis_for(dimension) {
                self.dimensions
                    .insert(dimension.clone(), Some(unit.name().to_string()));
            }
        }

        self.invalidate_caches();
    }

    fn invalidate_caches(&self) {
        self.parse_cache.borrow_mut().clear();
        self.scale_cache.borrow_mut().clear();
    }

    /// Whether an identifier resolves to a registered unit.
    pub fn has(&self, identifier: &str) -> bool {
        self.units.contains_key(identifier)
    }

    /// Resolve an identifier to its shared unit handle.
    pub fn get_unit(&self, identifier: &str) -> Result<Rc<Unit>> {
        self.units
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::UnitInvalid(identifier.to_string()))
    }

    /// All resolvable identifiers.
    pub fn list(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Known dimensions and their basis units (by primary name, if assigned).
    pub fn basis(&self) -> &HashMap<String, Option<String>> {
        &self.dimensions
    }

    /// The basis unit of a dimension, if one is assigned.
    pub fn basis_unit(&self, dimension: &str) -> Option<Rc<Unit>> {
        self.dimensions
            .get(dimension)
            .and_then(|name| name.as_ref())
            .and_then(|name| self.units.get(name))
            .cloned()
    }

    /// Reassign the basis unit of a dimension.
    ///
    /// The named unit's dimension vector must be exactly `{dimension: 1}`.
    pub fn set_basis(&mut self, dimension: &str, identifier: &str) -> Result<()> {
        let unit = self.get_unit(identifier)?;
        if !unit.is_basis_for(dimension) {
            return Err(Error::UnitInvalid(format!(
                "'{}' cannot serve as the basis of dimension '{}'",
                identifier, dimension
            )));
        }
        self.dimensions
            .insert(dimension.to_string(), Some(unit.name().to_string()));
        self.invalidate_caches();
        Ok(())
    }

    /// The canonical basis units for a dimension vector, e.g. `kg*m/s^2`
    /// for force. Fails if any dimension lacks a basis unit.
    pub fn basis_units(&self, dimensions: &DimVec) -> Result<Units> {
        let mut factors = Vec::new();
        for (dimension, power) in dimensions {
            let unit = self.basis_unit(dimension).ok_or_else(|| {
                Error::UnitInvalid(format!("dimension '{}' has no basis unit", dimension))
            })?;
            factors.push((unit, *power));
        }
        Ok(Units::from_factors(factors))
    }

    ////////// UNIT EXPRESSION PARSING //////////////////////////////////////

    /// Parse a unit expression string into a [`Units`] value.
    ///
    /// Grammar: terms separated by `*` (numerator) and `/` (each `/` starts
    /// a denominator term); each term is `identifier[^power]` with an integer
    /// or decimal power. A leading `/` puts the first term in the
    /// denominator. Results are cached per string.
    pub fn parse(&self, expression: &str) -> Result<Units> {
        if let Some(cached) = self.parse_cache.borrow().get(expression) {
            return Ok(cached.clone());
        }
        let units = self.parse_uncached(expression)?;
        self.parse_cache
            .borrow_mut()
            .insert(expression.to_string(), units.clone());
        Ok(units)
    }

    fn parse_uncached(&self, expression: &str) -> Result<Units> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Ok(Units::dimensionless());
        }

        let mut factors = Vec::new();
        let mut segments = expression.split('/');
        let numerator = segments.next().unwrap_or("");
        for token in numerator.split('*') {
            if let Some(factor) = self.parse_token(token, 1)? {
                factors.push(factor);
            }
        }
        for token in segments {
            if let Some(factor) = self.parse_token(token, -1)? {
                factors.push(factor);
            }
        }
        Ok(Units::from_factors(factors))
    }

    fn parse_token(&self, token: &str, sign: i64) -> Result<Option<(Rc<Unit>, Power)>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let (identifier, power) = match token.split_once('^') {
            Some((identifier, power)) => (identifier.trim(), parse_power(power.trim())?),
            None => (token, Power::from_integer(1)),
        };
        let unit = self.get_unit(identifier)?;
        Ok(Some((unit, power * Power::from_integer(sign))))
    }

    ////////// CONTEXTS /////////////////////////////////////////////////////

    /// Declare a new named context with an empty rule set.
    pub fn add_context(&mut self, name: &str) {
        self.contexts
            .entry(Some(name.to_string()))
            .or_default();
    }

    /// Activate a named context, or `None` for the global rules only.
    pub fn set_context(&mut self, name: Option<&str>) -> Result<()> {
        let key = name.map(str::to_string);
        if !self.contexts.contains_key(&key) {
            return Err(Error::UnitInvalid(format!(
                "unknown unit context '{}'",
                name.unwrap_or("")
            )));
        }
        self.active = key;
        self.invalidate_caches();
        Ok(())
    }

    /// The name of the active context, if any.
    pub fn active_context(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Store a named constant on a context (global when `context` is `None`).
    pub fn set_context_constant(&mut self, name: &str, value: f64, context: Option<&str>) -> Result<()> {
        self.context_mut(context)?
            .constants
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Look up a context constant, falling back from the active context to
    /// the global rules.
    pub fn context_constant(&self, name: &str) -> Option<f64> {
        for key in self.lookup_order() {
            if let Some(context) = self.contexts.get(&key) {
                if let Some(value) = context.constants.get(name) {
                    return Some(*value);
                }
            }
        }
        None
    }

    fn context_mut(&mut self, context: Option<&str>) -> Result<&mut Context> {
        let key = context.map(str::to_string);
        self.contexts
            .get_mut(&key)
            .ok_or_else(|| Error::UnitInvalid(format!("unknown unit context '{}'", context.unwrap_or(""))))
    }

    fn lookup_order(&self) -> Vec<Option<String>> {
        match &self.active {
            Some(active) => vec![Some(active.clone()), None],
            None => vec![None],
        }
    }

    /// Register a symmetric scaling between two dimension vectors.
    ///
    /// In the forward direction, a basis value with dimensions `from`
    /// multiplied by `factor` yields the basis value with dimensions `to`.
    pub fn add_scaling(
        &mut self,
        from: DimVec,
        to: DimVec,
        factor: f64,
        context: Option<&str>,
    ) -> Result<()> {
        self.context_mut(context)?
            .scalings
            .push(DimScaling { from, to, factor });
        self.scale_cache.borrow_mut().clear();
        Ok(())
    }

    /// Register a nonlinear conversion map between two unit identifiers.
    ///
    /// Identifiers are resolved to primary names at registration; the empty
    /// string denotes a dimensionless target.
    pub fn add_conversion_map(
        &mut self,
        from: &str,
        to: &str,
        map: impl Fn(f64) -> f64 + 'static,
        absolute: bool,
        context: Option<&str>,
    ) -> Result<()> {
        let from = self.resolve_map_key(from)?;
        let to = self.resolve_map_key(to)?;
        self.context_mut(context)?.conversions.push(ConversionMap {
            from,
            to,
            absolute,
            map: Rc::new(map),
        });
        Ok(())
    }

    fn resolve_map_key(&self, identifier: &str) -> Result<String> {
        if identifier.is_empty() {
            return Ok(String::new());
        }
        Ok(self.get_unit(identifier)?.name().to_string())
    }

    fn map_key(&self, units: &Units) -> Option<String> {
        if units.is_empty() {
            return Some(String::new());
        }
        let mut factors = units.factors();
        let (unit, power) = factors.next()?;
        if factors.next().is_some() || *power != Power::from_integer(1) {
            return None;
        }
        Some(unit.name().to_string())
    }

    /// Find a registered conversion map between two unit expressions with
    /// the given absolute flag, searching the active context before the
    /// global rules.
    pub fn conversion_map(
        &self,
        from: &Units,
        to: &Units,
        absolute: bool,
    ) -> Option<Rc<dyn Fn(f64) -> f64>> {
        let from_key = self.map_key(from)?;
        let to_key = self.map_key(to)?;
        for key in self.lookup_order() {
            if let Some(context) = self.contexts.get(&key) {
                for conversion in &context.conversions {
                    if conversion.from == from_key
                        && conversion.to == to_key
                        && conversion.absolute == absolute
                    {
                        return Some(Rc::clone(&conversion.map));
                    }
                }
            }
        }
        None
    }

    ////////// SCALE COMPUTATION ////////////////////////////////////////////

    /// The float `s` such that `value_in_from * s == value_in_to`.
    ///
    /// Matching dimension vectors resolve through the pure unit algebra and
    /// are memoized. Otherwise the active context (then the global rules) is
    /// searched for a dimension scaling bridging the two vectors, in either
    /// direction. No match is a [`Error::UnitConversion`].
    pub fn scale(&self, from: &Units, to: &Units) -> Result<f64> {
        let cache_key = (from.canonical(), to.canonical());
        if let Some(cached) = self.scale_cache.borrow().get(&cache_key) {
            return Ok(*cached);
        }

        let from_dims = from.dimensions();
        let to_dims = to.dimensions();

        if from_dims == to_dims {
            let scale = from.rel() / to.rel();
            self.scale_cache.borrow_mut().insert(cache_key, scale);
            return Ok(scale);
        }

        for key in self.lookup_order() {
            if let Some(context) = self.contexts.get(&key) {
                for scaling in &context.scalings {
                    if scaling.from == from_dims && scaling.to == to_dims {
                        return Ok(from.rel() * scaling.factor / to.rel());
                    }
                    if scaling.from == to_dims && scaling.to == from_dims {
                        return Ok(from.rel() / scaling.factor / to.rel());
                    }
                }
            }
        }

        Err(Error::UnitConversion {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Parse an exponent written as an integer (`2`, `-1`) or a decimal
/// (`0.5`, `-1.25`) into an exact rational.
pub(crate) fn parse_power(text: &str) -> Result<Power> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(Power::from_integer(int));
    }
    if let Some((whole, frac)) = text.split_once('.') {
        let negative = whole.starts_with('-');
        let whole = whole.trim_start_matches(['-', '+']);
        if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::UnitInvalid(format!("invalid unit power '{}'", text)));
        }
        let digits: i64 = format!("{}{}", if whole.is_empty() { "0" } else { whole }, frac)
            .parse()
            .map_err(|_| Error::UnitInvalid(format!("invalid unit power '{}'", text)))?;
        let denom = 10i64
            .checked_pow(frac.len() as u32)
            .ok_or_else(|| Error::UnitInvalid(format!("invalid unit power '{}'", text)))?;
        let ratio = Power::new(digits, denom);
        return Ok(if negative { -ratio } else { ratio });
    }
    Err(Error::UnitInvalid(format!("invalid unit power '{}'", text)))
}
