//! Parameter profiles: JSON persistence of store state
//!
//! A [`Profile`] is the serializable snapshot of a [`ParameterStore`]:
//! custom units, the active unit context, dimension scalings, declared
//! parameter units, constant values, and expression-defined parameters.
//! Functional definitions backed by closures have no portable form and are
//! skipped on export with a warning.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::params::definition::ValueSpec;
use crate::params::store::ParameterStore;
use crate::quantity::Value;
use crate::units::{DimVec, Unit};

/// A scalar or array value in its serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Scalar(f64),
    Array(Vec<f64>),
}

impl From<&Value> for ProfileValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Scalar(v) => ProfileValue::Scalar(*v),
            Value::Array(a) => ProfileValue::Array(a.to_vec()),
        }
    }
}

impl From<&ProfileValue> for Value {
    fn from(value: &ProfileValue) -> Self {
        match value {
            ProfileValue::Scalar(v) => Value::Scalar(*v),
            ProfileValue::Array(a) => Value::from(a.clone()),
        }
    }
}

/// A quantity in its serialized form: a value and a unit expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileQuantity {
    pub value: ProfileValue,
    pub units: String,
}

fn default_prefixable() -> bool {
    true
}

/// A custom unit definition in its serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abbrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    pub rel: f64,
    #[serde(default = "default_prefixable")]
    pub prefixable: bool,
    pub dimensions: DimVec,
}

impl From<&Unit> for UnitDef {
    fn from(unit: &Unit) -> Self {
        Self {
            name: unit.name().to_string(),
            aliases: unit.names()[1..].to_vec(),
            abbrs: unit.abbrs().to_vec(),
            plural: unit.plural().map(str::to_string),
            rel: unit.rel(),
            prefixable: unit.prefixable(),
            dimensions: unit.dimensions().clone(),
        }
    }
}

impl UnitDef {
    fn build(&self) -> Unit {
        let mut unit = Unit::new(&self.name, self.rel);
        for alias in &self.aliases {
            unit = unit.with_alias(alias);
        }
        for abbr in &self.abbrs {
            unit = unit.with_abbr(abbr);
        }
        if let Some(plural) = &self.plural {
            unit = unit.with_plural(plural);
        }
        if !self.prefixable {
            unit = unit.no_prefix();
        }
        for (dimension, power) in &self.dimensions {
            unit = unit.with_dimension_power(dimension, *power);
        }
        unit
    }
}

/// A serializable snapshot of a [`ParameterStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<UnitDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scalings: BTreeMap<String, ProfileQuantity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_units: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ProfileQuantity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expressions: BTreeMap<String, String>,
}

impl Profile {
    /// Capture the current state of a store.
    pub fn from_store(store: &ParameterStore) -> Self {
        let mut profile = Profile {
            units: store.custom_units().iter().map(UnitDef::from).collect(),
            context: store.catalog().active_context().map(str::to_string),
            ..Profile::default()
        };

        for (dimension, q) in store.scalings() {
            profile.scalings.insert(
                dimension.to_string(),
                ProfileQuantity {
                    value: q.value().into(),
                    units: q.units().canonical(),
                },
            );
        }

        for (name, q) in store.constants() {
            profile.parameters.insert(
                name.to_string(),
                ProfileQuantity {
                    value: q.value().into(),
                    units: q.units().canonical(),
                },
            );
        }

        for (name, source) in store.function_sources() {
            match source {
                Some(source) => {
                    profile
                        .expressions
                        .insert(name.to_string(), source.to_string());
                }
                None => warn!(
                    param = name,
                    "functional definition has no expression source and was \
                     not exported"
                ),
            }
        }

        // Declared units only matter for names without a stored value.
        for (name, units) in store.declared_units() {
            if !profile.parameters.contains_key(name) && !profile.expressions.contains_key(name) {
                profile
                    .parameter_units
                    .insert(name.to_string(), units.canonical());
            }
        }

        profile
    }

    /// Apply this profile on top of a store.
    ///
    /// Existing definitions with the same names are replaced; everything
    /// else is left alone.
    pub fn apply(&self, store: &mut ParameterStore) -> Result<()> {
        for unit in &self.units {
            store.unit_add(unit.build());
        }
        store.set_units_context(self.context.as_deref())?;
        store.set_scaling(self.scalings.iter().map(|(dimension, q)| {
            (
                dimension.clone(),
                ValueSpec::Pair(Value::from(&q.value), q.units.clone()),
            )
        }))?;
        store.set_units(
            self.parameter_units
                .iter()
                .map(|(name, units)| (name.clone(), units.clone())),
        )?;
        store.set_raw(self.parameters.iter().map(|(name, q)| {
            (
                name.clone(),
                ValueSpec::Pair(Value::from(&q.value), q.units.clone()),
            )
        }))?;
        store.set_raw(
            self.expressions
                .iter()
                .map(|(name, source)| (name.clone(), ValueSpec::Expression(source.clone()))),
        )?;
        Ok(())
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ParameterStore {
    /// Write the store's state to a JSON profile file.
    pub fn save_profile(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &Profile::from_store(self))?;
        Ok(())
    }

    /// Read a JSON profile file and apply it on top of this store.
    pub fn load_profile(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::open(path)?;
        let profile: Profile = serde_json::from_reader(BufReader::new(file))?;
        profile.apply(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn populated_store() -> ParameterStore {
        let mut store = ParameterStore::new();
        store.unit_add(
            Unit::new("testunit", 1e7)
                .with_abbr("TU")
                .no_prefix()
                .with_dimension("length", 1)
                .with_dimension("mass", 1),
        );
        store
            .set_scaling([("length", ValueSpec::from((2.0, "nm")))])
            .unwrap();
        store.set_units([("pending", "ms")]).unwrap();
        store
            .set_raw([
                ("x", (1.5, "km").into()),
                ("amps", (vec![1.0, 2.0], "mA").into()),
                ("y", "x^2 + 1".into()),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_round_trip_through_json() {
        let store = populated_store();
        let json = Profile::from_store(&store).to_json().unwrap();
        let profile = Profile::from_json(&json).unwrap();

        let mut restored = ParameterStore::new();
        profile.apply(&mut restored).unwrap();

        assert!(restored.get("_x").unwrap().as_quantity().unwrap().approx_eq(
            store.get("_x").unwrap().as_quantity().unwrap()
        ));
        assert_relative_eq!(
            restored.get("y").unwrap().as_scalar().unwrap(),
            store.get("y").unwrap().as_scalar().unwrap()
        );
        assert!(restored.catalog().has("TU"));
        assert_eq!(
            restored.units("pending"),
            Some(&restored.catalog().parse("ms").unwrap())
        );
        assert!(restored
            .scaling("length")
            .unwrap()
            .approx_eq(store.scaling("length").unwrap()));
    }

    #[test]
    fn test_closure_definitions_are_skipped() {
        use crate::params::definition::{FnOutput, ParamFn};

        let mut store = ParameterStore::new();
        store
            .set_raw([(
                "opaque",
                ParamFn::new(vec![], |_| Ok(FnOutput::Single(ValueSpec::Scalar(1.0)))).into(),
            )])
            .unwrap();

        let profile = Profile::from_store(&store);
        assert!(profile.expressions.is_empty());
        assert!(!profile.parameters.contains_key("opaque"));
    }

    #[test]
    fn test_save_and_load_files() {
        let store = populated_store();
        let path = std::env::temp_dir().join(format!(
            "dimparams-profile-{}.json",
            std::process::id()
        ));
        store.save_profile(&path).unwrap();

        let mut restored = ParameterStore::new();
        restored.load_profile(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_relative_eq!(
            restored.get("x").unwrap().as_scalar().unwrap(),
            1500.0 / 2e-9
        );
    }

    #[test]
    fn test_unit_def_round_trip() {
        let unit = Unit::new("widget", 42.0)
            .with_alias("widgets_alt")
            .with_abbr("wd")
            .with_plural("widgets")
            .no_prefix()
            .with_dimension("length", 2);
        let rebuilt = UnitDef::from(&unit).build();
        assert_eq!(rebuilt, unit);
    }
}
