//! # dimparams
//!
//! `dimparams` is a physical parameter management library: a dimensional
//! unit algebra, quantities with automatic conversion, and a parameter
//! store that resolves interdependent parameters on demand.
//!
//! The library provides:
//! - A unit catalog with SI units, prefixes, per-dimension bases, and
//!   named contexts for domain-specific conversions
//! - Quantities (scalar or array valued) with unit arithmetic, nonlinear
//!   conversion maps, and absolute/relative semantics
//! - A parameter store with functional definitions, invertible overrides,
//!   bounds, non-dimensionalisation, sweeps, scopes, and JSON profiles
//!
//! ## Basic Usage
//!
//! ```
//! use dimparams::params::ParameterStore;
//!
//! let mut store = ParameterStore::new();
//! store.set_raw([
//!     ("distance", (6.0, "m").into()),
//!     ("time", (2.0, "s").into()),
//!     ("speed", "distance / time".into()),
//! ]).unwrap();
//!
//! // Scaled value in the SI basis.
//! assert_eq!(store.get("speed").unwrap().as_scalar(), Some(3.0));
//! ```

// Public modules
pub mod error;
pub mod params;
pub mod quantity;
pub mod units;

// Re-export commonly used types
pub use error::{Error, Result};
pub use params::{ParameterStore, RangeSpec, Retrieved, ValueSpec};
pub use quantity::{Quantity, Value};
pub use units::{Unit, UnitCatalog, Units};
