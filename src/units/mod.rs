//! Dimensional unit algebra
//!
//! Units are named atomic [`Unit`]s registered with a [`UnitCatalog`];
//! compound expressions of them are [`Units`] values with exact rational
//! exponents. The catalog resolves identifiers, derives prefixed variants,
//! tracks per-dimension basis units, and hosts the contexts that permit
//! cross-dimension conversions.

pub mod catalog;
pub mod compound;
pub mod si;
pub mod unit;

pub use catalog::{ConversionMap, Context, DimScaling, UnitCatalog};
pub use compound::Units;
pub use unit::{DimVec, Power, Prefix, Unit};
