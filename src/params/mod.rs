//! Parameter management: definitions, resolution, bounds, sweeps, profiles

pub mod bounds;
pub mod definition;
pub mod expression;
pub mod profile;
pub mod range;
pub mod store;

pub use bounds::Bounds;
pub use definition::{Definition, FnArg, FnOutput, ParamFn, ParamRef, Retrieved, ValueSpec};
pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use profile::{Profile, ProfileQuantity, ProfileValue, UnitDef};
pub use range::{RangeSpec, Sampler};
pub use store::{Overrides, ParameterStore};
