//! Range specifications for parameter sweeps
//!
//! A sweep assigns each swept parameter either a literal list of values or
//! a `(start, stop, count)` span drawn through a [`Sampler`]. All swept
//! parameters must produce the same number of steps.

use std::fmt;
use std::rc::Rc;

use ndarray::Array1;

use crate::params::definition::ValueSpec;

type SamplerFn = dyn Fn(f64, f64, usize) -> Array1<f64>;

/// How a `(start, stop, count)` span is sampled.
#[derive(Clone)]
pub enum Sampler {
    /// Evenly spaced steps.
    Linear,
    /// Logarithmically bunched towards the start.
    Log,
    /// Logarithmically bunched towards the stop.
    InvLog,
    /// A user-supplied sampling function.
    Custom(Rc<SamplerFn>),
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sampler::Linear => write!(f, "Linear"),
            Sampler::Log => write!(f, "Log"),
            Sampler::InvLog => write!(f, "InvLog"),
            Sampler::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Sampler {
    /// Draw `count` samples across `[start, stop]`.
    pub fn sample(&self, start: f64, stop: f64, count: usize) -> Array1<f64> {
        match self {
            Sampler::Linear => Array1::linspace(start, stop, count),
            Sampler::Log => {
                let logged = log_points(count);
                let last = logged[count - 1];
                let first = logged[0];
                logged.mapv(|v| (v - first) * (stop - start) / last + start)
            }
            Sampler::InvLog => {
                let logged = log_points(count);
                let last = logged[count - 1];
                let first = logged[0];
                let reversed = Array1::from_iter(logged.iter().rev().copied());
                reversed.mapv(|v| (v - first) * (stop - start) / last + start)
            }
            Sampler::Custom(f) => f(start, stop, count),
        }
    }
}

/// `10^v` for `v` evenly spaced over `[1, 10]`.
fn log_points(count: usize) -> Array1<f64> {
    Array1::linspace(1.0, 10.0, count).mapv(|v| 10f64.powf(v))
}

/// One parameter's assignment in a sweep.
#[derive(Debug, Clone)]
pub enum RangeSpec {
    /// Explicit values, one per step.
    Values(Vec<ValueSpec>),
    /// A sampled span; `start` and `stop` are scaled endpoints resolved
    /// through the parameter's declared units.
    Span {
        start: ValueSpec,
        stop: ValueSpec,
        count: usize,
        sampler: Sampler,
    },
    /// A fixed override applied at every step.
    Static(ValueSpec),
}

impl RangeSpec {
    /// A linear `(start, stop, count)` span.
    pub fn span(start: impl Into<ValueSpec>, stop: impl Into<ValueSpec>, count: usize) -> Self {
        RangeSpec::Span {
            start: start.into(),
            stop: stop.into(),
            count,
            sampler: Sampler::Linear,
        }
    }

    /// A `(start, stop, count, sampler)` span.
    pub fn sampled(
        start: impl Into<ValueSpec>,
        stop: impl Into<ValueSpec>,
        count: usize,
        sampler: Sampler,
    ) -> Self {
        RangeSpec::Span {
            start: start.into(),
            stop: stop.into(),
            count,
            sampler,
        }
    }

    /// Explicit per-step values.
    pub fn values(values: impl IntoIterator<Item = impl Into<ValueSpec>>) -> Self {
        RangeSpec::Values(values.into_iter().map(Into::into).collect())
    }

    /// A fixed override for every step.
    pub fn fixed(value: impl Into<ValueSpec>) -> Self {
        RangeSpec::Static(value.into())
    }

    /// The number of steps this spec pins down, if any.
    pub fn step_count(&self) -> Option<usize> {
        match self {
            RangeSpec::Values(values) => Some(values.len()),
            RangeSpec::Span { count, .. } => Some(*count),
            RangeSpec::Static(_) => None,
        }
    }
}
