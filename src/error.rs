use thiserror::Error;

/// Error types for the dimparams library.
///
/// Structural and configuration problems (unknown units, dimension
/// mismatches, dependency cycles, invertibility failures) are always hard
/// errors. Bounds violations and overriding non-invertible functions are
/// policy-controlled and may instead be reported as warnings by the
/// [`ParameterStore`](crate::params::ParameterStore), depending on
/// configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// An unknown unit identifier, or a malformed unit construction.
    #[error("Invalid unit: {0}")]
    UnitInvalid(String),

    /// Units whose dimension vectors differ, with no context scaling or
    /// conversion map to bridge them.
    #[error("Cannot convert from '{from}' to '{to}': units do not match")]
    UnitConversion { from: String, to: String },

    /// A null or unparseable numeric value.
    #[error("Invalid quantity value: {0}")]
    QuantityValue(String),

    /// A malformed (value, unit) pair or other failed value coercion.
    #[error("Cannot coerce value into a quantity: {0}")]
    QuantityCoercion(String),

    /// A bad parameter identifier, or a reference that cannot be resolved.
    #[error("Invalid parameter: {0}")]
    ParameterInvalid(String),

    /// A functional definition whose transitive dependencies include itself.
    #[error("Recursive parameter definition: {0}")]
    ParameterRecursion(String),

    /// The inverse direction was requested on a non-invertible function.
    #[error("Parameter '{0}' has a functional definition that is not invertible")]
    ParameterNotInvertible(String),

    /// Two inversions resolved conflicting values for a shared dependency.
    #[error("Parameter '{0}' is overspecified, with contradictory values")]
    ParameterOverSpecified(String),

    /// A non-dimensionalisation scaling whose units have the wrong dimension.
    #[error("Invalid scaling units: {0}")]
    ScalingUnitInvalid(String),

    /// A non-dimensionalisation scaling for an unknown dimension.
    #[error("Invalid scaling dimension: {0}")]
    ScalingDimensionInvalid(String),

    /// A value outside its configured bounds, under the `error` policy.
    #[error("Value {value} for '{param}' outside of bounds {bounds}")]
    ParameterOutsideBounds {
        param: String,
        value: String,
        bounds: String,
    },

    /// An expression that cannot be reduced to a callable.
    #[error("Cannot compile parameter expression: {0}")]
    ExpressionOptimisation(String),

    /// Expression evaluation failure.
    #[error("Expression error: {0}")]
    Expression(#[from] crate::params::expression::ExpressionError),

    /// I/O error wrapper (profile load/save).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (profile load/save).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for dimparams operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnitInvalid("parsec".to_string());
        assert!(format!("{}", err).contains("parsec"));

        let err = Error::UnitConversion {
            from: "kg".to_string(),
            to: "s".to_string(),
        };
        assert!(format!("{}", err).contains("'kg'"));
        assert!(format!("{}", err).contains("'s'"));

        let err = Error::ParameterOverSpecified("x".to_string());
        assert!(format!("{}", err).contains("overspecified"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => (),
            _ => panic!("Expected Io variant"),
        }
    }
}
