use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by the simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A parameter has a value for which the simulation is not defined (e.g.
    /// a non-positive time constant or an empty energy vector).
    #[error("degenerate configuration: `{parameter}` {reason}")]
    DegenerateConfiguration {
        parameter: &'static str,
        reason: String,
    },
    /// A random distribution rejected its parameters.
    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
}

impl Error {
    pub(crate) fn degenerate(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::DegenerateConfiguration {
            parameter,
            reason: reason.into(),
        }
    }
}

/// Returns an error unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::degenerate(
            parameter,
            format!("must be finite and positive (got {value})"),
        ))
    }
}

/// Returns an error unless `value` is finite and not negative.
pub(crate) fn ensure_non_negative(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::degenerate(
            parameter,
            format!("must be finite and non-negative (got {value})"),
        ))
    }
}

/// Returns an error unless `value` lies in `[0, 1]`.
pub(crate) fn ensure_fraction(parameter: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::degenerate(
            parameter,
            format!("must lie in [0, 1] (got {value})"),
        ))
    }
}
