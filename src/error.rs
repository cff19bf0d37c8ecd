//! Error types for the lending-cycle pipeline.
//!
//! Classification happens once, at the step boundary: a raw gateway error is
//! turned into a reason string by the step runner, and nothing downstream
//! re-interprets it. Every value of [`Error`] is pipeline-fatal; recoverable
//! step failures are swallowed (with a warning) before they ever become one.

use std::fmt;

use crate::risk::CapacityError;

/// Fatal pipeline error.
#[derive(Debug)]
pub enum Error {
    /// Transport or node failure outside a classified step.
    ///
    /// Reads (balances, allowances, oracle quotes) and provider construction
    /// fail through here. No automatic retry is attempted.
    Gateway(String),

    /// A pipeline-fatal step failed.
    ///
    /// Carried with the step name and the classified reason; best-effort
    /// steps never produce this variant.
    Step {
        /// Name of the failing step.
        step: &'static str,
        /// Classified failure reason.
        reason: String,
        /// Likely causes, when the step has known failure modes.
        hint: Option<&'static str>,
    },

    /// The proposed borrow violates the capacity policy.
    ///
    /// Raised before any borrow transaction is attempted.
    Capacity(CapacityError),
}

impl Error {
    /// Creates a fatal step error without a hint.
    pub fn step(step: &'static str, reason: impl Into<String>) -> Self {
        Error::Step {
            step,
            reason: reason.into(),
            hint: None,
        }
    }

    /// Creates a fatal step error with a likely-causes hint.
    pub fn step_with_hint(
        step: &'static str,
        reason: impl Into<String>,
        hint: &'static str,
    ) -> Self {
        Error::Step {
            step,
            reason: reason.into(),
            hint: Some(hint),
        }
    }

    /// Name of the step that failed, when the failure is step-local.
    #[must_use]
    pub fn failing_step(&self) -> Option<&'static str> {
        match self {
            Error::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Gateway(e) => write!(f, "Gateway error: {}", e),
            Error::Step { step, reason, hint } => {
                write!(f, "Step '{}' failed: {}", step, reason)?;
                if let Some(hint) = hint {
                    write!(f, " (likely causes: {})", hint)?;
                }
                Ok(())
            }
            Error::Capacity(e) => write!(f, "Capacity error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Capacity(e) => Some(e),
            _ => None,
        }
    }
}

// Conversion implementations for ergonomic error handling

impl From<CapacityError> for Error {
    fn from(e: CapacityError) -> Self {
        Error::Capacity(e)
    }
}

impl From<alloy::transports::TransportError> for Error {
    fn from(e: alloy::transports::TransportError) -> Self {
        Error::Gateway(e.to_string())
    }
}

impl From<alloy::contract::Error> for Error {
    fn from(e: alloy::contract::Error) -> Self {
        Error::Gateway(e.to_string())
    }
}

// Allow converting anyhow errors for compatibility with the read helpers
impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Gateway(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;

    #[test]
    fn test_step_display_includes_hint() {
        let err = Error::step_with_hint("borrow", "reverted", "insufficient market liquidity");
        let rendered = err.to_string();
        assert!(rendered.contains("borrow"));
        assert!(rendered.contains("insufficient market liquidity"));
        assert_eq!(err.failing_step(), Some("borrow"));
    }

    #[test]
    fn test_capacity_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::from(CapacityError::ExceedsCeiling {
            proposed: U256::from(100u64),
            ceiling: U256::from(86u64),
        });
        assert!(err.source().is_some());
        assert_eq!(err.failing_step(), None);
    }
}
