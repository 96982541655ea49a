//! Error type shared by the headroom crates.
//!
//! Reference and configuration problems are fatal and abort a run with the
//! offending identifier attached. Power-flow non-convergence has no variant
//! here: the search treats it as an infeasibility signal.
//!
//! ```
//! use headroom_core::{Bus, BusId, BusKind, Case, HeadroomError, Load, Megavars, Megawatts};
//!
//! let mut case = Case::new("demo", 100.0);
//! case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing))?;
//!
//! let err = case
//!     .add_load(Load::new(BusId::new(7), Megawatts(5.0), Megavars(1.0)))
//!     .unwrap_err();
//! assert!(matches!(err, HeadroomError::InvalidBusReference { .. }));
//! assert!(err.is_reference_error());
//! # Ok::<(), HeadroomError>(())
//! ```

use crate::BusId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeadroomError {
    /// A bus ID used by the study or a case record does not exist.
    #[error("bus {bus} referenced by {context} does not exist in the case")]
    InvalidBusReference { bus: BusId, context: String },

    /// A contingency names a branch or transformer the case does not contain.
    #[error("contingency #{scenario}: {element} does not exist in the case")]
    InvalidTopologyReference { scenario: usize, element: String },

    /// The study document or case violates a structural constraint.
    #[error("configuration error: {0}")]
    ConfigValidation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Study or case document could not be deserialized.
    #[error("parse error: {0}")]
    Parse(String),
}

pub type HeadroomResult<T> = Result<T, HeadroomError>;

impl HeadroomError {
    pub fn config(message: impl Into<String>) -> Self {
        HeadroomError::ConfigValidation(message.into())
    }

    /// True for errors that stem from the study referencing things the case lacks.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            HeadroomError::InvalidBusReference { .. }
                | HeadroomError::InvalidTopologyReference { .. }
        )
    }
}

impl From<serde_json::Error> for HeadroomError {
    fn from(err: serde_json::Error) -> Self {
        HeadroomError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeadroomError {
    fn from(err: serde_yaml::Error) -> Self {
        HeadroomError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_reference_message_names_bus_and_context() {
        let err = HeadroomError::InvalidBusReference {
            bus: BusId::new(42),
            context: "selected_buses_ids".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bus 42"));
        assert!(msg.contains("selected_buses_ids"));
        assert!(err.is_reference_error());
    }

    #[test]
    fn topology_message_names_scenario() {
        let err = HeadroomError::InvalidTopologyReference {
            scenario: 3,
            element: "branch 1-2 ckt 1".into(),
        };
        assert!(err.to_string().starts_with("contingency #3"));
    }

    #[test]
    fn io_and_parse_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(HeadroomError::from(io_err), HeadroomError::Io(_)));

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: HeadroomError = json_err.into();
        assert!(matches!(err, HeadroomError::Parse(_)));
        assert!(!err.is_reference_error());
    }
}
