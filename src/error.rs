//! Error types and macros for exiting on fatal errors.

use crate::database::{DatabaseSource, WavenumberRange};
use std::io;
use thiserror::Error;

#[cfg(not(feature = "for-testing"))]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        eprintln!($($print_arg)*);
        quit::with_code(1);
    }};
}

#[cfg(feature = "for-testing")]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        panic!($($print_arg)*);
    }};
}

#[macro_export]
macro_rules! exit_on_error {
    ($result:expr, $($print_arg:tt)*) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::exit_with_error!($($print_arg)*, err)
            }
        }
    };
}

#[macro_export]
macro_rules! exit_on_false {
    ($logic:expr, $($print_arg:tt)*) => {
        if $logic {
            true
        } else {
            $crate::exit_with_error!($($print_arg)*)
        }
    };
}

#[macro_export]
macro_rules! exit_on_none {
    ($option:expr, $($print_arg:tt)*) => {
        $option.unwrap_or_else(|| $crate::exit_with_error!($($print_arg)*))
    };
}

/// Failures of the line database provider.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Credentials were missing or rejected for a source requiring them.
    #[error("Authentication against {database} failed: {reason}")]
    Authentication {
        database: DatabaseSource,
        reason: String,
    },

    /// The source has no lines for the requested molecule, isotopes and range.
    #[error("No {database} lines available for {molecule} (isotopes {isotopes}) in {range}")]
    DataUnavailable {
        database: DatabaseSource,
        molecule: String,
        isotopes: String,
        range: WavenumberRange,
    },

    /// Transient failure while fetching from the remote. The caller may retry.
    #[error("Could not fetch {molecule} lines in {range} from {database}: {message}")]
    Network {
        database: DatabaseSource,
        molecule: String,
        range: WavenumberRange,
        message: String,
    },

    /// The request itself is malformed.
    #[error("Invalid line request: {0}")]
    InvalidRequest(String),

    /// Reading or writing the backing line store failed.
    #[error("Line cache storage failed: {0}")]
    Store(#[from] io::Error),
}

impl DatabaseError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Violation of one of the invariants of a [`Condition`](crate::condition::Condition).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum InvalidConditionError {
    #[error("{quantity} must be finite, got {value}")]
    NonFinite { quantity: &'static str, value: f64 },

    #[error("Temperature must be positive, got {0} K")]
    NonPositiveTemperature(f64),

    #[error("Pressure must be positive, got {0} Pa")]
    NonPositivePressure(f64),

    #[error("Path length must be positive, got {0} m")]
    NonPositivePathLength(f64),

    #[error("Mole fraction of {molecule} must be in [0, 1], got {value}")]
    MoleFractionOutOfRange { molecule: String, value: f64 },

    #[error("Mole fractions must sum to at most 1, got {0}")]
    MoleFractionSumExceedsOne(f64),

    #[error("Unknown molecule {0} in mole fractions")]
    UnknownMolecule(String),

    #[error("Mole fraction of {0} is given more than once")]
    DuplicateMolecule(String),

    #[error("Fraction of broadening partner {partner} must be non-negative, got {value}")]
    NegativeDiluentFraction { partner: String, value: f64 },

    #[error("Broadening partner fractions must not all be zero")]
    EmptyDiluent,
}

/// Invalid specification of a spectral grid.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GridError {
    #[error("Spectral grid must have at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("Spectral grid range must be finite with min < max, got [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },

    #[error("Spectral grid step must be finite and positive, got {0}")]
    InvalidStep(f64),

    /// The grid would need more points than can be allocated.
    #[error("Spectral grid would have {requested} points, at most {max} are supported")]
    TooManyPoints { requested: f64, max: usize },
}

/// Non-fatal notice that a requested compute device could not be used and the
/// summation was carried out on the CPU instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Device {requested} unavailable ({reason}), falling back to CPU")]
pub struct DeviceFallbackWarning {
    pub requested: String,
    pub reason: String,
}

/// Failures of a compute backend executing an offloaded summation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Device {0} is not served by this backend")]
    Unsupported(String),

    #[error("Execution on device {device} failed: {message}")]
    Execution { device: String, message: String },
}

/// Lookup failures in the molecule catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MoleculeError {
    #[error("Unknown molecule {0}")]
    UnknownMolecule(String),

    #[error("Invalid isotopologue {isotope} for {molecule}")]
    UnknownIsotope { molecule: String, isotope: String },
}

/// Any fatal error raised while simulating a spectrum.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Condition(#[from] InvalidConditionError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Molecule(#[from] MoleculeError),

    #[error("{0}")]
    InvalidInput(String),
}
