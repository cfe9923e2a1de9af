//! Physical and mathematical constants.

/// Floating-point precision to use for constants.
#[allow(non_camel_case_types)]
pub type fcn = f64;

// Mathematical constants

pub const PI: fcn = std::f64::consts::PI;
/// Natural logarithm of 2.
pub const LN_2: fcn = std::f64::consts::LN_2;
/// 1/sqrt(pi).
pub const INV_SQRT_PI: fcn = 0.564_189_583_547_756_3;

// Physical constants

/// Atomic mass unit [g].
pub const AMU: fcn = 1.660_539_066_6e-24;
/// Speed of light in vacuum [cm/s].
pub const CLIGHT: fcn = 2.997_924_58e10;
/// Boltzmann constant [erg/K].
pub const KBOLTZMANN: fcn = 1.380_649e-16;
/// Planck constant [erg s].
pub const HPLANCK: fcn = 6.626_070_15e-27;
/// Second radiation constant hc/k [cm K].
pub const C2: fcn = HPLANCK * CLIGHT / KBOLTZMANN;

// Reference state of the line databases

/// Reference temperature of HITRAN line intensities and widths [K].
pub const T_REF: fcn = 296.0;
/// Reference pressure of HITRAN broadening coefficients [atm].
pub const P_REF_ATM: fcn = 1.0;

// Unit conversion factors

/// Conversion factor from atmospheres to Pascal.
pub const ATM_TO_PA: fcn = 1.013_25e5;
/// Conversion factor from Pascal to dynes per square centimeter.
pub const PA_TO_DYNE_CM2: fcn = 10.0;
/// Conversion factor from meters to centimeters.
pub const M_TO_CM: fcn = 1e2;
/// Conversion factor from nanometers to centimeters.
pub const NM_TO_CM: fcn = 1e-7;
