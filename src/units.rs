//! Conversions between the units used at the boundary and inside the pipeline.
//!
//! Requests are made in SI-like units (nm, Pa, m) while line databases work in
//! wavenumbers [cm⁻¹], atmospheres and centimeters.

use crate::constants::{fcn, ATM_TO_PA, M_TO_CM, NM_TO_CM};

/// Converts a vacuum wavelength [nm] to a wavenumber [cm⁻¹].
pub fn wavelength_to_wavenumber(wavelength: fcn) -> fcn {
    1.0 / (wavelength * NM_TO_CM)
}

/// Converts a wavenumber [cm⁻¹] to a vacuum wavelength [nm].
pub fn wavenumber_to_wavelength(wavenumber: fcn) -> fcn {
    1.0 / (wavenumber * NM_TO_CM)
}

/// Converts a wavelength interval [nm] around the given central wavelength [nm]
/// to the corresponding wavenumber interval [cm⁻¹].
pub fn delta_wavelength_to_delta_wavenumber(delta_wavelength: fcn, central_wavelength: fcn) -> fcn {
    delta_wavelength / (central_wavelength * central_wavelength * NM_TO_CM)
}

pub fn pa_to_atm(pressure: fcn) -> fcn {
    pressure / ATM_TO_PA
}

pub fn m_to_cm(length: fcn) -> fcn {
    length * M_TO_CM
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wavelength_and_wavenumber_are_inverse() {
        assert_relative_eq!(wavelength_to_wavenumber(1000.0), 1e4);
        assert_relative_eq!(wavenumber_to_wavelength(1e4), 1000.0);
        assert_relative_eq!(
            wavenumber_to_wavelength(wavelength_to_wavenumber(1572.3)),
            1572.3,
            max_relative = 1e-12
        );
    }

    #[test]
    fn wavelength_step_converts_at_central_wavelength() {
        // At 1000 nm, 1 nm corresponds to approximately 10 cm⁻¹
        assert_relative_eq!(delta_wavelength_to_delta_wavenumber(1.0, 1000.0), 10.0);
    }

    #[test]
    fn pressures_convert() {
        assert_relative_eq!(pa_to_atm(101_325.0), 1.0);
        assert_relative_eq!(m_to_cm(2.5), 250.0);
    }
}
