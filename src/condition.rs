//! Physical state of the absorbing gas.

use crate::{
    constants::{fcn, KBOLTZMANN, PA_TO_DYNE_CM2},
    error::InvalidConditionError,
    molecule::Molecule,
    units,
};

/// Name of the broadening partner making up the gas not otherwise specified.
pub const AIR: &str = "air";

/// Validated temperature, pressure, composition and path length of a gas.
///
/// Mole fractions are held in order of molecule number. The broadening
/// partners (diluent) fill the remainder `1 - Σx` of the gas not made up of
/// the listed molecules; without an explicit diluent this remainder is air.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    temperature: fcn,
    pressure: fcn,
    mole_fractions: Vec<(&'static Molecule, fcn)>,
    path_length: fcn,
    diluent: Vec<(String, fcn)>,
}

/// Creates a condition from the temperature [K], pressure [Pa], mole fractions
/// of molecules given by formula and path length [m].
///
/// The remainder of the gas is taken to be air.
pub fn make_condition(
    temperature: fcn,
    pressure: fcn,
    mole_fractions: &[(&str, fcn)],
    path_length: fcn,
) -> Result<Condition, InvalidConditionError> {
    Condition::new(temperature, pressure, mole_fractions, path_length)
}

fn verify_finite(quantity: &'static str, value: fcn) -> Result<(), InvalidConditionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InvalidConditionError::NonFinite { quantity, value })
    }
}

impl Condition {
    pub fn new(
        temperature: fcn,
        pressure: fcn,
        mole_fractions: &[(&str, fcn)],
        path_length: fcn,
    ) -> Result<Self, InvalidConditionError> {
        verify_finite("Temperature", temperature)?;
        verify_finite("Pressure", pressure)?;
        verify_finite("Path length", path_length)?;

        if temperature <= 0.0 {
            return Err(InvalidConditionError::NonPositiveTemperature(temperature));
        }
        if pressure <= 0.0 {
            return Err(InvalidConditionError::NonPositivePressure(pressure));
        }
        if path_length <= 0.0 {
            return Err(InvalidConditionError::NonPositivePathLength(path_length));
        }

        let mut validated: Vec<(&'static Molecule, fcn)> = Vec::with_capacity(mole_fractions.len());
        for &(formula, value) in mole_fractions {
            let molecule = Molecule::from_formula(formula)
                .map_err(|_| InvalidConditionError::UnknownMolecule(formula.to_string()))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(InvalidConditionError::MoleFractionOutOfRange {
                    molecule: molecule.formula.to_string(),
                    value,
                });
            }
            if validated.iter().any(|(existing, _)| existing.id == molecule.id) {
                return Err(InvalidConditionError::DuplicateMolecule(
                    molecule.formula.to_string(),
                ));
            }
            validated.push((molecule, value));
        }
        validated.sort_by_key(|(molecule, _)| molecule.id);

        let total: fcn = validated.iter().map(|(_, value)| value).sum();
        // Allow for round-off in fractions meant to sum to exactly one
        if total > 1.0 + 1e-12 {
            return Err(InvalidConditionError::MoleFractionSumExceedsOne(total));
        }

        Ok(Self {
            temperature,
            pressure,
            mole_fractions: validated,
            path_length,
            diluent: vec![(AIR.to_string(), (1.0 - total).max(0.0))],
        })
    }

    /// Replaces the air remainder with the given broadening partners.
    ///
    /// The partner fractions are relative proportions; they are normalized to
    /// fill the part of the gas not made up of the absorbing molecules.
    pub fn with_diluent(mut self, diluent: &[(&str, fcn)]) -> Result<Self, InvalidConditionError> {
        for &(partner, value) in diluent {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidConditionError::NegativeDiluentFraction {
                    partner: partner.to_string(),
                    value,
                });
            }
        }
        let proportion_sum: fcn = diluent.iter().map(|(_, value)| value).sum();
        if proportion_sum <= 0.0 {
            return Err(InvalidConditionError::EmptyDiluent);
        }
        let remainder = self.diluent_fraction();
        self.diluent = diluent
            .iter()
            .map(|&(partner, value)| {
                (
                    partner.trim().to_string(),
                    remainder * value / proportion_sum,
                )
            })
            .collect();
        Ok(self)
    }

    /// Temperature [K].
    pub fn temperature(&self) -> fcn {
        self.temperature
    }

    /// Pressure [Pa].
    pub fn pressure(&self) -> fcn {
        self.pressure
    }

    pub fn pressure_atm(&self) -> fcn {
        units::pa_to_atm(self.pressure)
    }

    /// Path length [m].
    pub fn path_length(&self) -> fcn {
        self.path_length
    }

    pub fn path_length_cm(&self) -> fcn {
        units::m_to_cm(self.path_length)
    }

    pub fn mole_fractions(&self) -> &[(&'static Molecule, fcn)] {
        &self.mole_fractions
    }

    /// Mole fraction of the molecule with the given HITRAN number, if it is
    /// part of the gas.
    pub fn mole_fraction(&self, molecule_id: u8) -> Option<fcn> {
        self.mole_fractions
            .iter()
            .find(|(molecule, _)| molecule.id == molecule_id)
            .map(|&(_, value)| value)
    }

    pub fn total_mole_fraction(&self) -> fcn {
        self.mole_fractions.iter().map(|(_, value)| value).sum()
    }

    /// Broadening partners with their absolute mole fractions.
    pub fn diluent(&self) -> &[(String, fcn)] {
        &self.diluent
    }

    /// Fraction of the gas not made up of the listed molecules.
    pub fn diluent_fraction(&self) -> fcn {
        (1.0 - self.total_mole_fraction()).max(0.0)
    }

    /// Total number density of the gas [molecules/cm³].
    pub fn total_number_density(&self) -> fcn {
        self.pressure * PA_TO_DYNE_CM2 / (KBOLTZMANN * self.temperature)
    }

    /// Number density [molecules/cm³] of the molecule with the given HITRAN
    /// number, which is zero if the molecule is not part of the gas.
    pub fn number_density(&self, molecule_id: u8) -> fcn {
        self.mole_fraction(molecule_id).unwrap_or(0.0) * self.total_number_density()
    }
}
