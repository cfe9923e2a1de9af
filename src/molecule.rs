//! Catalogue of the molecules and isotopologues found in HITRAN-style line lists.

use crate::{
    constants::{fcn, AMU, C2, T_REF},
    error::MoleculeError,
};
use std::fmt;

/// Shape of the molecule, which decides how the rotational partition function
/// scales with temperature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotorGeometry {
    Linear,
    Nonlinear,
}

impl RotorGeometry {
    /// Exponent n in the rigid-rotor scaling Q_rot ∝ T^n.
    pub fn rotational_exponent(&self) -> fcn {
        match self {
            Self::Linear => 1.0,
            Self::Nonlinear => 1.5,
        }
    }
}

/// A single isotopic variant of a molecule.
#[derive(Clone, Debug, PartialEq)]
pub struct Isotopologue {
    /// HITRAN local isotopologue number (1 is the most abundant).
    pub local_id: u8,
    /// AFGL code, e.g. `626` for ¹⁶O¹²C¹⁶O.
    pub code: &'static str,
    /// Molar mass [g/mol].
    pub molar_mass: fcn,
    /// Natural terrestrial abundance.
    pub abundance: fcn,
}

impl Isotopologue {
    /// Mass of a single molecule [g].
    pub fn mass(&self) -> fcn {
        self.molar_mass * AMU
    }
}

/// A molecule as identified in HITRAN.
#[derive(Debug, PartialEq)]
pub struct Molecule {
    /// HITRAN molecule number.
    pub id: u8,
    pub formula: &'static str,
    pub geometry: RotorGeometry,
    /// Harmonic vibrational fundamentals [cm⁻¹] with their degeneracies.
    pub vibrational_modes: &'static [(fcn, u32)],
    pub isotopologues: &'static [Isotopologue],
}

macro_rules! isotopologues {
    ($(($local_id:expr, $code:expr, $molar_mass:expr, $abundance:expr)),+ $(,)?) => {
        &[$(Isotopologue {
            local_id: $local_id,
            code: $code,
            molar_mass: $molar_mass,
            abundance: $abundance,
        }),+]
    };
}

pub static MOLECULES: [Molecule; 15] = [
    Molecule {
        id: 1,
        formula: "H2O",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[(3657.0, 1), (1595.0, 1), (3756.0, 1)],
        isotopologues: isotopologues![
            (1, "161", 18.010_565, 0.997_317),
            (2, "181", 20.014_811, 0.002_000),
            (3, "171", 19.014_780, 3.718_840e-4),
            (4, "162", 19.016_740, 3.106_930e-4),
        ],
    },
    Molecule {
        id: 2,
        formula: "CO2",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(1388.0, 1), (667.0, 2), (2349.0, 1)],
        isotopologues: isotopologues![
            (1, "626", 43.989_830, 0.984_204),
            (2, "636", 44.993_185, 0.011_057),
            (3, "628", 45.994_076, 0.003_947),
            (4, "627", 44.994_045, 7.339_890e-4),
        ],
    },
    Molecule {
        id: 3,
        formula: "O3",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[(1103.0, 1), (701.0, 1), (1042.0, 1)],
        isotopologues: isotopologues![(1, "666", 47.984_745, 0.992_901)],
    },
    Molecule {
        id: 4,
        formula: "N2O",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(1285.0, 1), (589.0, 2), (2224.0, 1)],
        isotopologues: isotopologues![
            (1, "446", 44.001_062, 0.990_333),
            (2, "456", 44.998_096, 0.003_641),
            (3, "546", 44.998_096, 0.003_641),
        ],
    },
    Molecule {
        id: 5,
        formula: "CO",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(2143.0, 1)],
        isotopologues: isotopologues![
            (1, "26", 27.994_915, 0.986_544),
            (2, "36", 28.998_270, 0.011_084),
            (3, "28", 29.999_161, 0.001_978),
        ],
    },
    Molecule {
        id: 6,
        formula: "CH4",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[(2917.0, 1), (1534.0, 2), (3019.0, 3), (1306.0, 3)],
        isotopologues: isotopologues![
            (1, "211", 16.031_300, 0.988_274),
            (2, "311", 17.034_655, 0.011_103),
            (3, "212", 17.037_475, 6.157_510e-4),
        ],
    },
    Molecule {
        id: 7,
        formula: "O2",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(1556.0, 1)],
        isotopologues: isotopologues![
            (1, "66", 31.989_830, 0.995_262),
            (2, "68", 33.994_076, 0.003_991),
        ],
    },
    Molecule {
        id: 8,
        formula: "NO",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(1876.0, 1)],
        isotopologues: isotopologues![(1, "46", 29.997_989, 0.993_974)],
    },
    Molecule {
        id: 9,
        formula: "SO2",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[(1151.0, 1), (518.0, 1), (1362.0, 1)],
        isotopologues: isotopologues![(1, "626", 63.961_901, 0.945_678)],
    },
    Molecule {
        id: 10,
        formula: "NO2",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[(1320.0, 1), (750.0, 1), (1617.0, 1)],
        isotopologues: isotopologues![(1, "646", 45.992_904, 0.991_616)],
    },
    Molecule {
        id: 11,
        formula: "NH3",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[(3337.0, 1), (950.0, 1), (3444.0, 2), (1627.0, 2)],
        isotopologues: isotopologues![
            (1, "4111", 17.026_549, 0.995_872),
            (2, "5111", 18.023_583, 0.003_661),
        ],
    },
    Molecule {
        id: 12,
        formula: "HNO3",
        geometry: RotorGeometry::Nonlinear,
        vibrational_modes: &[
            (3550.0, 1),
            (1710.0, 1),
            (1326.0, 1),
            (1303.0, 1),
            (879.0, 1),
            (647.0, 1),
            (580.0, 1),
            (458.0, 1),
            (763.0, 1),
        ],
        isotopologues: isotopologues![(1, "146", 62.995_644, 0.989_110)],
    },
    Molecule {
        id: 13,
        formula: "OH",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(3570.0, 1)],
        isotopologues: isotopologues![(1, "61", 17.002_740, 0.997_473)],
    },
    Molecule {
        id: 14,
        formula: "HF",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(3962.0, 1)],
        isotopologues: isotopologues![(1, "19", 20.006_229, 0.999_844)],
    },
    Molecule {
        id: 15,
        formula: "HCl",
        geometry: RotorGeometry::Linear,
        vibrational_modes: &[(2886.0, 1)],
        isotopologues: isotopologues![
            (1, "15", 35.976_678, 0.757_587),
            (2, "17", 37.973_729, 0.242_257),
        ],
    },
];

impl Molecule {
    /// Looks up a molecule by its chemical formula (case-insensitive).
    pub fn from_formula(formula: &str) -> Result<&'static Self, MoleculeError> {
        let formula = formula.trim();
        MOLECULES
            .iter()
            .find(|molecule| molecule.formula.eq_ignore_ascii_case(formula))
            .ok_or_else(|| MoleculeError::UnknownMolecule(formula.to_string()))
    }

    /// Looks up a molecule by its HITRAN molecule number.
    pub fn from_id(id: u8) -> Option<&'static Self> {
        MOLECULES.iter().find(|molecule| molecule.id == id)
    }

    pub fn isotopologue(&self, local_id: u8) -> Option<&Isotopologue> {
        self.isotopologues
            .iter()
            .find(|isotopologue| isotopologue.local_id == local_id)
    }

    /// Parses an isotope selection in the format `1,2,3` (or `all`) into
    /// sorted, deduplicated local isotopologue numbers.
    pub fn parse_isotopes(&self, isotopes: &str) -> Result<Vec<u8>, MoleculeError> {
        let isotopes = isotopes.trim();
        if isotopes.eq_ignore_ascii_case("all") {
            return Ok(self
                .isotopologues
                .iter()
                .map(|isotopologue| isotopologue.local_id)
                .collect());
        }
        let mut local_ids = isotopes
            .split(',')
            .map(str::trim)
            .filter(|isotope| !isotope.is_empty())
            .map(|isotope| {
                isotope
                    .parse::<u8>()
                    .ok()
                    .filter(|&local_id| self.isotopologue(local_id).is_some())
                    .ok_or_else(|| MoleculeError::UnknownIsotope {
                        molecule: self.formula.to_string(),
                        isotope: isotope.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if local_ids.is_empty() {
            return Err(MoleculeError::UnknownIsotope {
                molecule: self.formula.to_string(),
                isotope: isotopes.to_string(),
            });
        }
        local_ids.sort_unstable();
        local_ids.dedup();
        Ok(local_ids)
    }

    /// Approximate total internal partition function at the given temperature
    /// [K], up to a temperature independent factor.
    ///
    /// Uses a rigid rotor for the rotational part and independent harmonic
    /// oscillators for the vibrational part, which is adequate for the ratio
    /// Q(T_ref)/Q(T) entering the line intensity scaling.
    pub fn relative_partition_function(&self, temperature: fcn) -> fcn {
        let rotational = temperature.powf(self.geometry.rotational_exponent());
        let vibrational: fcn = self
            .vibrational_modes
            .iter()
            .map(|&(wavenumber, degeneracy)| {
                (1.0 - fcn::exp(-C2 * wavenumber / temperature)).powi(-(degeneracy as i32))
            })
            .product();
        rotational * vibrational
    }

    /// Ratio Q(T_ref)/Q(T) of partition functions at the reference and given temperature.
    pub fn partition_function_ratio(&self, temperature: fcn) -> fcn {
        self.relative_partition_function(T_REF) / self.relative_partition_function(temperature)
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula)
    }
}
