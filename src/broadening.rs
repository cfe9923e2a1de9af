//! Computation of line centers, widths and intensities under given conditions.

use crate::{
    condition::Condition,
    constants::{fcn, C2, CLIGHT, KBOLTZMANN, LN_2, P_REF_ATM, T_REF},
    database::LineRecord,
    io::Verbosity,
    molecule::Molecule,
};
use rayon::prelude::*;
use std::fmt;

/// Relative intensity below which lines are pruned by default.
pub const DEFAULT_RELATIVE_INTENSITY_CUTOFF: fcn = 1e-12;

/// Which weak lines to drop before summation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IntensityCutoff {
    /// Keep every line.
    None,
    /// Drop lines whose scaled intensity is below the given fraction of the
    /// strongest scaled intensity among the input lines.
    Relative(fcn),
    /// Drop lines whose scaled intensity is below the given value
    /// [cm⁻¹/(molecule cm⁻²)].
    Absolute(fcn),
}

impl IntensityCutoff {
    fn threshold(&self, max_intensity: fcn) -> fcn {
        match *self {
            Self::None => fcn::NEG_INFINITY,
            Self::Relative(fraction) => fraction * max_intensity,
            Self::Absolute(intensity) => intensity,
        }
    }
}

impl Default for IntensityCutoff {
    fn default() -> Self {
        Self::Relative(DEFAULT_RELATIVE_INTENSITY_CUTOFF)
    }
}

/// A line with all properties resolved for a specific condition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BroadenedLine {
    /// Pressure-shifted line center [cm⁻¹].
    pub center: fcn,
    /// Doppler half width at half maximum [cm⁻¹].
    pub doppler_width: fcn,
    /// Lorentz half width at half maximum [cm⁻¹].
    pub lorentz_width: fcn,
    /// Line intensity at the condition temperature [cm⁻¹/(molecule cm⁻²)].
    pub intensity: fcn,
    /// Number density of the absorbing molecule [molecules/cm³].
    pub absorber_density: fcn,
}

impl BroadenedLine {
    /// Integrated absorption coefficient of the line [cm⁻²].
    pub fn strength(&self) -> fcn {
        self.intensity * self.absorber_density
    }
}

/// Tally of the lines dropped while broadening.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadeningReport {
    pub n_input_lines: usize,
    /// Lines of molecules or isotopologues missing from the catalogue.
    pub n_unknown: usize,
    /// Lines of molecules not part of the gas.
    pub n_absent: usize,
    /// Lines below the intensity cutoff.
    pub n_pruned: usize,
}

impl BroadeningReport {
    pub fn n_kept_lines(&self) -> usize {
        self.n_input_lines - self.n_unknown - self.n_absent - self.n_pruned
    }
}

impl fmt::Display for BroadeningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kept {} of {} lines ({} below intensity cutoff, {} of absent molecules, {} unknown)",
            self.n_kept_lines(),
            self.n_input_lines,
            self.n_pruned,
            self.n_absent,
            self.n_unknown
        )
    }
}

/// Intensity at the given temperature of a line with the given reference
/// intensity, lower-state energy and rest wavenumber.
pub fn scale_intensity(
    molecule: &Molecule,
    reference_intensity: fcn,
    lower_state_energy: fcn,
    wavenumber: fcn,
    temperature: fcn,
) -> fcn {
    let boltzmann_ratio = fcn::exp(-C2 * lower_state_energy * (1.0 / temperature - 1.0 / T_REF));
    let stimulated_emission_ratio = if wavenumber > 0.0 {
        fcn::exp_m1(-C2 * wavenumber / temperature) / fcn::exp_m1(-C2 * wavenumber / T_REF)
    } else {
        T_REF / temperature
    };
    reference_intensity
        * molecule.partition_function_ratio(temperature)
        * boltzmann_ratio
        * stimulated_emission_ratio
}

/// Doppler half width at half maximum [cm⁻¹] of a line at the given
/// wavenumber for a molecule of the given mass [g].
pub fn doppler_width(wavenumber: fcn, mass: fcn, temperature: fcn) -> fcn {
    (wavenumber / CLIGHT) * fcn::sqrt(2.0 * KBOLTZMANN * temperature * LN_2 / mass)
}

/// Lorentz half width at half maximum [cm⁻¹] of the line in the given gas.
///
/// Collisions with the line's own molecule use the self-broadened width,
/// collisions with other listed molecules use the air-broadened width and
/// each diluent partner uses its own width when the line lists one.
pub fn lorentz_width(line: &LineRecord, condition: &Condition) -> fcn {
    let temperature_ratio = T_REF / condition.temperature();
    let air_scaling = temperature_ratio.powf(line.air_temperature_exponent);

    let mut width = 0.0;
    for &(molecule, mole_fraction) in condition.mole_fractions() {
        let reference_width = if molecule.id == line.molecule_id {
            line.self_width
        } else {
            line.air_width
        };
        width += mole_fraction * reference_width * air_scaling;
    }
    for (partner, mole_fraction) in condition.diluent() {
        let (reference_width, temperature_exponent) = line.broadening_for_partner(partner);
        width += mole_fraction * reference_width * temperature_ratio.powf(temperature_exponent);
    }
    (condition.pressure_atm() / P_REF_ATM) * width
}

enum Outcome {
    Broadened(BroadenedLine),
    Unknown,
    Absent,
}

fn broaden_line(line: &LineRecord, condition: &Condition) -> Outcome {
    let molecule = match Molecule::from_id(line.molecule_id) {
        Some(molecule) => molecule,
        None => return Outcome::Unknown,
    };
    let isotopologue = match molecule.isotopologue(line.isotope) {
        Some(isotopologue) => isotopologue,
        None => return Outcome::Unknown,
    };
    let absorber_density = condition.number_density(line.molecule_id);
    if absorber_density <= 0.0 {
        return Outcome::Absent;
    }
    let temperature = condition.temperature();
    Outcome::Broadened(BroadenedLine {
        center: line.wavenumber + line.air_pressure_shift * condition.pressure_atm() / P_REF_ATM,
        doppler_width: doppler_width(line.wavenumber, isotopologue.mass(), temperature),
        lorentz_width: lorentz_width(line, condition),
        intensity: scale_intensity(
            molecule,
            line.intensity,
            line.lower_state_energy,
            line.wavenumber,
            temperature,
        ),
        absorber_density,
    })
}

/// Resolves line records into broadened lines for a condition.
#[derive(Clone, Debug, Default)]
pub struct LineBroadener {
    cutoff: IntensityCutoff,
    verbosity: Verbosity,
}

impl LineBroadener {
    pub fn new(cutoff: IntensityCutoff) -> Self {
        Self {
            cutoff,
            verbosity: Verbosity::Quiet,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn cutoff(&self) -> IntensityCutoff {
        self.cutoff
    }

    /// Broadens the lines, returning them in input order.
    pub fn broaden(&self, lines: &[LineRecord], condition: &Condition) -> Vec<BroadenedLine> {
        self.broaden_with_report(lines, condition).0
    }

    /// Broadens the lines and reports how many were dropped and why.
    ///
    /// Lines that are not dropped keep their relative input order.
    pub fn broaden_with_report(
        &self,
        lines: &[LineRecord],
        condition: &Condition,
    ) -> (Vec<BroadenedLine>, BroadeningReport) {
        let outcomes: Vec<Outcome> = lines
            .par_iter()
            .map(|line| broaden_line(line, condition))
            .collect();

        let mut report = BroadeningReport {
            n_input_lines: lines.len(),
            ..BroadeningReport::default()
        };
        let mut broadened_lines = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Outcome::Broadened(line) => broadened_lines.push(line),
                Outcome::Unknown => report.n_unknown += 1,
                Outcome::Absent => report.n_absent += 1,
            }
        }

        let max_intensity = broadened_lines
            .iter()
            .map(|line| line.intensity)
            .fold(0.0, fcn::max);
        let threshold = self.cutoff.threshold(max_intensity);
        let n_before_pruning = broadened_lines.len();
        broadened_lines.retain(|line| line.intensity >= threshold);
        report.n_pruned = n_before_pruning - broadened_lines.len();

        if self.verbosity.print_messages() {
            println!("Broadening: {}", report);
        }
        if report.n_absent > 0 && self.verbosity.print_warnings() {
            eprintln!(
                "Warning: Ignored {} lines of molecules without a mole fraction",
                report.n_absent
            );
        }
        (broadened_lines, report)
    }
}

/// Broadens the lines using the default intensity cutoff.
pub fn broaden(lines: &[LineRecord], condition: &Condition) -> Vec<BroadenedLine> {
    LineBroadener::default().broaden(lines, condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{condition::make_condition, constants::ATM_TO_PA, database::PartnerBroadening};
    use approx::assert_relative_eq;

    fn co2_line(wavenumber: fcn, intensity: fcn) -> LineRecord {
        LineRecord {
            molecule_id: 2,
            isotope: 1,
            wavenumber,
            intensity,
            einstein_a: 200.0,
            air_width: 0.07,
            self_width: 0.09,
            lower_state_energy: 300.0,
            air_temperature_exponent: 0.75,
            air_pressure_shift: -0.002,
            partner_broadening: Vec::new(),
        }
    }

    fn condition(temperature: fcn, pressure_atm: fcn) -> Condition {
        make_condition(temperature, pressure_atm * ATM_TO_PA, &[("CO2", 0.1)], 1.0).unwrap()
    }

    #[test]
    fn doppler_width_increases_with_temperature() {
        let lines = vec![co2_line(667.0, 1e-19), co2_line(2349.0, 3e-18)];
        let mut previous = broaden(&lines, &condition(100.0, 1.0));
        for temperature in [200.0, 296.0, 500.0, 1500.0] {
            let current = broaden(&lines, &condition(temperature, 1.0));
            for (previous_line, current_line) in previous.iter().zip(&current) {
                assert!(current_line.doppler_width > previous_line.doppler_width);
            }
            previous = current;
        }
    }

    #[test]
    fn doppler_width_matches_known_value() {
        // CO2 at 2349 cm⁻¹ and 296 K has a Doppler HWHM of about 0.0022 cm⁻¹
        let width = doppler_width(2349.0, 43.99 * crate::constants::AMU, 296.0);
        assert_relative_eq!(width, 2.182e-3, max_relative = 1e-2);
    }

    #[test]
    fn intensity_is_unchanged_at_reference_temperature() {
        let lines = vec![co2_line(2349.0, 3.5e-18)];
        let broadened = broaden(&lines, &condition(T_REF, 1.0));
        assert_relative_eq!(broadened[0].intensity, 3.5e-18, max_relative = 1e-12);
        let hot = broaden(&lines, &condition(1000.0, 1.0));
        assert!(hot[0].intensity != broadened[0].intensity);
    }

    #[test]
    fn lorentz_width_is_linear_in_pressure() {
        let lines = vec![co2_line(2349.0, 3.5e-18)];
        let one = broaden(&lines, &condition(T_REF, 1.0))[0];
        let two = broaden(&lines, &condition(T_REF, 2.0))[0];
        assert_relative_eq!(two.lorentz_width, 2.0 * one.lorentz_width, max_relative = 1e-12);
        assert_relative_eq!(one.lorentz_width, 0.1 * 0.09 + 0.9 * 0.07, max_relative = 1e-12);
        assert_relative_eq!(one.center, 2349.0 - 0.002, max_relative = 1e-12);
    }

    #[test]
    fn diluent_partners_use_their_widths() {
        let mut line = co2_line(2349.0, 3.5e-18);
        line.partner_broadening.push(PartnerBroadening {
            partner: "H2".to_string(),
            width: 0.11,
            temperature_exponent: 0.6,
        });
        let condition = condition(T_REF, 1.0)
            .with_diluent(&[("H2", 1.0), ("He", 1.0)])
            .unwrap();
        assert_relative_eq!(
            lorentz_width(&line, &condition),
            0.1 * 0.09 + 0.45 * 0.11 + 0.45 * 0.07,
            max_relative = 1e-12
        );
    }

    #[test]
    fn pruning_is_deterministic_and_keeps_order() {
        let lines = vec![
            co2_line(2300.0, 1e-30),
            co2_line(2310.0, 1e-18),
            co2_line(2320.0, 1e-25),
            co2_line(2330.0, 5e-19),
        ];
        let broadener = LineBroadener::new(IntensityCutoff::Relative(1e-6));
        let (first, report) = broadener.broaden_with_report(&lines, &condition(T_REF, 1.0));
        let (second, _) = broadener.broaden_with_report(&lines, &condition(T_REF, 1.0));
        assert_eq!(first, second);
        assert_eq!(report.n_pruned, 2);
        assert_eq!(report.n_kept_lines(), 2);
        assert!(first[0].center < first[1].center);

        let everything = LineBroadener::new(IntensityCutoff::None).broaden(&lines, &condition(T_REF, 1.0));
        assert_eq!(everything.len(), 4);
        let absolute =
            LineBroadener::new(IntensityCutoff::Absolute(1e-20)).broaden(&lines, &condition(T_REF, 1.0));
        assert_eq!(absolute.len(), 2);
    }

    #[test]
    fn lines_of_absent_molecules_are_dropped() {
        let mut water = co2_line(1600.0, 1e-19);
        water.molecule_id = 1;
        let mut unknown = co2_line(1600.0, 1e-19);
        unknown.isotope = 9;
        let (lines, report) = LineBroadener::default()
            .broaden_with_report(&[water, co2_line(2349.0, 1e-18), unknown], &condition(T_REF, 1.0));
        assert_eq!(lines.len(), 1);
        assert_eq!(report.n_absent, 1);
        assert_eq!(report.n_unknown, 1);
    }
}
