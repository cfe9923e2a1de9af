//! Transmission spectra of a single molecule in air over wavelength ranges.

use crate::{
    broadening::LineBroadener,
    condition::make_condition,
    database::{
        cache::LineStore, Credentials, DatabaseSource, LineDatabaseProvider, LineRecord,
        RemoteLineDatabase, WavenumberRange,
    },
    error::SimulationError,
    io::Verbosity,
    molecule::Molecule,
    synthesis::{fsp, GridSpec, SpectralGrid, Spectrum, Synthesizer, DEFAULT_WING_CUTOFF},
    units,
};
use ndarray::{Array1, Zip};
use std::{sync::Arc, time::Duration};

/// Wavelength step [nm] used when none is specified.
pub const DEFAULT_WAVELENGTH_STEP: fsp = 0.01;

/// Transmittance sampled at ascending wavelengths.
#[derive(Clone, Debug, PartialEq)]
pub struct TransmissionSpectrum {
    /// Vacuum wavelengths [nm].
    pub wavelengths: Array1<fsp>,
    pub transmittance: Array1<fsp>,
}

impl TransmissionSpectrum {
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// Returns the part of the spectrum within the given wavelength range [nm].
    pub fn wavelength_range(
        &self,
        min_wavelength: fsp,
        max_wavelength: fsp,
    ) -> Result<Self, SimulationError> {
        if min_wavelength > max_wavelength {
            return Err(SimulationError::InvalidInput(format!(
                "Minimum wavelength {} nm exceeds maximum wavelength {} nm",
                min_wavelength, max_wavelength
            )));
        }
        let (wavelengths, transmittance): (Vec<_>, Vec<_>) = self
            .wavelengths
            .iter()
            .zip(self.transmittance.iter())
            .filter(|(wavelength, _)| (min_wavelength..=max_wavelength).contains(*wavelength))
            .unzip();
        Ok(Self {
            wavelengths: Array1::from_vec(wavelengths),
            transmittance: Array1::from_vec(transmittance),
        })
    }
}

/// What to simulate, in the units of the laboratory.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParameters {
    /// Chemical formula of the molecule.
    pub molecule: String,
    /// Isotopologues in the format `1,2,3`, or `all`.
    pub isotopes: String,
    /// Volume mixing ratio of the molecule in air.
    pub vmr: fsp,
    /// Pressure [Pa].
    pub pressure: fsp,
    /// Temperature [K].
    pub temperature: fsp,
    /// Length of the absorption path [m].
    pub length: fsp,
    /// Wavelength step [nm].
    pub wavelength_step: fsp,
    pub database: DatabaseSource,
    /// Identifier of the compute device to sum lines on.
    pub device: Option<String>,
}

impl SimulationParameters {
    pub fn new<S: Into<String>>(
        molecule: S,
        vmr: fsp,
        pressure: fsp,
        temperature: fsp,
        length: fsp,
    ) -> Self {
        Self {
            molecule: molecule.into(),
            isotopes: "1".to_string(),
            vmr,
            pressure,
            temperature,
            length,
            wavelength_step: DEFAULT_WAVELENGTH_STEP,
            database: DatabaseSource::default(),
            device: None,
        }
    }
}

#[derive(Clone, Debug)]
struct ComputedState {
    min_wavelength: fsp,
    max_wavelength: fsp,
    vmr: fsp,
    pressure: fsp,
    temperature: fsp,
    length: fsp,
    lines: Arc<[LineRecord]>,
    spectrum: Spectrum,
    transmission: TransmissionSpectrum,
}

/// Computes transmission spectra of one molecule in air, recomputing only
/// when the conditions or the wavelength range change.
///
/// The condition parameters are public and may be modified between
/// computations. Line data is reused as long as the wavelength range stays
/// the same.
pub struct Simulator<R, S> {
    provider: Arc<LineDatabaseProvider<R, S>>,
    molecule: &'static Molecule,
    isotopes: Vec<u8>,
    wavelength_step: fsp,
    database: DatabaseSource,
    device: Option<String>,
    credentials: Option<Credentials>,
    timeout: Option<Duration>,
    broadener: LineBroadener,
    synthesizer: Synthesizer,
    verbosity: Verbosity,
    computed: Option<ComputedState>,
    n_computations: usize,
    /// Volume mixing ratio of the molecule in air.
    pub vmr: fsp,
    /// Pressure [Pa].
    pub pressure: fsp,
    /// Temperature [K].
    pub temperature: fsp,
    /// Length of the absorption path [m].
    pub length: fsp,
}

impl<R, S> Simulator<R, S>
where
    R: RemoteLineDatabase,
    S: LineStore,
{
    pub fn new(
        provider: Arc<LineDatabaseProvider<R, S>>,
        parameters: SimulationParameters,
    ) -> Result<Self, SimulationError> {
        let molecule = Molecule::from_formula(&parameters.molecule)?;
        let isotopes = molecule.parse_isotopes(&parameters.isotopes)?;
        if !(parameters.wavelength_step.is_finite() && parameters.wavelength_step > 0.0) {
            return Err(SimulationError::InvalidInput(format!(
                "Wavelength step must be positive, got {} nm",
                parameters.wavelength_step
            )));
        }
        let synthesizer = if parameters.device.is_some() {
            Synthesizer::for_host()
        } else {
            Synthesizer::new()
        };
        Ok(Self {
            provider,
            molecule,
            isotopes,
            wavelength_step: parameters.wavelength_step,
            database: parameters.database,
            device: parameters.device,
            credentials: None,
            timeout: None,
            broadener: LineBroadener::default(),
            synthesizer,
            verbosity: Verbosity::Quiet,
            computed: None,
            n_computations: 0,
            vmr: parameters.vmr,
            pressure: parameters.pressure,
            temperature: parameters.temperature,
            length: parameters.length,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_broadener(mut self, broadener: LineBroadener) -> Self {
        self.broadener = broadener;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.broadener = self.broadener.with_verbosity(verbosity.clone());
        self.synthesizer = self.synthesizer.with_verbosity(verbosity.clone());
        self.verbosity = verbosity;
        self
    }

    pub fn molecule(&self) -> &'static Molecule {
        self.molecule
    }

    pub fn isotopes(&self) -> &[u8] {
        &self.isotopes
    }

    /// Spectrum from the latest computation.
    pub fn spectrum(&self) -> Option<&Spectrum> {
        self.computed.as_ref().map(|computed| &computed.spectrum)
    }

    /// Transmission spectrum from the latest computation.
    pub fn transmission(&self) -> Option<&TransmissionSpectrum> {
        self.computed.as_ref().map(|computed| &computed.transmission)
    }

    /// Number of times a spectrum has actually been computed.
    pub fn n_computations(&self) -> usize {
        self.n_computations
    }

    /// Computes the transmission spectrum between the given wavelengths [nm],
    /// unless the latest computation already used the same parameters.
    pub fn compute_transmission_spectrum(
        &mut self,
        min_wavelength: fsp,
        max_wavelength: fsp,
    ) -> Result<&TransmissionSpectrum, SimulationError> {
        if !(min_wavelength.is_finite()
            && max_wavelength.is_finite()
            && min_wavelength > 0.0
            && min_wavelength < max_wavelength)
        {
            return Err(SimulationError::InvalidInput(format!(
                "Wavelength range must satisfy 0 < min < max, got [{}, {}] nm",
                min_wavelength, max_wavelength
            )));
        }

        let same_range = self.computed.as_ref().map_or(false, |computed| {
            computed.min_wavelength == min_wavelength && computed.max_wavelength == max_wavelength
        });
        let unchanged = same_range
            && self.computed.as_ref().map_or(false, |computed| {
                computed.vmr == self.vmr
                    && computed.pressure == self.pressure
                    && computed.temperature == self.temperature
                    && computed.length == self.length
            });

        if !unchanged {
            let reusable_lines = self
                .computed
                .as_ref()
                .filter(|_| same_range)
                .map(|computed| Arc::clone(&computed.lines));
            let computed = self.compute(min_wavelength, max_wavelength, reusable_lines)?;
            self.computed = Some(computed);
            self.n_computations += 1;
        } else if self.verbosity.print_messages() {
            println!("Parameters unchanged, reusing computed spectrum");
        }

        self.transmission().ok_or_else(|| {
            SimulationError::InvalidInput("Transmission spectrum not calculated".to_string())
        })
    }

    fn compute(
        &self,
        min_wavelength: fsp,
        max_wavelength: fsp,
        reusable_lines: Option<Arc<[LineRecord]>>,
    ) -> Result<ComputedState, SimulationError> {
        let condition = make_condition(
            self.temperature,
            self.pressure,
            &[(self.molecule.formula, self.vmr)],
            self.length,
        )?;

        let min_wavenumber = units::wavelength_to_wavenumber(max_wavelength);
        let max_wavenumber = units::wavelength_to_wavenumber(min_wavelength);
        let central_wavelength = 0.5 * (min_wavelength + max_wavelength);
        let wavenumber_step =
            units::delta_wavelength_to_delta_wavenumber(self.wavelength_step, central_wavelength);
        let grid_spec = GridSpec::with_step(min_wavenumber, max_wavenumber, wavenumber_step);
        // Reject unusable grids before fetching any lines
        SpectralGrid::new(&grid_spec)?;

        let lines = match reusable_lines {
            Some(lines) => lines,
            None => {
                // Lines just outside the range still contribute through their wings
                let margin = if self.synthesizer.wing_cutoff().is_finite() {
                    self.synthesizer.wing_cutoff()
                } else {
                    DEFAULT_WING_CUTOFF
                };
                let range = WavenumberRange::new(
                    (min_wavenumber - margin).max(0.0),
                    max_wavenumber + margin,
                )?;
                self.provider.fetch_lines(
                    self.molecule,
                    &self.isotopes,
                    range,
                    self.database,
                    self.credentials.as_ref(),
                    self.timeout,
                )?
            }
        };

        let broadened_lines = self.broadener.broaden(&lines, &condition);
        let spectrum =
            self.synthesizer
                .synthesize(&broadened_lines, &grid_spec, self.device.as_deref())?;

        let mut wavelengths = spectrum
            .wavenumbers()
            .mapv(units::wavenumber_to_wavelength)
            .to_vec();
        let mut transmittance = spectrum.transmittance(condition.path_length_cm()).to_vec();
        wavelengths.reverse();
        transmittance.reverse();

        Ok(ComputedState {
            min_wavelength,
            max_wavelength,
            vmr: self.vmr,
            pressure: self.pressure,
            temperature: self.temperature,
            length: self.length,
            lines,
            spectrum,
            transmission: TransmissionSpectrum {
                wavelengths: Array1::from_vec(wavelengths),
                transmittance: Array1::from_vec(transmittance),
            },
        })
    }

    /// Returns the computed transmission spectrum restricted to the given
    /// wavelengths [nm], which default to the computed range and must lie
    /// within it.
    pub fn get_transmission_spectrum(
        &self,
        min_wavelength: Option<fsp>,
        max_wavelength: Option<fsp>,
    ) -> Result<TransmissionSpectrum, SimulationError> {
        let computed = self.computed.as_ref().ok_or_else(|| {
            SimulationError::InvalidInput("Transmission spectrum not calculated".to_string())
        })?;
        let min_wavelength = min_wavelength.unwrap_or(computed.min_wavelength);
        let max_wavelength = max_wavelength.unwrap_or(computed.max_wavelength);
        if computed.min_wavelength > min_wavelength || computed.max_wavelength < max_wavelength {
            return Err(SimulationError::InvalidInput(format!(
                "Transmission spectrum not calculated for [{}, {}] nm, only for [{}, {}] nm",
                min_wavelength, max_wavelength, computed.min_wavelength, computed.max_wavelength
            )));
        }
        computed
            .transmission
            .wavelength_range(min_wavelength, max_wavelength)
    }

    /// Summary of the largest absorption in the latest spectrum, as
    /// (wavelength [nm], transmittance).
    pub fn strongest_absorption(&self) -> Option<(fsp, fsp)> {
        let transmission = self.transmission()?;
        let mut strongest: Option<(fsp, fsp)> = None;
        Zip::from(&transmission.wavelengths)
            .and(&transmission.transmittance)
            .for_each(|&wavelength, &transmittance| {
                if strongest.map_or(true, |(_, lowest)| transmittance < lowest) {
                    strongest = Some((wavelength, transmittance));
                }
            });
        strongest
    }
}
