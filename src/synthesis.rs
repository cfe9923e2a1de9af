//! Summation of broadened line profiles into absorption spectra.

pub mod profile;

use self::profile::LineShape;
use crate::{
    broadening::BroadenedLine,
    device::{
        resolve_device, ComputeBackend, Device, DeviceEnumerator, HostDeviceEnumerator,
        HostOffloadBackend,
    },
    error::{DeviceFallbackWarning, GridError},
    io::Verbosity,
};
use indicatif::ParallelProgressIterator;
use ndarray::Array1;
use rayon::prelude::*;
use std::sync::Arc;

/// Floating-point precision to use for spectra.
#[allow(non_camel_case_types)]
pub type fsp = f64;

/// Distance from the line center [cm⁻¹] beyond which a line does not contribute by default.
pub const DEFAULT_WING_CUTOFF: fsp = 50.0;

/// Largest number of points a spectral grid may have.
pub const MAX_GRID_POINTS: usize = 50_000_000;

/// How finely to sample a spectral range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridResolution {
    /// Total number of points, including both end points.
    Points(usize),
    /// Distance between adjacent points [cm⁻¹].
    Step(fsp),
}

/// Specification of a regular wavenumber grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpec {
    pub min: fsp,
    pub max: fsp,
    pub resolution: GridResolution,
}

impl GridSpec {
    pub fn with_points(min: fsp, max: fsp, n_points: usize) -> Self {
        Self {
            min,
            max,
            resolution: GridResolution::Points(n_points),
        }
    }

    pub fn with_step(min: fsp, max: fsp, step: fsp) -> Self {
        Self {
            min,
            max,
            resolution: GridResolution::Step(step),
        }
    }
}

/// Regular, strictly increasing grid of wavenumbers [cm⁻¹].
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralGrid {
    start: fsp,
    step: fsp,
    wavenumbers: Array1<fsp>,
}

impl SpectralGrid {
    /// Builds the grid described by the given bounds and resolution.
    ///
    /// With a step, the grid starts at the minimum and extends as far as it
    /// can without exceeding the maximum.
    pub fn new(spec: &GridSpec) -> Result<Self, GridError> {
        let GridSpec { min, max, .. } = *spec;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(GridError::InvalidRange { min, max });
        }
        let too_many_points = |requested: fsp| GridError::TooManyPoints {
            requested,
            max: MAX_GRID_POINTS,
        };
        let (n_points, step) = match spec.resolution {
            GridResolution::Points(n_points) => {
                if n_points < 2 {
                    return Err(GridError::TooFewPoints(n_points));
                }
                if n_points > MAX_GRID_POINTS {
                    return Err(too_many_points(n_points as fsp));
                }
                (n_points, (max - min) / (n_points - 1) as fsp)
            }
            GridResolution::Step(step) => {
                if !(step.is_finite() && step > 0.0) {
                    return Err(GridError::InvalidStep(step));
                }
                // Tolerate round-off in ranges meant to be a whole number of steps
                let n_points = ((max - min) / step + 1e-9).floor() + 1.0;
                if !(n_points.is_finite() && n_points <= MAX_GRID_POINTS as fsp) {
                    return Err(too_many_points(n_points));
                }
                let n_points = n_points as usize;
                if n_points < 2 {
                    return Err(GridError::TooFewPoints(n_points));
                }
                (n_points, step)
            }
        };
        let wavenumbers = Array1::from_shape_fn(n_points, |idx| min + idx as fsp * step);
        Ok(Self {
            start: min,
            step,
            wavenumbers,
        })
    }

    pub fn len(&self) -> usize {
        self.wavenumbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavenumbers.is_empty()
    }

    pub fn step(&self) -> fsp {
        self.step
    }

    pub fn start(&self) -> fsp {
        self.start
    }

    pub fn wavenumbers(&self) -> &Array1<fsp> {
        &self.wavenumbers
    }
}

/// Lines and grid flattened into plain arrays for offloading to a device.
#[derive(Clone, Debug, PartialEq)]
pub struct SummationBatch {
    grid_start: fsp,
    grid_step: fsp,
    n_points: usize,
    line_shape: LineShape,
    wing_cutoff: fsp,
    centers: Vec<fsp>,
    doppler_widths: Vec<fsp>,
    lorentz_widths: Vec<fsp>,
    strengths: Vec<fsp>,
}

impl SummationBatch {
    pub fn new(
        lines: &[BroadenedLine],
        grid: &SpectralGrid,
        line_shape: LineShape,
        wing_cutoff: fsp,
    ) -> Self {
        Self {
            grid_start: grid.start(),
            grid_step: grid.step(),
            n_points: grid.len(),
            line_shape,
            wing_cutoff,
            centers: lines.iter().map(|line| line.center).collect(),
            doppler_widths: lines.iter().map(|line| line.doppler_width).collect(),
            lorentz_widths: lines.iter().map(|line| line.lorentz_width).collect(),
            strengths: lines.iter().map(BroadenedLine::strength).collect(),
        }
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn n_lines(&self) -> usize {
        self.centers.len()
    }

    pub fn wavenumber(&self, point_idx: usize) -> fsp {
        self.grid_start + point_idx as fsp * self.grid_step
    }

    /// Adds the profile of the line with the given index to the values at the
    /// grid points within the wing cutoff of the line center.
    pub fn scatter_line(&self, line_idx: usize, values: &mut [fsp]) {
        let center = self.centers[line_idx];
        let lower = ((center - self.wing_cutoff - self.grid_start) / self.grid_step).floor();
        let upper = ((center + self.wing_cutoff - self.grid_start) / self.grid_step).ceil();
        if upper < 0.0 || lower >= self.n_points as fsp {
            return;
        }
        let lower = lower.max(0.0) as usize;
        let upper = (upper as usize).min(self.n_points - 1);

        for (point_idx, value) in values
            .iter_mut()
            .enumerate()
            .take(upper + 1)
            .skip(lower)
        {
            let offset = self.wavenumber(point_idx) - center;
            if offset.abs() <= self.wing_cutoff {
                *value += self.strengths[line_idx]
                    * self.line_shape.evaluate(
                        offset,
                        self.doppler_widths[line_idx],
                        self.lorentz_widths[line_idx],
                    );
            }
        }
    }
}

/// Absorption spectrum on a wavenumber grid.
#[derive(Clone, Debug)]
pub struct Spectrum {
    grid: SpectralGrid,
    absorption_coefficient: Array1<fsp>,
    device: Option<Device>,
    fallback_warning: Option<DeviceFallbackWarning>,
}

impl Spectrum {
    pub fn grid(&self) -> &SpectralGrid {
        &self.grid
    }

    pub fn wavenumbers(&self) -> &Array1<fsp> {
        self.grid.wavenumbers()
    }

    /// Absorption coefficient [cm⁻¹] at each grid point.
    pub fn absorption_coefficient(&self) -> &Array1<fsp> {
        &self.absorption_coefficient
    }

    /// Fraction of light transmitted through a path of the given length in
    /// centimetres. Conditions store metres, so pass
    /// [`Condition::path_length_cm`](crate::condition::Condition::path_length_cm).
    pub fn transmittance(&self, path_length_cm: fsp) -> Array1<fsp> {
        self.absorption_coefficient
            .mapv(|coefficient| fsp::exp(-coefficient * path_length_cm))
    }

    /// Decadic absorbance `-log10(transmittance)` over a path of the given
    /// length in centimetres.
    ///
    /// Evaluated from the coefficient directly so that it stays finite where
    /// the transmittance underflows.
    pub fn absorbance(&self, path_length_cm: fsp) -> Array1<fsp> {
        self.absorption_coefficient
            .mapv(|coefficient| coefficient * path_length_cm * std::f64::consts::LOG10_E)
    }

    /// Wavenumber and value of the largest absorption coefficient.
    pub fn peak(&self) -> (fsp, fsp) {
        self.wavenumbers()
            .iter()
            .zip(self.absorption_coefficient.iter())
            .fold((fsp::NAN, fsp::NEG_INFINITY), |peak, (&wavenumber, &value)| {
                if value > peak.1 {
                    (wavenumber, value)
                } else {
                    peak
                }
            })
    }

    /// Device the summation ran on, or `None` if it ran on the CPU path.
    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn fallback_warning(&self) -> Option<&DeviceFallbackWarning> {
        self.fallback_warning.as_ref()
    }
}

/// Sums line profiles onto spectral grids, on the CPU or an offload device.
#[derive(Clone)]
pub struct Synthesizer {
    line_shape: LineShape,
    wing_cutoff: fsp,
    devices: Vec<Device>,
    backend: Option<Arc<dyn ComputeBackend>>,
    verbosity: Verbosity,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self {
            line_shape: LineShape::default(),
            wing_cutoff: DEFAULT_WING_CUTOFF,
            devices: Vec::new(),
            backend: None,
            verbosity: Verbosity::Quiet,
        }
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a synthesizer that can offload to the devices of the host.
    ///
    /// If the offload thread pool cannot be created, device requests fall
    /// back to the CPU path.
    pub fn for_host() -> Self {
        let synthesizer = Self::new();
        match HostOffloadBackend::new(0) {
            Ok(backend) => {
                synthesizer.with_devices(HostDeviceEnumerator.devices(), Arc::new(backend))
            }
            Err(_) => synthesizer,
        }
    }

    pub fn with_line_shape(mut self, line_shape: LineShape) -> Self {
        self.line_shape = line_shape;
        self
    }

    /// Sets the distance from the line center [cm⁻¹] beyond which lines are
    /// truncated. Non-positive or NaN values disable truncation.
    pub fn with_wing_cutoff(mut self, wing_cutoff: fsp) -> Self {
        self.wing_cutoff = if wing_cutoff > 0.0 {
            wing_cutoff
        } else {
            fsp::INFINITY
        };
        self
    }

    pub fn with_devices(mut self, devices: Vec<Device>, backend: Arc<dyn ComputeBackend>) -> Self {
        self.devices = devices;
        self.backend = Some(backend);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn line_shape(&self) -> LineShape {
        self.line_shape
    }

    pub fn wing_cutoff(&self) -> fsp {
        self.wing_cutoff
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Computes the absorption spectrum of the lines on the specified grid.
    ///
    /// With a device identifier that resolves to a device served by the
    /// backend, the summation is offloaded. Otherwise, or if the device
    /// fails, the CPU path is used and the fallback is recorded on the
    /// returned spectrum.
    pub fn synthesize(
        &self,
        lines: &[BroadenedLine],
        grid_spec: &GridSpec,
        device_id: Option<&str>,
    ) -> Result<Spectrum, GridError> {
        let grid = SpectralGrid::new(grid_spec)?;

        let mut fallback_warning = None;
        if let Some(identifier) = device_id {
            match self.sum_on_device(lines, &grid, identifier) {
                Ok((device, values)) => {
                    if self.verbosity.print_messages() {
                        println!("Summed {} lines on device {}", lines.len(), device);
                    }
                    return Ok(Spectrum {
                        grid,
                        absorption_coefficient: Array1::from_vec(values),
                        device: Some(device),
                        fallback_warning: None,
                    });
                }
                Err(warning) => {
                    if self.verbosity.print_warnings() {
                        eprintln!("Warning: {}", warning);
                    }
                    fallback_warning = Some(warning);
                }
            }
        }

        let absorption_coefficient = self.sum_on_cpu(lines, &grid);
        Ok(Spectrum {
            grid,
            absorption_coefficient,
            device: None,
            fallback_warning,
        })
    }

    fn sum_on_device(
        &self,
        lines: &[BroadenedLine],
        grid: &SpectralGrid,
        identifier: &str,
    ) -> Result<(Device, Vec<fsp>), DeviceFallbackWarning> {
        let fallback = |reason: String| DeviceFallbackWarning {
            requested: identifier.to_string(),
            reason,
        };
        let device = resolve_device(identifier, &self.devices)
            .ok_or_else(|| fallback("no matching device".to_string()))?;
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| fallback("no compute backend".to_string()))?;
        if !backend.supports(&device) {
            return Err(fallback(format!("{} is not supported by the backend", device)));
        }

        let batch = SummationBatch::new(lines, grid, self.line_shape, self.wing_cutoff);
        let values = backend
            .execute(&device, &batch)
            .map_err(|err| fallback(err.to_string()))?;
        if values.len() != grid.len() {
            return Err(fallback(format!(
                "device returned {} values for {} grid points",
                values.len(),
                grid.len()
            )));
        }
        Ok((device, values))
    }

    /// Sums the lines at each grid point in parallel. At every point the lines
    /// are added in order of increasing center, so the result is deterministic.
    fn sum_on_cpu(&self, lines: &[BroadenedLine], grid: &SpectralGrid) -> Array1<fsp> {
        let mut sorted_lines = lines.to_vec();
        sorted_lines.sort_by(|a, b| a.center.total_cmp(&b.center));
        let centers: Vec<fsp> = sorted_lines.iter().map(|line| line.center).collect();

        let wavenumbers = grid.wavenumbers();
        let mut values = vec![0.0; grid.len()];
        values
            .par_iter_mut()
            .enumerate()
            .progress_with(self.verbosity.create_progress_bar(grid.len()))
            .for_each(|(point_idx, value)| {
                let wavenumber = wavenumbers[point_idx];
                let first = centers.partition_point(|&center| center < wavenumber - self.wing_cutoff);
                *value = sorted_lines[first..]
                    .iter()
                    .take_while(|line| line.center <= wavenumber + self.wing_cutoff)
                    .map(|line| {
                        line.strength()
                            * self.line_shape.evaluate(
                                wavenumber - line.center,
                                line.doppler_width,
                                line.lorentz_width,
                            )
                    })
                    .sum();
            });
        Array1::from_vec(values)
    }
}

/// Computes the absorption spectrum of the lines using the default line
/// shape and wing cutoff, offloading to a host device if one is requested.
pub fn synthesize(
    lines: &[BroadenedLine],
    grid_spec: &GridSpec,
    device_id: Option<&str>,
) -> Result<Spectrum, GridError> {
    match device_id {
        Some(_) => Synthesizer::for_host().synthesize(lines, grid_spec, device_id),
        None => Synthesizer::new().synthesize(lines, grid_spec, None),
    }
}
