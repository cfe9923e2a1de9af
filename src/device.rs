//! Discovery and selection of compute devices for offloaded summation.

use crate::{
    error::DeviceError,
    synthesis::{fsp, SummationBatch},
};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use std::fmt;
use sysinfo::{CpuExt, CpuRefreshKind, RefreshKind, System, SystemExt};

/// Kind of hardware behind a compute device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Processor of the host machine.
    Host,
    DiscreteGpu,
    IntegratedGpu,
    Other,
}

impl DeviceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::DiscreteGpu => "discrete",
            Self::IntegratedGpu => "integrated",
            Self::Other => "other",
        }
    }
}

/// A compute device discovered at startup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Device {
    /// Enumeration index, stable within a single run.
    pub index: usize,
    /// Name as reported by the driver or operating system.
    pub name: String,
    pub kind: DeviceKind,
}

impl Device {
    pub fn new<S: Into<String>>(index: usize, name: S, kind: DeviceKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.kind.name())
    }
}

/// Selects the device matching the identifier, which is either a zero-based
/// index into the devices or a case-insensitive substring of a device name.
///
/// A numeric identifier is only ever treated as an index, so an index that
/// is out of range gives `None`. Returns `None` when nothing matches.
pub fn resolve_device(identifier: &str, devices: &[Device]) -> Option<Device> {
    let selector = identifier.trim().to_lowercase();
    if selector.is_empty() {
        return None;
    }
    if let Ok(idx) = selector.parse::<usize>() {
        return devices.get(idx).cloned();
    }
    devices
        .iter()
        .find(|device| device.name.to_lowercase().contains(&selector))
        .cloned()
}

/// Source of the devices available to the process.
pub trait DeviceEnumerator {
    fn devices(&self) -> Vec<Device>;
}

/// Enumerates the host processor as the only offload device.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostDeviceEnumerator;

impl HostDeviceEnumerator {
    fn host_processor_name() -> String {
        let system =
            System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
        let brand = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default();
        if brand.is_empty() {
            format!("Host CPU ({} threads)", rayon::current_num_threads())
        } else {
            brand
        }
    }
}

impl DeviceEnumerator for HostDeviceEnumerator {
    fn devices(&self) -> Vec<Device> {
        vec![Device::new(0, Self::host_processor_name(), DeviceKind::Host)]
    }
}

/// Executes flattened summation batches on a device.
pub trait ComputeBackend: Send + Sync {
    /// Whether the backend can run batches on the given device.
    fn supports(&self, device: &Device) -> bool;

    /// Runs the batch to completion and returns the summed absorption
    /// coefficient at every grid point of the batch.
    fn execute(&self, device: &Device, batch: &SummationBatch) -> Result<Vec<fsp>, DeviceError>;
}

/// Backend running batches on a dedicated thread pool of the host.
///
/// Lines are scattered onto the grid in parallel, with each worker
/// accumulating into its own buffer before the buffers are added together.
#[derive(Debug)]
pub struct HostOffloadBackend {
    pool: ThreadPool,
}

impl HostOffloadBackend {
    /// Creates a backend with the given number of worker threads (0 lets the
    /// pool decide).
    pub fn new(n_threads: usize) -> Result<Self, DeviceError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|idx| format!("molspec-offload-{}", idx))
            .build()
            .map_err(|err| DeviceError::Execution {
                device: DeviceKind::Host.name().to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ComputeBackend for HostOffloadBackend {
    fn supports(&self, device: &Device) -> bool {
        device.kind == DeviceKind::Host
    }

    fn execute(&self, device: &Device, batch: &SummationBatch) -> Result<Vec<fsp>, DeviceError> {
        if !self.supports(device) {
            return Err(DeviceError::Unsupported(device.name.clone()));
        }
        let n_points = batch.n_points();
        let values = self.pool.install(|| {
            (0..batch.n_lines())
                .into_par_iter()
                .fold(
                    || vec![0.0; n_points],
                    |mut values, line_idx| {
                        batch.scatter_line(line_idx, &mut values);
                        values
                    },
                )
                .reduce(
                    || vec![0.0; n_points],
                    |mut accumulated, values| {
                        accumulated
                            .iter_mut()
                            .zip(values)
                            .for_each(|(sum, value)| *sum += value);
                        accumulated
                    },
                )
        });
        if values.iter().all(|value| value.is_finite()) {
            Ok(values)
        } else {
            Err(DeviceError::Execution {
                device: device.name.clone(),
                message: "non-finite values in result".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<Device> {
        vec![
            Device::new(0, "Intel(R) UHD Graphics 630", DeviceKind::IntegratedGpu),
            Device::new(1, "NVIDIA GeForce RTX 3080", DeviceKind::DiscreteGpu),
            Device::new(2, "llvmpipe (LLVM 15.0.7, 256 bits)", DeviceKind::Other),
        ]
    }

    #[test]
    fn devices_are_resolved_by_name() {
        assert_eq!(
            resolve_device("nvidia", &devices()).map(|device| device.index),
            Some(1)
        );
        assert_eq!(
            resolve_device("  LLVMpipe ", &devices()).map(|device| device.index),
            Some(2)
        );
        assert_eq!(resolve_device("nonexistent-xyz", &devices()), None);
        assert_eq!(resolve_device("", &devices()), None);
    }

    #[test]
    fn devices_are_resolved_by_index() {
        assert_eq!(
            resolve_device("0", &devices()).map(|device| device.name),
            Some("Intel(R) UHD Graphics 630".to_string())
        );
        assert_eq!(resolve_device("3", &devices()), None);
        assert_eq!(resolve_device("0", &[]), None);
        // Numbers are indices even when they also appear in a name
        assert_eq!(resolve_device("3080", &devices()), None);
        assert_eq!(
            resolve_device("RTX 3080", &devices()).map(|device| device.index),
            Some(1)
        );
    }

    #[test]
    fn host_enumerator_reports_one_host_device() {
        let devices = HostDeviceEnumerator.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind, DeviceKind::Host);
        assert!(!devices[0].name.is_empty());
    }

    #[test]
    fn host_backend_rejects_foreign_devices() {
        let backend = HostOffloadBackend::new(2).unwrap();
        assert_eq!(backend.n_threads(), 2);
        assert!(!backend.supports(&devices()[1]));
    }
}
