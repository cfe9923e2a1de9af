use molspec::database::{
    cache::MemoryLineStore, par::ParFileMirror, Credentials, DatabaseSource,
    LineDatabaseProvider, LineRecord, LineRequest, RemoteLineDatabase,
};
use molspec::error::DatabaseError;
use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// Parameters of a line written into a test mirror.
#[derive(Clone, Copy, Debug)]
pub struct TestLine {
    pub molecule_id: u8,
    pub isotope: u8,
    pub wavenumber: f64,
    pub intensity: f64,
    pub air_width: f64,
    pub self_width: f64,
    pub lower_state_energy: f64,
    pub air_temperature_exponent: f64,
    pub air_pressure_shift: f64,
}

impl TestLine {
    pub fn co2(wavenumber: f64, intensity: f64) -> Self {
        Self {
            molecule_id: 2,
            isotope: 1,
            wavenumber,
            intensity,
            air_width: 0.071,
            self_width: 0.092,
            lower_state_energy: 106.1293,
            air_temperature_exponent: 0.76,
            air_pressure_shift: -0.00221,
        }
    }

    /// Formats the line as a 160 character HITRAN record.
    pub fn to_record(&self) -> String {
        let isotope = match self.isotope {
            10 => '0',
            11 => 'A',
            12 => 'B',
            isotope => char::from(b'0' + isotope),
        };
        let record = format!(
            "{:2}{}{:12.6}{:10.3E}{:10.3E}{:5.3}{:5.3}{:10.4}{:4.2}{:8.5}",
            self.molecule_id,
            isotope,
            self.wavenumber,
            self.intensity,
            1.0,
            self.air_width,
            self.self_width,
            self.lower_state_energy,
            self.air_temperature_exponent,
            self.air_pressure_shift
        );
        format!("{:<160}", record)
    }
}

/// Band of CO2 lines around 2350 cm⁻¹ with intensities spanning several
/// orders of magnitude.
pub fn co2_band() -> Vec<TestLine> {
    (0..40)
        .map(|idx| {
            let offset = idx as f64 - 20.0;
            TestLine::co2(
                2350.0 + 1.5 * offset,
                3.5e-18 * f64::exp(-0.01 * offset * offset),
            )
        })
        .collect()
}

/// Writes the lines as a `.par` file of the given source into a mirror rooted
/// at the given directory.
pub fn write_mirror(root: &Path, source: DatabaseSource, molecule_id: u8, lines: &[TestLine]) {
    let directory = root.join(source.name());
    fs::create_dir_all(&directory).unwrap();
    let content: String = lines
        .iter()
        .map(|line| format!("{}\n", line.to_record()))
        .collect();
    fs::write(
        directory.join(format!("{:02}_test.par", molecule_id)),
        content,
    )
    .unwrap();
}

/// Remote counting the fetches it serves from an underlying mirror.
pub struct CountingMirror {
    mirror: ParFileMirror,
    fetches: AtomicUsize,
}

impl CountingMirror {
    pub fn new(root: &Path) -> Self {
        Self {
            mirror: ParFileMirror::new(root),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RemoteLineDatabase for CountingMirror {
    fn fetch(
        &self,
        request: &LineRequest,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<Vec<LineRecord>, DatabaseError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.mirror.fetch(request, credentials, timeout)
    }
}

#[allow(dead_code)]
pub fn memory_provider(root: &Path) -> LineDatabaseProvider<CountingMirror, MemoryLineStore> {
    LineDatabaseProvider::new(CountingMirror::new(root), MemoryLineStore::new())
}
