//! Reading of line lists in the fixed-width HITRAN `.par` format.
//!
//! Each record is 160 characters wide; only the first 67 carry the quantities
//! needed for line-by-line synthesis:
//!
//! | Columns | Format | Quantity |
//! |---------|--------|----------|
//! | 1-2     | I2     | molecule number |
//! | 3       | A1     | isotopologue number (`0` = 10, `A` = 11, `B` = 12) |
//! | 4-15    | F12.6  | wavenumber [cm⁻¹] |
//! | 16-25   | E10.3  | intensity [cm⁻¹/(molecule cm⁻²)] |
//! | 26-35   | E10.3  | Einstein A [s⁻¹] |
//! | 36-40   | F5.4   | air-broadened half width [cm⁻¹/atm] |
//! | 41-45   | F5.3   | self-broadened half width [cm⁻¹/atm] |
//! | 46-55   | F10.4  | lower-state energy [cm⁻¹] |
//! | 56-59   | F4.2   | temperature exponent of air width |
//! | 60-67   | F8.6   | air pressure shift [cm⁻¹/atm] |

use super::{Credentials, LineRecord, LineRequest, RemoteLineDatabase};
use crate::error::DatabaseError;
use lazy_static::lazy_static;
use regex::Regex;
use std::{
    fs,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
    time::{Duration, Instant},
};

/// Number of leading characters of a record that must be present.
pub const MIN_RECORD_LENGTH: usize = 67;

lazy_static! {
    static ref PAR_FILE_NAME_REGEX: Regex = Regex::new(r"^([0-9]{1,2})_.*\.par$").unwrap();
}

fn invalid_record(line_number: usize, message: String) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Invalid HITRAN record on line {}: {}", line_number, message),
    )
}

fn parse_field<T>(record: &str, start: usize, end: usize, name: &str, line_number: usize) -> io::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let field = record
        .get(start..end)
        .ok_or_else(|| invalid_record(line_number, format!("missing {}", name)))?
        .trim();
    field.parse().map_err(|err| {
        invalid_record(
            line_number,
            format!("could not parse {} from '{}': {}", name, field, err),
        )
    })
}

/// Decodes the single-character HITRAN isotopologue field.
pub fn parse_isotope_char(isotope: char) -> Option<u8> {
    match isotope {
        '1'..='9' => isotope.to_digit(10).map(|digit| digit as u8),
        '0' => Some(10),
        'A' | 'a' => Some(11),
        'B' | 'b' => Some(12),
        _ => None,
    }
}

/// Parses one `.par` record. The line number is only used in error messages.
pub fn parse_record(record: &str, line_number: usize) -> io::Result<LineRecord> {
    if !record.is_ascii() {
        return Err(invalid_record(line_number, "non-ASCII characters".to_string()));
    }
    if record.len() < MIN_RECORD_LENGTH {
        return Err(invalid_record(
            line_number,
            format!(
                "expected at least {} characters, got {}",
                MIN_RECORD_LENGTH,
                record.len()
            ),
        ));
    }
    let isotope_char = record[2..3].chars().next().unwrap_or(' ');
    let isotope = parse_isotope_char(isotope_char).ok_or_else(|| {
        invalid_record(
            line_number,
            format!("invalid isotopologue '{}'", isotope_char),
        )
    })?;

    Ok(LineRecord {
        molecule_id: parse_field(record, 0, 2, "molecule number", line_number)?,
        isotope,
        wavenumber: parse_field(record, 3, 15, "wavenumber", line_number)?,
        intensity: parse_field(record, 15, 25, "intensity", line_number)?,
        einstein_a: parse_field(record, 25, 35, "Einstein A", line_number)?,
        air_width: parse_field(record, 35, 40, "air width", line_number)?,
        self_width: parse_field(record, 40, 45, "self width", line_number)?,
        lower_state_energy: parse_field(record, 45, 55, "lower-state energy", line_number)?,
        air_temperature_exponent: parse_field(record, 55, 59, "temperature exponent", line_number)?,
        air_pressure_shift: parse_field(record, 59, 67, "pressure shift", line_number)?,
        partner_broadening: Vec::new(),
    })
}

/// Number of records read between checks of the deadline.
const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// Reads all records from the given reader that satisfy the filter. Blank lines are skipped.
pub fn read_records<B, F>(reader: B, keep: F) -> io::Result<Vec<LineRecord>>
where
    B: BufRead,
    F: FnMut(&LineRecord) -> bool,
{
    read_records_until(reader, keep, None)
}

/// Like [`read_records`], but gives up with an error of kind
/// [`io::ErrorKind::TimedOut`] once the deadline has passed. The deadline is
/// checked before the first record and then periodically while reading.
pub fn read_records_until<B, F>(
    reader: B,
    mut keep: F,
    deadline: Option<Instant>,
) -> io::Result<Vec<LineRecord>>
where
    B: BufRead,
    F: FnMut(&LineRecord) -> bool,
{
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        if idx % DEADLINE_CHECK_INTERVAL == 0 {
            check_deadline(deadline)?;
        }
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(line, idx + 1)?;
        if keep(&record) {
            records.push(record);
        }
    }
    Ok(records)
}

fn check_deadline(deadline: Option<Instant>) -> io::Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "deadline passed while reading records",
        )),
        _ => Ok(()),
    }
}

/// Line source serving a local mirror of a line database.
///
/// The mirror directory holds one subdirectory per source (`hitran`,
/// `hitemp`) containing `.par` files whose names start with the two-digit
/// molecule number, e.g. `02_hit20.par`. Sources requiring authentication
/// demand credentials, and when a set of accepted credentials is configured
/// the supplied ones must match it.
#[derive(Clone, Debug)]
pub struct ParFileMirror {
    root: PathBuf,
    accepted_credentials: Option<Credentials>,
}

impl ParFileMirror {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            accepted_credentials: None,
        }
    }

    pub fn with_accepted_credentials(mut self, credentials: Credentials) -> Self {
        self.accepted_credentials = Some(credentials);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn par_files_for(&self, request: &LineRequest) -> io::Result<Vec<PathBuf>> {
        let directory = self.root.join(request.source.name());
        let mut file_paths = Vec::new();
        for entry in fs::read_dir(&directory)? {
            let file_path = entry?.path();
            let matches_molecule = file_path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| PAR_FILE_NAME_REGEX.captures(name))
                .and_then(|groups| groups.get(1))
                .and_then(|id| id.as_str().parse::<u8>().ok())
                == Some(request.molecule.id);
            if matches_molecule && file_path.is_file() {
                file_paths.push(file_path);
            }
        }
        file_paths.sort();
        Ok(file_paths)
    }

    fn check_credentials(
        &self,
        request: &LineRequest,
        credentials: Option<&Credentials>,
    ) -> Result<(), DatabaseError> {
        if !request.source.requires_authentication() {
            return Ok(());
        }
        match (credentials, &self.accepted_credentials) {
            (None, _) => Err(DatabaseError::Authentication {
                database: request.source,
                reason: "credentials required".to_string(),
            }),
            (Some(given), Some(accepted)) if given != accepted => {
                Err(DatabaseError::Authentication {
                    database: request.source,
                    reason: format!("login rejected for user {}", given.username),
                })
            }
            _ => Ok(()),
        }
    }

    fn network_error(request: &LineRequest, message: String) -> DatabaseError {
        DatabaseError::Network {
            database: request.source,
            molecule: request.molecule.formula.to_string(),
            range: request.range,
            message,
        }
    }
}

impl RemoteLineDatabase for ParFileMirror {
    fn fetch(
        &self,
        request: &LineRequest,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<Vec<LineRecord>, DatabaseError> {
        self.check_credentials(request, credentials)?;

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let timed_out = || {
            Self::network_error(
                request,
                format!(
                    "timed out after {:.1} s",
                    timeout.unwrap_or_default().as_secs_f64()
                ),
            )
        };
        let file_paths = self
            .par_files_for(request)
            .map_err(|err| Self::network_error(request, err.to_string()))?;

        let mut lines = Vec::new();
        for file_path in file_paths {
            let file = fs::File::open(&file_path)
                .map_err(|err| Self::network_error(request, err.to_string()))?;
            let mut records = read_records_until(
                BufReader::new(file),
                |record| request.matches(record),
                deadline,
            )
            .map_err(|err| match err.kind() {
                io::ErrorKind::TimedOut => timed_out(),
                _ => Self::network_error(request, format!("{}: {}", file_path.display(), err)),
            })?;
            lines.append(&mut records);
        }
        check_deadline(deadline).map_err(|_| timed_out())?;
        Ok(lines)
    }
}
