//! Command line interface for simulating absorption spectra.

use crate::{
    broadening::{IntensityCutoff, LineBroadener},
    cli::{credentials, utils},
    condition::{make_condition, Condition},
    config::Config,
    database::{
        cache::{JsonLineStore, LineStore, NoLineStore},
        par::ParFileMirror,
        DatabaseSource, LineDatabaseProvider, WavenumberRange,
    },
    exit_on_error, exit_on_false,
    io::{utils as io_utils, Verbosity},
    molecule::Molecule,
    simulation::DEFAULT_WAVELENGTH_STEP,
    synthesis::{
        fsp, profile::LineShape, GridSpec, SpectralGrid, Spectrum, Synthesizer,
        DEFAULT_WING_CUTOFF,
    },
    units,
};
use chrono::Local;
use clap::{Arg, ArgMatches, Command};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

const DEFAULT_N_POINTS: usize = 10000;

/// Builds a representation of the `simulate` command line subcommand.
pub fn create_simulate_subcommand(_parent_command_name: &'static str) -> Command<'static> {
    Command::new("simulate")
        .about("Simulates the absorption spectrum of a molecule in a gas mixture")
        .long_about(
            "Simulates the absorption spectrum of a molecule in a gas mixture.\n\
             Lines are fetched from the line database (or the local cache), broadened\n\
             for the given conditions and summed onto a regular wavenumber grid. The\n\
             result is written as a CSV table of wavenumber, wavelength, absorption\n\
             coefficient, transmittance and absorbance.",
        )
        .arg(
            Arg::new("molecule")
                .value_name("MOLECULE")
                .required(true)
                .help("Chemical formula of the absorbing molecule (e.g. CO2)")
                .takes_value(true),
        )
        .arg(
            Arg::new("isotopes")
                .short('i')
                .long("isotopes")
                .require_equals(true)
                .value_name("ISOTOPES")
                .help("Isotopologues to include, as local numbers (e.g. 1,2) or `all`")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::new("vmr")
                .short('x')
                .long("vmr")
                .require_equals(true)
                .value_name("FRACTION")
                .help("Volume mixing ratio of the molecule")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("pressure")
                .short('P')
                .long("pressure")
                .require_equals(true)
                .value_name("VALUE")
                .help("Total pressure of the gas [Pa]")
                .takes_value(true)
                .default_value("101325"),
        )
        .arg(
            Arg::new("temperature")
                .short('T')
                .long("temperature")
                .require_equals(true)
                .value_name("VALUE")
                .help("Temperature of the gas [K]")
                .takes_value(true)
                .default_value("296"),
        )
        .arg(
            Arg::new("length")
                .short('L')
                .long("length")
                .require_equals(true)
                .value_name("VALUE")
                .help("Length of the absorption path [m]")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::new("diluent")
                .long("diluent")
                .require_equals(true)
                .use_value_delimiter(true)
                .require_value_delimiter(true)
                .value_name("PARTNER:PROPORTION")
                .help(
                    "Broadening partners making up the rest of the gas, with relative\n\
                     proportions (e.g. he:0.2,air:0.8) (comma-separated) [default: air]",
                )
                .takes_value(true)
                .multiple_values(true),
        )
        .arg(
            Arg::new("wavelength-range")
                .short('w')
                .long("wavelength-range")
                .require_equals(true)
                .use_value_delimiter(true)
                .require_value_delimiter(true)
                .value_names(&["MIN", "MAX"])
                .help("Vacuum wavelength range to simulate [nm]")
                .takes_value(true)
                .required_unless_present("wavenumber-range")
                .conflicts_with_all(&["wavenumber-range", "wavenumber-step", "n-points"]),
        )
        .arg(
            Arg::new("wavenumber-range")
                .short('k')
                .long("wavenumber-range")
                .require_equals(true)
                .use_value_delimiter(true)
                .require_value_delimiter(true)
                .value_names(&["MIN", "MAX"])
                .help("Wavenumber range to simulate [cm⁻¹]")
                .takes_value(true)
                .conflicts_with("wavelength-step"),
        )
        .arg(
            Arg::new("wavelength-step")
                .short('s')
                .long("wavelength-step")
                .require_equals(true)
                .value_name("VALUE")
                .help(
                    "Wavelength spacing of the grid at the center of the range [nm]\n\
                     [default: 0.01]",
                )
                .takes_value(true),
        )
        .arg(
            Arg::new("wavenumber-step")
                .long("wavenumber-step")
                .require_equals(true)
                .value_name("VALUE")
                .help("Wavenumber spacing of the grid [cm⁻¹]")
                .takes_value(true)
                .conflicts_with("n-points"),
        )
        .arg(
            Arg::new("n-points")
                .short('n')
                .long("n-points")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of grid points spanning the wavenumber range [default: 10000]")
                .takes_value(true),
        )
        .arg(
            Arg::new("line-shape")
                .short('S')
                .long("line-shape")
                .require_equals(true)
                .value_name("SHAPE")
                .help("Profile to spread each line with")
                .takes_value(true)
                .possible_values(["voigt", "gaussian", "lorentzian"])
                .default_value("voigt"),
        )
        .arg(
            Arg::new("wing-cutoff")
                .long("wing-cutoff")
                .require_equals(true)
                .value_name("VALUE")
                .help(
                    "Distance from the line center beyond which a line is ignored [cm⁻¹]\n\
                     (0 disables the cutoff)",
                )
                .takes_value(true)
                .default_value("50"),
        )
        .arg(
            Arg::new("intensity-cutoff")
                .long("intensity-cutoff")
                .require_equals(true)
                .value_name("FRACTION")
                .help(
                    "Lines weaker than this fraction of the strongest line are pruned\n\
                     (0 keeps all lines)",
                )
                .takes_value(true)
                .default_value("1e-12"),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .require_equals(true)
                .value_name("NAME")
                .help("Line database to use [default: hitran, or $MOLSPEC_DATABASE]")
                .takes_value(true)
                .possible_values(["hitran", "hitemp"]),
        )
        .arg(
            Arg::new("device")
                .short('D')
                .long("device")
                .require_equals(true)
                .value_name("IDENTIFIER")
                .help(
                    "Index or part of the name of the device to sum lines on\n\
                     [default: none, or $MOLSPEC_DEVICE]",
                )
                .takes_value(true),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .require_equals(true)
                .value_name("DIR")
                .help("Directory of the persistent line cache [default: $MOLSPEC_CACHE_DIR]")
                .takes_value(true),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .help("Do not read or write the persistent line cache")
                .conflicts_with("cache-dir"),
        )
        .arg(
            Arg::new("line-mirror")
                .short('m')
                .long("line-mirror")
                .require_equals(true)
                .value_name("DIR")
                .help(
                    "Root directory of the HITRAN .par mirror to fetch lines from\n\
                     [default: $MOLSPEC_LINE_MIRROR, or <cache dir>/mirror]",
                )
                .takes_value(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .require_equals(true)
                .value_name("SECONDS")
                .help("Maximum time to spend fetching lines [default: no limit]")
                .takes_value(true),
        )
        .arg(
            Arg::new("output-file")
                .short('o')
                .long("output-file")
                .require_equals(true)
                .value_name("PATH")
                .help("Path of the CSV file to write the spectrum to [default: stdout]")
                .takes_value(true),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Automatically overwrite any existing output file")
                .conflicts_with("no-overwrite"),
        )
        .arg(
            Arg::new("no-overwrite")
                .long("no-overwrite")
                .help("Do not overwrite an existing output file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print status messages related to the simulation"),
        )
        .arg(
            Arg::new("progress")
                .short('p')
                .long("progress")
                .help("Show progress bars for broadening and summation (implies `verbose`)"),
        )
}

/// Runs the actions for the `simulate` subcommand using the given arguments.
pub fn run_simulate_subcommand(arguments: &ArgMatches) {
    let config = config_from_arguments(arguments);
    let verbosity = utils::parse_verbosity(arguments, true);

    let molecule = exit_on_error!(
        Molecule::from_formula(arguments.value_of("molecule").unwrap_or_default()),
        "Error: {}"
    );
    let isotopes = exit_on_error!(
        molecule.parse_isotopes(arguments.value_of("isotopes").unwrap_or("1")),
        "Error: {}"
    );

    let condition = condition_from_arguments(arguments, molecule);
    let grid_spec = grid_spec_from_arguments(arguments);
    exit_on_error!(SpectralGrid::new(&grid_spec), "Error: Invalid grid: {}");

    let intensity_cutoff: fsp =
        utils::get_finite_float_value_from_required_parseable_argument(arguments, "intensity-cutoff");
    exit_on_false!(
        intensity_cutoff >= 0.0,
        "Error: intensity-cutoff must be non-negative"
    );
    let broadener = LineBroadener::new(if intensity_cutoff > 0.0 {
        IntensityCutoff::Relative(intensity_cutoff)
    } else {
        IntensityCutoff::None
    })
    .with_verbosity(verbosity.clone());

    let line_shape: LineShape =
        utils::get_value_from_required_parseable_argument(arguments, "line-shape");
    let wing_cutoff: fsp =
        utils::get_finite_float_value_from_required_parseable_argument(arguments, "wing-cutoff");
    let synthesizer = if config.device().is_some() {
        Synthesizer::for_host()
    } else {
        Synthesizer::new()
    }
    .with_line_shape(line_shape)
    .with_wing_cutoff(wing_cutoff)
    .with_verbosity(verbosity.clone());

    let timeout = utils::get_value_from_parseable_argument::<fsp>(arguments, "timeout").map(
        |seconds| {
            exit_on_false!(
                seconds.is_finite() && seconds > 0.0,
                "Error: timeout must be positive"
            );
            Duration::from_secs_f64(seconds)
        },
    );

    let task = SimulationTask {
        molecule,
        isotopes,
        condition,
        grid_spec,
        broadener,
        synthesizer,
        timeout,
        verbosity,
    };

    let spectrum = if arguments.is_present("no-cache") {
        task.run(&config, NoLineStore)
    } else {
        task.run(&config, JsonLineStore::new(config.cache_dir()))
    };

    let path_length_cm = task.condition.path_length_cm();
    match arguments.value_of("output-file") {
        Some(output_file_path) => {
            let output_file_path = PathBuf::from(output_file_path);
            if !is_csv_path(&output_file_path) && task.verbosity.print_warnings() {
                eprintln!(
                    "Warning: Output is written as CSV regardless of extension of {}",
                    output_file_path.display()
                );
            }
            let overwrite_mode = utils::overwrite_mode_from_arguments(arguments);
            if io_utils::check_if_write_allowed(&output_file_path, overwrite_mode) {
                if task.verbosity.print_messages() {
                    println!("Writing spectrum to {}", output_file_path.display());
                }
                exit_on_error!(
                    io_utils::write_atomically(&output_file_path, |writer| {
                        write_spectrum_table(writer, &spectrum, &task, path_length_cm)
                    }),
                    "Error: Could not write {}: {}",
                    output_file_path.display()
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            exit_on_error!(
                write_spectrum_table(&mut writer, &spectrum, &task, path_length_cm),
                "Error: Could not write spectrum: {}"
            );
        }
    }
}

/// Everything needed to compute one spectrum.
struct SimulationTask {
    molecule: &'static Molecule,
    isotopes: Vec<u8>,
    condition: Condition,
    grid_spec: GridSpec,
    broadener: LineBroadener,
    synthesizer: Synthesizer,
    timeout: Option<Duration>,
    verbosity: Verbosity,
}

impl SimulationTask {
    fn run<S: LineStore>(&self, config: &Config, store: S) -> Spectrum {
        let mirror = ParFileMirror::new(config.line_mirror());
        if self.verbosity.print_messages() {
            println!(
                "Reading {} lines from {}",
                config.database_source(),
                mirror.root().display()
            );
        }
        let provider = Arc::new(
            LineDatabaseProvider::new(mirror, store)
                .with_credential_prompt(credentials::TerminalCredentialPrompt)
                .with_verbosity(self.verbosity.clone()),
        );
        let environment_credentials = credentials::credentials_from_env();

        // Lines just outside the grid still contribute through their wings
        let margin = if self.synthesizer.wing_cutoff().is_finite() {
            self.synthesizer.wing_cutoff()
        } else {
            DEFAULT_WING_CUTOFF
        };
        let range = exit_on_error!(
            WavenumberRange::new(
                (self.grid_spec.min - margin).max(0.0),
                self.grid_spec.max + margin
            ),
            "Error: {}"
        );

        let lines = exit_on_error!(
            provider.fetch_lines(
                self.molecule,
                &self.isotopes,
                range,
                config.database_source(),
                environment_credentials.as_ref(),
                self.timeout,
            ),
            "Error: {}"
        );

        let (broadened_lines, report) = self.broadener.broaden_with_report(&lines, &self.condition);
        if self.verbosity.print_messages() {
            println!("{}", report);
        }

        let spectrum = exit_on_error!(
            self.synthesizer
                .synthesize(&broadened_lines, &self.grid_spec, config.device()),
            "Error: {}"
        );

        if self.verbosity.print_messages() {
            let (peak_wavenumber, peak_coefficient) = spectrum.peak();
            println!(
                "Strongest absorption at {:.4} cm⁻¹ ({:.4} nm): {:.4e} cm⁻¹",
                peak_wavenumber,
                units::wavenumber_to_wavelength(peak_wavenumber),
                peak_coefficient
            );
        }
        spectrum
    }
}

fn config_from_arguments(arguments: &ArgMatches) -> Config {
    let mut config = Config::from_env();
    if let Some(device) = arguments.value_of("device") {
        config = config.with_device(device);
    }
    if let Some(database) = arguments.value_of("database") {
        let source: DatabaseSource = utils::parse_value_string("database", database);
        config = config.with_database_source(source);
    }
    if let Some(cache_dir) = arguments.value_of("cache-dir") {
        config = config.with_cache_dir(cache_dir);
    }
    if let Some(line_mirror) = arguments.value_of("line-mirror") {
        config = config.with_line_mirror(line_mirror);
    }
    config
}

fn condition_from_arguments(arguments: &ArgMatches, molecule: &'static Molecule) -> Condition {
    let vmr: fsp = utils::get_finite_float_value_from_required_parseable_argument(arguments, "vmr");
    let pressure: fsp =
        utils::get_finite_float_value_from_required_parseable_argument(arguments, "pressure");
    let temperature: fsp =
        utils::get_finite_float_value_from_required_parseable_argument(arguments, "temperature");
    let length: fsp =
        utils::get_finite_float_value_from_required_parseable_argument(arguments, "length");

    let condition = exit_on_error!(
        make_condition(temperature, pressure, &[(molecule.formula, vmr)], length),
        "Error: Invalid conditions: {}"
    );

    match arguments.values_of("diluent") {
        Some(values) => {
            let diluent: Vec<(String, fsp)> = values.map(parse_diluent_entry).collect();
            let diluent: Vec<(&str, fsp)> = diluent
                .iter()
                .map(|(partner, proportion)| (partner.as_str(), *proportion))
                .collect();
            exit_on_error!(
                condition.with_diluent(&diluent),
                "Error: Invalid diluent: {}"
            )
        }
        None => condition,
    }
}

fn parse_diluent_entry(entry: &str) -> (String, fsp) {
    match entry.split_once(':') {
        Some((partner, proportion)) if !partner.trim().is_empty() => (
            partner.trim().to_lowercase(),
            utils::parse_value_string("diluent", proportion.trim()),
        ),
        _ => crate::exit_with_error!(
            "Error: Diluent entries must have the format <partner>:<proportion>, got {}",
            entry
        ),
    }
}

fn grid_spec_from_arguments(arguments: &ArgMatches) -> GridSpec {
    if arguments.is_present("wavenumber-range") {
        let (min_wavenumber, max_wavenumber): (fsp, fsp) =
            utils::parse_limits(arguments, "wavenumber-range");
        exit_on_false!(
            min_wavenumber > 0.0,
            "Error: wavenumber-range must be positive"
        );
        if arguments.is_present("wavenumber-step") {
            let step = utils::get_positive_float_value_from_required_parseable_argument(
                arguments,
                "wavenumber-step",
            );
            GridSpec::with_step(min_wavenumber, max_wavenumber, step)
        } else {
            let n_points = utils::get_value_from_parseable_argument(arguments, "n-points")
                .unwrap_or(DEFAULT_N_POINTS);
            GridSpec::with_points(min_wavenumber, max_wavenumber, n_points)
        }
    } else {
        let (min_wavelength, max_wavelength): (fsp, fsp) =
            utils::parse_limits(arguments, "wavelength-range");
        exit_on_false!(
            min_wavelength > 0.0,
            "Error: wavelength-range must be positive"
        );
        let wavelength_step = if arguments.is_present("wavelength-step") {
            utils::get_positive_float_value_from_required_parseable_argument(
                arguments,
                "wavelength-step",
            )
        } else {
            DEFAULT_WAVELENGTH_STEP
        };
        let central_wavelength = 0.5 * (min_wavelength + max_wavelength);
        GridSpec::with_step(
            units::wavelength_to_wavenumber(max_wavelength),
            units::wavelength_to_wavenumber(min_wavelength),
            units::delta_wavelength_to_delta_wavenumber(wavelength_step, central_wavelength),
        )
    }
}

fn write_spectrum_table(
    writer: &mut dyn Write,
    spectrum: &Spectrum,
    task: &SimulationTask,
    path_length_cm: fsp,
) -> io::Result<()> {
    let condition = &task.condition;
    writeln!(
        writer,
        "# Generated by {} {} on {}",
        clap::crate_name!(),
        clap::crate_version!(),
        Local::now().to_rfc3339()
    )?;
    writeln!(
        writer,
        "# {} (isotopes {}) vmr={} T={} K p={} Pa L={} m line_shape={}",
        task.molecule.formula,
        task.isotopes
            .iter()
            .map(|isotope| isotope.to_string())
            .collect::<Vec<_>>()
            .join(","),
        condition.mole_fraction(task.molecule.id).unwrap_or(0.0),
        condition.temperature(),
        condition.pressure(),
        condition.path_length(),
        task.synthesizer.line_shape()
    )?;
    if let Some(warning) = spectrum.fallback_warning() {
        writeln!(writer, "# {}", warning)?;
    }
    writeln!(
        writer,
        "# Rows are ordered by ascending wavenumber (descending wavelength)"
    )?;
    writeln!(
        writer,
        "wavenumber [cm^-1],wavelength [nm],absorption coefficient [cm^-1],transmittance,absorbance"
    )?;

    let transmittance = spectrum.transmittance(path_length_cm);
    let absorbance = spectrum.absorbance(path_length_cm);
    for (idx, (&wavenumber, &coefficient)) in spectrum
        .wavenumbers()
        .iter()
        .zip(spectrum.absorption_coefficient().iter())
        .enumerate()
    {
        writeln!(
            writer,
            "{},{},{:e},{},{:e}",
            wavenumber,
            units::wavenumber_to_wavelength(wavenumber),
            coefficient,
            transmittance[idx],
            absorbance[idx]
        )?;
    }
    Ok(())
}

fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .map_or(false, |extension| extension.eq_ignore_ascii_case("csv"))
}
