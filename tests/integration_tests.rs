mod common;

use approx::assert_relative_eq;
use common::{co2_band, memory_provider, write_mirror, CountingMirror, TestLine};
use molspec::{
    broadening::LineBroadener,
    condition::make_condition,
    database::{
        cache::JsonLineStore, par::ParFileMirror, Credentials, DatabaseSource,
        LineDatabaseProvider, WavenumberRange,
    },
    device::{Device, DeviceKind, HostOffloadBackend},
    error::{DatabaseError, SimulationError},
    molecule::Molecule,
    simulation::{SimulationParameters, Simulator},
    synthesis::{GridSpec, Synthesizer},
};
use std::{fs, sync::Arc, thread, time::Duration};

fn co2() -> &'static Molecule {
    Molecule::from_formula("CO2").unwrap()
}

#[test]
fn lines_flow_from_mirror_to_spectrum() {
    let mirror_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());

    let provider = memory_provider(mirror_dir.path());
    let range = WavenumberRange::new(2300.0, 2400.0).unwrap();
    let lines = provider
        .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
        .unwrap();
    assert_eq!(lines.len(), 40);

    let condition = make_condition(296.0, 101325.0, &[("CO2", 4e-4)], 1.0).unwrap();
    let broadened_lines = LineBroadener::default().broaden(&lines, &condition);
    assert_eq!(broadened_lines.len(), lines.len());

    let spectrum = Synthesizer::new()
        .synthesize(
            &broadened_lines,
            &GridSpec::with_points(2310.0, 2390.0, 8001),
            None,
        )
        .unwrap();
    assert!(spectrum.device().is_none());
    assert!(spectrum
        .absorption_coefficient()
        .iter()
        .all(|&coefficient| coefficient.is_finite() && coefficient >= 0.0));

    // Strongest line sits at the band center, shifted by the pressure shift
    let (peak_wavenumber, _) = spectrum.peak();
    assert_relative_eq!(peak_wavenumber, 2350.0 - 0.00221, epsilon = 0.02);

    let transmittance = spectrum.transmittance(condition.path_length_cm());
    assert!(transmittance.iter().all(|&value| value > 0.0 && value <= 1.0));
}

#[test]
fn stored_lines_are_reused_by_new_providers() {
    let mirror_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());
    let range = WavenumberRange::new(2320.0, 2380.0).unwrap();

    let first = LineDatabaseProvider::new(
        CountingMirror::new(mirror_dir.path()),
        JsonLineStore::new(cache_dir.path()),
    );
    let first_lines = first
        .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
        .unwrap();
    assert_eq!(first.remote().fetches(), 1);
    assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 1);

    let second = LineDatabaseProvider::new(
        CountingMirror::new(mirror_dir.path()),
        JsonLineStore::new(cache_dir.path()),
    );
    let second_lines = second
        .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
        .unwrap();
    assert_eq!(second.remote().fetches(), 0);
    assert_eq!(second.statistics().store_hits(), 1);
    assert_eq!(&first_lines[..], &second_lines[..]);
}

#[test]
fn timed_out_fetch_leaves_no_stored_lines() {
    let mirror_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());
    let range = WavenumberRange::new(2300.0, 2400.0).unwrap();

    let provider = LineDatabaseProvider::new(
        CountingMirror::new(mirror_dir.path()),
        JsonLineStore::new(cache_dir.path()),
    );
    let result = provider.fetch_lines(
        co2(),
        &[1],
        range,
        DatabaseSource::Hitran,
        None,
        Some(Duration::ZERO),
    );
    assert!(matches!(result, Err(DatabaseError::Network { .. })));
    assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 0);

    let lines = provider
        .fetch_lines(
            co2(),
            &[1],
            range,
            DatabaseSource::Hitran,
            None,
            Some(Duration::from_secs(3600)),
        )
        .unwrap();
    assert_eq!(lines.len(), 40);
    assert_eq!(provider.remote().fetches(), 2);
    assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 1);
}

#[test]
fn concurrent_requests_reach_the_mirror_once() {
    let mirror_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());
    let provider = Arc::new(memory_provider(mirror_dir.path()));
    let range = WavenumberRange::new(2300.0, 2400.0).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provider = Arc::clone(&provider);
            thread::spawn(move || {
                provider
                    .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
                    .unwrap()
                    .len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 40);
    }
    assert_eq!(provider.remote().fetches(), 1);
}

#[test]
fn authenticated_source_requires_credentials() {
    let mirror_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitemp, 2, &co2_band());
    let credentials = Credentials::new("user", "secret");
    let provider = LineDatabaseProvider::new(
        ParFileMirror::new(mirror_dir.path()).with_accepted_credentials(credentials.clone()),
        molspec::database::cache::NoLineStore,
    );
    let range = WavenumberRange::new(2300.0, 2400.0).unwrap();

    let result = provider.fetch_lines(co2(), &[1], range, DatabaseSource::Hitemp, None, None);
    assert!(matches!(result, Err(DatabaseError::Authentication { .. })));

    let wrong = Credentials::new("user", "guess");
    let result = provider.fetch_lines(
        co2(),
        &[1],
        range,
        DatabaseSource::Hitemp,
        Some(&wrong),
        None,
    );
    assert!(matches!(result, Err(DatabaseError::Authentication { .. })));

    let lines = provider
        .fetch_lines(
            co2(),
            &[1],
            range,
            DatabaseSource::Hitemp,
            Some(&credentials),
            None,
        )
        .unwrap();
    assert_eq!(lines.len(), 40);
}

#[test]
fn missing_lines_are_reported_as_unavailable() {
    let mirror_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());
    let provider = memory_provider(mirror_dir.path());
    let range = WavenumberRange::new(1000.0, 1100.0).unwrap();
    let result = provider.fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None);
    assert!(matches!(result, Err(DatabaseError::DataUnavailable { .. })));
}

#[test]
fn offloaded_summation_matches_cpu_for_mirror_lines() {
    let mirror_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());
    let provider = memory_provider(mirror_dir.path());
    let range = WavenumberRange::new(2300.0, 2400.0).unwrap();
    let lines = provider
        .fetch_lines(co2(), &[1], range, DatabaseSource::Hitran, None, None)
        .unwrap();
    let condition = make_condition(250.0, 50000.0, &[("CO2", 0.01)], 0.1).unwrap();
    let broadened_lines = LineBroadener::default().broaden(&lines, &condition);
    let grid_spec = GridSpec::with_points(2320.0, 2380.0, 6001);

    let cpu_spectrum = Synthesizer::new()
        .synthesize(&broadened_lines, &grid_spec, None)
        .unwrap();
    let synthesizer = Synthesizer::new().with_devices(
        vec![Device::new(0, "Integration Offload", DeviceKind::Host)],
        Arc::new(HostOffloadBackend::new(3).unwrap()),
    );
    let device_spectrum = synthesizer
        .synthesize(&broadened_lines, &grid_spec, Some("offload"))
        .unwrap();
    assert!(device_spectrum.device().is_some());
    assert!(device_spectrum.fallback_warning().is_none());

    let (_, peak) = cpu_spectrum.peak();
    for (cpu, device) in cpu_spectrum
        .absorption_coefficient()
        .iter()
        .zip(device_spectrum.absorption_coefficient().iter())
    {
        assert!((cpu - device).abs() <= 1e-6 * peak);
    }

    let fallback_spectrum = synthesizer
        .synthesize(&broadened_lines, &grid_spec, Some("nonexistent-xyz"))
        .unwrap();
    assert!(fallback_spectrum.device().is_none());
    assert!(fallback_spectrum.fallback_warning().is_some());
    assert_eq!(
        fallback_spectrum.absorption_coefficient(),
        cpu_spectrum.absorption_coefficient()
    );
}

#[test]
fn simulator_produces_ascending_transmission_from_mirror() {
    let mirror_dir = tempfile::tempdir().unwrap();
    let mut lines = co2_band();
    lines.push(TestLine {
        isotope: 2,
        ..TestLine::co2(2345.3, 1e-19)
    });
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &lines);
    let provider = Arc::new(memory_provider(mirror_dir.path()));

    let mut parameters = SimulationParameters::new("CO2", 4e-4, 101325.0, 296.0, 10.0);
    parameters.isotopes = "1,2".to_string();
    let mut simulator = Simulator::new(Arc::clone(&provider), parameters).unwrap();

    let spectrum = simulator.compute_transmission_spectrum(4240.0, 4280.0).unwrap();
    assert!(!spectrum.is_empty());
    assert!(spectrum
        .wavelengths
        .windows(2)
        .into_iter()
        .all(|pair| pair[1] > pair[0]));
    let (_, lowest_transmittance) = simulator.strongest_absorption().unwrap();
    assert!(lowest_transmittance < 1.0);

    simulator.temperature = 320.0;
    simulator.compute_transmission_spectrum(4240.0, 4280.0).unwrap();
    assert_eq!(simulator.n_computations(), 2);
    assert_eq!(provider.remote().fetches(), 1);

    let result = simulator.get_transmission_spectrum(Some(4200.0), None);
    assert!(matches!(result, Err(SimulationError::InvalidInput(_))));
}

#[test]
fn simulate_command_writes_spectrum_table() {
    let mirror_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    write_mirror(mirror_dir.path(), DatabaseSource::Hitran, 2, &co2_band());
    let output_path = output_dir.path().join("co2.csv");

    molspec::cli::run::run_with_args([
        "molspec".to_string(),
        "simulate".to_string(),
        "CO2".to_string(),
        "--vmr=0.001".to_string(),
        "--wavenumber-range=2330,2370".to_string(),
        "--n-points=401".to_string(),
        "--database=hitran".to_string(),
        format!("--line-mirror={}", mirror_dir.path().display()),
        format!("--cache-dir={}", cache_dir.path().display()),
        format!("--output-file={}", output_path.display()),
        "--overwrite".to_string(),
    ]);

    let table = fs::read_to_string(&output_path).unwrap();
    let rows: Vec<&str> = table
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect();
    assert!(rows[0].starts_with("wavenumber"));
    assert_eq!(rows.len(), 1 + 401);

    let first: Vec<f64> = rows[1]
        .split(',')
        .map(|value| value.parse().unwrap())
        .collect();
    assert_eq!(first.len(), 5);
    assert_relative_eq!(first[0], 2330.0);
    assert_relative_eq!(first[1], 1e7 / 2330.0, max_relative = 1e-12);
    assert!(first[3] > 0.0 && first[3] <= 1.0);

    // Rows follow the wavenumber grid, so wavelengths descend
    assert!(table.contains("# Rows are ordered by ascending wavenumber"));
    let wavenumbers: Vec<f64> = rows[1..]
        .iter()
        .map(|row| row.split(',').next().unwrap().parse().unwrap())
        .collect();
    assert!(wavenumbers.windows(2).all(|pair| pair[0] < pair[1]));
    assert_relative_eq!(wavenumbers[400], 2370.0, max_relative = 1e-12);

    // The fetched lines were stored in the cache directory
    assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 1);
}
