//! Function for running the command line program.

use super::{
    build, completions::run_completions_subcommand, devices::run_devices_subcommand,
    simulate::run_simulate_subcommand,
};
use std::{ffi::OsString, time::Instant};

/// Runs the `molspec` command line program.
pub fn run() {
    run_with_args(std::env::args_os());
}

/// Runs the `molspec` command line program with the given arguments, the
/// first of which is the program name.
pub fn run_with_args<I, T>(args: I)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let command = build::build();

    let arguments = command.get_matches_from(args);

    let start_instant = Instant::now();

    match arguments.subcommand() {
        Some(("simulate", simulate_arguments)) => run_simulate_subcommand(simulate_arguments),
        Some(("devices", devices_arguments)) => run_devices_subcommand(devices_arguments),
        Some(("completions", completions_arguments)) => {
            run_completions_subcommand(completions_arguments)
        }
        _ => {}
    }

    if arguments.is_present("timing") {
        println!("Elapsed time: {} s", start_instant.elapsed().as_secs_f64());
    }
}
