//! Command line interface for listing compute devices.

use crate::device::{resolve_device, DeviceEnumerator, HostDeviceEnumerator};
use clap::{Arg, ArgMatches, Command};

/// Builds a representation of the `devices` command line subcommand.
pub fn create_devices_subcommand(_parent_command_name: &'static str) -> Command<'static> {
    Command::new("devices")
        .about("Lists the devices lines can be summed on")
        .long_about(
            "Lists the devices lines can be summed on.\n\
             A device is selected in `simulate` by its index or by part of its name.",
        )
        .arg(
            Arg::new("select")
                .long("select")
                .require_equals(true)
                .value_name("IDENTIFIER")
                .help("Only show the device the identifier resolves to")
                .takes_value(true),
        )
}

/// Runs the actions for the `devices` subcommand using the given arguments.
pub fn run_devices_subcommand(arguments: &ArgMatches) {
    let devices = HostDeviceEnumerator.devices();

    if let Some(identifier) = arguments.value_of("select") {
        match resolve_device(identifier, &devices) {
            Some(device) => println!("{}", device),
            None => println!("No device matches {}", identifier),
        }
        return;
    }

    if devices.is_empty() {
        println!("No devices found");
    }
    for device in &devices {
        println!("{}", device);
    }
}
