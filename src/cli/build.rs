//! Function for building the command line hierarchy.

use super::{
    completions::create_completions_subcommand, devices::create_devices_subcommand,
    simulate::create_simulate_subcommand,
};
use clap::{self, Arg, Command};

/// Build the `molspec` command line hierarchy.
pub fn build() -> Command<'static> {
    let command_name = "molspec";
    Command::new(command_name)
        .version(clap::crate_version!())
        .author(clap::crate_authors!())
        .about(clap::crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .disable_help_subcommand(true)
        .arg(
            Arg::new("timing")
                .short('t')
                .long("timing")
                .help("Display elapsed time when done"),
        )
        .subcommand(create_simulate_subcommand(command_name))
        .subcommand(create_devices_subcommand(command_name))
        .subcommand(create_completions_subcommand(command_name))
}
