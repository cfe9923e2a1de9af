//! Command line interface for generating a command line completion script.

use super::build;
use crate::exit_on_error;
use clap::{Arg, ArgMatches, Command};
use clap_complete::{generate, Shell};
use std::io;

/// Builds a representation of the `completions` command line subcommand.
pub fn create_completions_subcommand(_parent_command_name: &'static str) -> Command<'static> {
    Command::new("completions")
        .about("Generate tab-completion script for your shell")
        .hide(true)
        .arg(
            Arg::new("shell")
                .value_name("SHELL")
                .required(true)
                .possible_values(["bash", "zsh", "fish", "elvish", "powershell"])
                .help("The shell to generate the script for"),
        )
        .after_help(
            r#"DISCUSSION
    The script is written to `stdout`, so it can be redirected to wherever
    your shell looks for completion scripts. For example:

    BASH:

        $ mkdir -p ~/.local/share/bash-completion/completions
        $ molspec completions bash > ~/.local/share/bash-completion/completions/molspec

    ZSH (with `fpath+=~/.zfunc` in `.zshrc` before `compinit`):

        $ mkdir -p ~/.zfunc
        $ molspec completions zsh > ~/.zfunc/_molspec

    FISH:

        $ mkdir -p ~/.config/fish/completions
        $ molspec completions fish > ~/.config/fish/completions/molspec.fish

    Log out and back in, or restart the shell, for the completions to take effect."#,
        )
}

/// Runs the actions for the `completions` subcommand using the given arguments.
pub fn run_completions_subcommand(arguments: &ArgMatches) {
    let shell: Shell = exit_on_error!(
        arguments.value_of("shell").unwrap_or_default().parse(),
        "Error: Could not parse shell: {}"
    );
    let mut command = build::build();
    generate(shell, &mut command, clap::crate_name!(), &mut io::stdout());
}
