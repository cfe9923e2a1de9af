//! Obtaining database credentials from the environment or the terminal.

use crate::{
    database::{CredentialPrompt, Credentials, DatabaseSource},
    io::utils as io_utils,
};
use std::{
    env,
    io::{self, BufRead, Write},
};

/// Environment variable holding the database user name.
pub const USERNAME_ENV_VAR: &str = "HITRAN_USERNAME";
/// Environment variable holding the database password.
pub const PASSWORD_ENV_VAR: &str = "HITRAN_PASSWORD";

/// Reads credentials from the environment, if both parts are set.
pub fn credentials_from_env() -> Option<Credentials> {
    let username = env::var(USERNAME_ENV_VAR).ok().filter(|name| !name.is_empty())?;
    let password = env::var(PASSWORD_ENV_VAR).ok()?;
    Some(Credentials::new(username, password))
}

/// Prompt for the password. The terminal echoes what is typed, so the prompt
/// says so and points to the environment variable instead.
pub const PASSWORD_PROMPT: &str = "Password (input is shown, set HITRAN_PASSWORD to avoid typing it): ";

/// Writes the credential prompts to `output` and reads the answers from `input`.
///
/// Returns `None` when no user name is given.
pub fn read_credentials<R, W>(
    source: DatabaseSource,
    mut input: R,
    mut output: W,
) -> io::Result<Option<Credentials>>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "The {} database requires an account", source)?;
    let username = io_utils::prompt_for_line_from("Username: ", &mut input, &mut output)?;
    let username = username.trim();
    if username.is_empty() {
        return Ok(None);
    }
    let password = io_utils::prompt_for_line_from(PASSWORD_PROMPT, &mut input, &mut output)?;
    Ok(Some(Credentials::new(username, password)))
}

/// Asks for credentials on the terminal. Never prompts when standard input
/// is not a terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalCredentialPrompt;

impl CredentialPrompt for TerminalCredentialPrompt {
    fn prompt(&self, source: DatabaseSource) -> Option<Credentials> {
        if !atty::is(atty::Stream::Stdin) {
            return None;
        }
        match read_credentials(source, io::stdin().lock(), io::stderr()) {
            Ok(credentials) => credentials,
            Err(err) => {
                eprintln!("Warning: Could not read credentials: {}", err);
                None
            }
        }
    }
}
