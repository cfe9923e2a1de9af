//! File input/output and status reporting.

pub mod utils;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// How much to report about the progress of a computation.
#[derive(Clone, Debug)]
pub enum Verbosity {
    Quiet,
    Messages,
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Whether non-critical status messages should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Whether warnings about non-fatal conditions should be printed.
    pub fn print_warnings(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Creates a progress bar for the given number of items, hidden unless
    /// progress reporting is enabled.
    pub fn create_progress_bar(&self, n_items: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => {
                let bar = ProgressBar::new(n_items as u64);
                bar.set_style(style.clone());
                bar.set_draw_target(ProgressDrawTarget::stderr());
                bar
            }
            _ => ProgressBar::hidden(),
        }
    }
}

/// How to handle an output file that already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwriteMode {
    Always,
    Never,
    Ask,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Quiet
    }
}

impl From<bool> for Verbosity {
    fn from(verbose: bool) -> Self {
        if verbose {
            Self::Messages
        } else {
            Self::Quiet
        }
    }
}
