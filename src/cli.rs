//! Command line interface.

pub mod build;
pub mod completions;
pub mod credentials;
pub mod devices;
pub mod run;
pub mod simulate;
pub mod utils;
