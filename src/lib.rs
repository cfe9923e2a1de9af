//! The `molspec` crate synthesizes molecular absorption spectra from
//! spectroscopic line lists.
//!
//! Lines are obtained through a caching [`database::LineDatabaseProvider`],
//! broadened for a gas [`condition::Condition`] by the
//! [`broadening::LineBroadener`] and summed onto a wavenumber grid by the
//! [`synthesis::Synthesizer`], optionally on a compute [`device::Device`].

#[macro_use]
pub mod error;
pub mod broadening;
pub mod condition;
pub mod config;
pub mod constants;
pub mod database;
pub mod device;
pub mod io;
pub mod molecule;
pub mod simulation;
pub mod synthesis;
pub mod units;

#[cfg(feature = "cli")]
pub mod cli;
