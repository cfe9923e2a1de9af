//! Utilities for creating the command line interface.

use crate::{
    exit_on_error, exit_on_false, exit_on_none,
    io::{OverwriteMode, Verbosity},
};
use clap::ArgMatches;
use indicatif::ProgressStyle;
use lazy_static::lazy_static;
use num::Float;
use std::str::FromStr;

lazy_static! {
    static ref DEFAULT_PROGRESS_STYLE: ProgressStyle =
        ProgressStyle::default_bar().template("Progress: {bar:40}  {percent}% | ETA: {eta}");
}

pub fn parse_value_string<T>(argument_name: &str, value_string: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    exit_on_error!(
        value_string.parse(),
        "Error: Could not parse value for {0}: {1}",
        argument_name
    )
}

fn verify_finite_float_value<F: Float>(argument_name: &str, value: F) {
    exit_on_false!(value.is_finite(), "Error: {} must be finite", argument_name);
}

fn verify_argument_value_count<T>(argument_name: &str, values: &[T], required_count: usize) {
    let count = values.len();
    exit_on_false!(
        count == required_count,
        "Error: {} must have {} values, got {}",
        argument_name,
        required_count,
        count
    );
}

pub fn get_value_from_required_parseable_argument<T>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    parse_value_string(
        argument_name,
        exit_on_none!(
            arguments.value_of(argument_name),
            "Error: No value for required argument {}",
            argument_name
        ),
    )
}

pub fn get_value_from_parseable_argument<T>(arguments: &ArgMatches, argument_name: &str) -> Option<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    arguments
        .value_of(argument_name)
        .map(|value_string| parse_value_string(argument_name, value_string))
}

pub fn get_finite_float_value_from_required_parseable_argument<F>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> F
where
    F: Float + FromStr,
    <F as FromStr>::Err: std::fmt::Display,
{
    let value: F = get_value_from_required_parseable_argument(arguments, argument_name);
    verify_finite_float_value(argument_name, value);
    value
}

pub fn get_positive_float_value_from_required_parseable_argument<F>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> F
where
    F: Float + FromStr + std::fmt::Display,
    <F as FromStr>::Err: std::fmt::Display,
{
    let value: F = get_finite_float_value_from_required_parseable_argument(arguments, argument_name);
    exit_on_false!(
        value > F::zero(),
        "Error: {} must be positive, got {}",
        argument_name,
        value
    );
    value
}

/// Parses a pair of finite limits where the second exceeds the first.
pub fn parse_limits<F>(arguments: &ArgMatches, argument_name: &str) -> (F, F)
where
    F: Float + FromStr + std::fmt::Display,
    <F as FromStr>::Err: std::fmt::Display,
{
    let limits: Vec<F> = exit_on_none!(
        arguments.values_of(argument_name),
        "Error: No value for argument {}",
        argument_name
    )
    .map(|value_string| {
        exit_on_error!(
            value_string.parse::<F>(),
            "Error: Could not parse value in {0}: {1}",
            argument_name
        )
    })
    .collect();

    verify_argument_value_count(argument_name, &limits, 2);

    let (lower_limit, upper_limit) = (limits[0], limits[1]);

    exit_on_false!(
        !(lower_limit.is_nan() || upper_limit.is_nan()),
        "Error: {} contains a NaN value",
        argument_name
    );
    exit_on_false!(
        lower_limit.is_finite() && upper_limit.is_finite(),
        "Error: {} must be finite",
        argument_name
    );
    exit_on_false!(
        upper_limit > lower_limit,
        "Error: Second value in {} ({}) must be larger than first value ({})",
        argument_name,
        upper_limit,
        lower_limit
    );
    (lower_limit, upper_limit)
}

pub fn overwrite_mode_from_arguments(arguments: &ArgMatches) -> OverwriteMode {
    if arguments.is_present("overwrite") {
        OverwriteMode::Always
    } else if arguments.is_present("no-overwrite") {
        OverwriteMode::Never
    } else {
        OverwriteMode::Ask
    }
}

pub fn parse_verbosity(arguments: &ArgMatches, support_progress: bool) -> Verbosity {
    if support_progress && arguments.is_present("progress") {
        Verbosity::Progress(DEFAULT_PROGRESS_STYLE.clone())
    } else if arguments.is_present("verbose") {
        Verbosity::Messages
    } else {
        Verbosity::Quiet
    }
}
