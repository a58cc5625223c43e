use rand::distr::{Alphanumeric, SampleString};

pub mod builder;

pub mod executor;

pub mod job;

pub mod listener;

pub mod monitor;

pub mod processor;

pub mod reader;

pub mod record;

pub mod report;

pub mod writer;

/// Generates a random name consisting of alphanumeric characters.
///
/// # Returns
///
/// A `String` containing the generated random name.
fn build_name() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 8)
}
