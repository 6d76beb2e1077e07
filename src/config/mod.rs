//! Configuration model for csvlock.
//!
//! This module defines the Config struct that represents an optional
//! `csvlock.yaml` file. It supports forward-compatible YAML parsing (unknown
//! fields are ignored), defaults for every field, and validation of values.

mod model;
mod operations;


pub use model::Config;
