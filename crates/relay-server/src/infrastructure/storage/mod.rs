//! Storage infrastructure: the on-disk configuration file.

pub mod config;
