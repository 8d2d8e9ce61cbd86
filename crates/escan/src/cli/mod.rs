//! Command-line interface for eScan.

pub mod error;
pub mod output;

mod context;

pub mod auth;
pub mod config;
pub mod extract;
pub mod library;
pub mod usage;
