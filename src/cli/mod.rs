//! CLI operation mode handlers.
//!
//! This module contains the implementations for each operation mode:
//! - [`migrations`]: Database schema migrations
//! - [`report`]: Repository and pull request reports fetched from GitHub
//! - [`webhook`]: Apply one webhook delivery to the local database
//!
//! Output formatting utilities are in [`output`].

mod error;
pub mod migrations;
pub mod output;
pub mod report;
pub mod webhook;

pub use error::CliError;
